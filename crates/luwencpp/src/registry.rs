// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use luwen_if::Chip;
use once_cell::sync::Lazy;

use crate::GlueError;

/// Opaque session handle handed out to C. Zero is never a valid handle, and a handle is never
/// reused once it has been closed.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChipHandle {
    pub id: u64,
}

impl ChipHandle {
    pub const INVALID: ChipHandle = ChipHandle { id: 0 };

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

pub(crate) type SharedChip = Arc<Mutex<Chip>>;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static CHIPS: Lazy<Mutex<HashMap<u64, SharedChip>>> = Lazy::new(|| Mutex::new(HashMap::new()));

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn register(chip: Chip) -> ChipHandle {
    let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    lock(&CHIPS).insert(id, Arc::new(Mutex::new(chip)));

    ChipHandle { id }
}

pub(crate) fn lookup(handle: ChipHandle) -> Result<SharedChip, GlueError> {
    lock(&CHIPS)
        .get(&handle.id)
        .cloned()
        .ok_or(GlueError::InvalidHandle(handle.id))
}

/// Remove the handle from the registry, the caller decides when the session itself goes away.
pub(crate) fn release(handle: ChipHandle) -> Result<SharedChip, GlueError> {
    lock(&CHIPS)
        .remove(&handle.id)
        .ok_or(GlueError::InvalidHandle(handle.id))
}
