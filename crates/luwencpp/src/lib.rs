// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    ffi::{c_char, CString},
    time::Duration,
};

use luwen_if::{
    chip::{ArcMsgOptions, Chip, HlComms, InitOptions},
    error::PlatformError,
    ArcMsg, ArcMsgOk, CallbackStorage, ChipImpl,
};
use thiserror::Error;
use tracing::{debug, warn};

mod glue;
mod registry;

pub use glue::{callback_glue, LuwenGlue};
pub use registry::ChipHandle;

use registry::{lock, lookup, register, release};

#[derive(Error, Debug)]
pub enum GlueError {
    #[error("the {0} callback was not provided")]
    MissingCallback(&'static str),

    #[error("invalid handle {0}, the chip was never opened or has already been closed")]
    InvalidHandle(u64),

    #[error("{0} is null")]
    NullPointer(&'static str),

    #[error("noc coordinate ({0}, {1}) is out of range")]
    InvalidNode(u32, u32),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EthAddr {
    pub shelf_x: u8,
    pub shelf_y: u8,
    pub rack_x: u8,
    pub rack_y: u8,
}

impl From<EthAddr> for luwen_if::EthAddr {
    fn from(value: EthAddr) -> Self {
        luwen_if::EthAddr {
            shelf_x: value.shelf_x,
            shelf_y: value.shelf_y,
            rack_x: value.rack_x,
            rack_y: value.rack_y,
        }
    }
}

impl From<luwen_if::EthAddr> for EthAddr {
    fn from(value: luwen_if::EthAddr) -> Self {
        EthAddr {
            shelf_x: value.shelf_x,
            shelf_y: value.shelf_y,
            rack_x: value.rack_x,
            rack_y: value.rack_y,
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    GRAYSKULL,
    WORMHOLE,
}

impl From<Arch> for luwen_core::Arch {
    fn from(value: Arch) -> Self {
        match value {
            Arch::GRAYSKULL => luwen_core::Arch::Grayskull,
            Arch::WORMHOLE => luwen_core::Arch::Wormhole,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub interface_id: u32,

    pub domain: u16,
    pub bus: u16,
    pub slot: u16,
    pub function: u16,

    pub vendor: u16,
    pub device_id: u16,
    pub bar_size: u64,
}

impl From<DeviceInfo> for luwen_if::DeviceInfo {
    fn from(value: DeviceInfo) -> Self {
        luwen_if::DeviceInfo {
            interface_id: value.interface_id,
            domain: value.domain,
            bus: value.bus,
            slot: value.slot,
            function: value.function,
            vendor: value.vendor,
            device_id: value.device_id,
            bar_size: value.bar_size,
        }
    }
}

impl From<luwen_if::DeviceInfo> for DeviceInfo {
    fn from(value: luwen_if::DeviceInfo) -> Self {
        DeviceInfo {
            interface_id: value.interface_id,
            domain: value.domain,
            bus: value.bus,
            slot: value.slot,
            function: value.function,
            vendor: value.vendor,
            device_id: value.device_id,
            bar_size: value.bar_size,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub board_id: u64,
}

impl From<luwen_if::chip::Telemetry> for Telemetry {
    fn from(value: luwen_if::chip::Telemetry) -> Self {
        Telemetry {
            board_id: value.board_id,
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CResultTag {
    Ok,
    Err,
}

/// On `Err` the message is owned by the caller and must be released with `luwen_free_error`.
#[repr(C)]
#[derive(Debug)]
pub struct CResult {
    pub tag: CResultTag,
    pub ok: u32,
    pub err: *mut c_char,
}

impl CResult {
    pub fn ok(value: u32) -> CResult {
        CResult {
            tag: CResultTag::Ok,
            ok: value,
            err: std::ptr::null_mut(),
        }
    }

    pub fn err(value: &str) -> CResult {
        let message = CString::new(value.replace('\0', " ")).unwrap_or_default();
        CResult {
            tag: CResultTag::Err,
            ok: 0,
            err: message.into_raw(),
        }
    }
}

impl From<Result<u32, GlueError>> for CResult {
    fn from(value: Result<u32, GlueError>) -> Self {
        match value {
            Ok(value) => CResult::ok(value),
            Err(err) => {
                debug!(%err, "returning error over the c boundary");
                CResult::err(&err.to_string())
            }
        }
    }
}

fn with_chip<T>(
    handle: ChipHandle,
    f: impl FnOnce(&mut Chip) -> Result<T, PlatformError>,
) -> Result<T, GlueError> {
    let chip = lookup(handle)?;
    let mut chip = lock(&chip);
    Ok(f(&mut chip)?)
}

/// Timeouts are given in seconds, negative values wait forever.
fn timeout_from_secs(timeout: i32) -> Duration {
    if timeout < 0 {
        Duration::MAX
    } else {
        Duration::from_secs(timeout as u64)
    }
}

/// The C surface carries noc coordinates as u32, the same width the glue callbacks use.
fn node(x: u32, y: u32) -> Result<(u8, u8), GlueError> {
    match (u8::try_from(x), u8::try_from(y)) {
        (Ok(x), Ok(y)) => Ok((x, y)),
        _ => Err(GlueError::InvalidNode(x, y)),
    }
}

/// # Safety
///
/// `data` must be valid for `len` bytes, it may only be null if `len` is zero.
unsafe fn buffer<'a>(data: *const u8, len: usize) -> Result<&'a [u8], GlueError> {
    if len == 0 {
        Ok(&[])
    } else if data.is_null() {
        Err(GlueError::NullPointer("data"))
    } else {
        Ok(unsafe { std::slice::from_raw_parts(data, len) })
    }
}

/// # Safety
///
/// `data` must be valid for writes of `len` bytes, it may only be null if `len` is zero.
unsafe fn buffer_mut<'a>(data: *mut u8, len: usize) -> Result<&'a mut [u8], GlueError> {
    if len == 0 {
        Ok(&mut [])
    } else if data.is_null() {
        Err(GlueError::NullPointer("data"))
    } else {
        Ok(unsafe { std::slice::from_raw_parts_mut(data, len) })
    }
}

/// Bind a transport to a chip. Nothing is sent to the chip.
/// Returns an invalid handle (zero) if the callback table is incomplete.
#[no_mangle]
pub extern "C" fn luwen_open(arch: Arch, glue: LuwenGlue) -> ChipHandle {
    let opened = glue.validate().and_then(|_| {
        Ok(Chip::open(
            arch.into(),
            CallbackStorage::new(callback_glue, glue),
        )?)
    });

    match opened {
        Ok(chip) => register(chip),
        Err(err) => {
            warn!(%err, "failed to open chip");
            ChipHandle::INVALID
        }
    }
}

/// Open a chip that is reached over ethernet through `local_chip`.
/// Returns an invalid handle (zero) if `local_chip` is closed or can't forward ethernet traffic.
#[no_mangle]
pub extern "C" fn luwen_open_remote(local_chip: ChipHandle, addr: EthAddr) -> ChipHandle {
    match with_chip(local_chip, |chip| {
        chip.open_remote(luwen_if::EthAddr::from(addr))
    }) {
        Ok(remote) => register(remote),
        Err(err) => {
            warn!(%err, "failed to open remote chip");
            ChipHandle::INVALID
        }
    }
}

/// Close the session. Any remote chip opened through it can no longer be used.
#[no_mangle]
pub extern "C" fn luwen_close(chip: ChipHandle) -> CResult {
    release(chip)
        .map(|chip| {
            lock(&chip).link().close();
            0u32
        })
        .into()
}

/// Bring the chip up with the default init options, blocks until it is ready or init fails.
#[no_mangle]
pub extern "C" fn luwen_init(chip: ChipHandle) -> CResult {
    with_chip(chip, |chip| {
        chip.init(InitOptions::default())?;
        Ok(0u32)
    })
    .into()
}

/// Send a message to ARC. On completion the exit code is returned and the return register is
/// written to `return_3` if it is not null. `timeout` is in seconds, below zero waits forever.
///
/// # Safety
///
/// `return_3` must either be null or point to a writable u32.
#[no_mangle]
pub unsafe extern "C" fn chip_arc_msg(
    chip: ChipHandle,
    msg: u32,
    wait_for_done: bool,
    arg0: u16,
    arg1: u16,
    timeout: i32,
    return_3: *mut u32,
) -> CResult {
    let result = with_chip(chip, |chip| {
        chip.arc_msg(ArcMsgOptions {
            msg: ArcMsg::from_values(msg, arg0, arg1),
            wait_for_done,
            timeout: timeout_from_secs(timeout),
            ..Default::default()
        })
    });

    match result {
        Ok(ArcMsgOk::Ok { rc, arg }) => {
            if !return_3.is_null() {
                unsafe {
                    *return_3 = arg;
                }
            }
            CResult::ok(rc)
        }
        Ok(ArcMsgOk::OkNoWait) => CResult::ok(0),
        Err(err) => CResult::from(Err::<u32, _>(err)),
    }
}

/// Returns a zeroed struct if the telemetry could not be read.
#[no_mangle]
pub extern "C" fn chip_telemetry(chip: ChipHandle) -> Telemetry {
    match with_chip(chip, |chip| chip.get_telemetry()) {
        Ok(telemetry) => telemetry.into(),
        Err(err) => {
            warn!(%err, "failed to read telemetry");
            Telemetry::default()
        }
    }
}

/// Writes the transport description to `info` and returns 1, or returns 0 for remote chips
/// which have no transport of their own.
///
/// # Safety
///
/// `info` must point to a writable DeviceInfo.
#[no_mangle]
pub unsafe extern "C" fn chip_device_info(chip: ChipHandle, info: *mut DeviceInfo) -> CResult {
    let result = with_chip(chip, |chip| chip.get_device_info()).and_then(|device_info| {
        if info.is_null() {
            return Err(GlueError::NullPointer("info"));
        }

        Ok(match device_info {
            Some(device_info) => {
                unsafe {
                    *info = device_info.into();
                }
                1u32
            }
            None => 0,
        })
    });

    result.into()
}

/// # Safety
///
/// `data` must be valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn chip_axi_read(
    chip: ChipHandle,
    addr: u64,
    data: *mut u8,
    len: u32,
) -> CResult {
    unsafe { buffer_mut(data, len as usize) }
        .and_then(|data| with_chip(chip, |chip| chip.axi_read(addr, data)))
        .map(|_| 0u32)
        .into()
}

/// # Safety
///
/// `data` must be valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn chip_axi_write(
    chip: ChipHandle,
    addr: u64,
    data: *const u8,
    len: u32,
) -> CResult {
    unsafe { buffer(data, len as usize) }
        .and_then(|data| with_chip(chip, |chip| chip.axi_write(addr, data)))
        .map(|_| 0u32)
        .into()
}

/// # Safety
///
/// `data` must be valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn chip_noc_read(
    chip: ChipHandle,
    noc_id: u8,
    x: u32,
    y: u32,
    addr: u64,
    data: *mut u8,
    len: u64,
) -> CResult {
    let (x, y) = match node(x, y) {
        Ok(node) => node,
        Err(err) => return Err::<u32, _>(err).into(),
    };

    unsafe { buffer_mut(data, len as usize) }
        .and_then(|data| with_chip(chip, |chip| chip.noc_read(noc_id, x, y, addr, data)))
        .map(|_| 0u32)
        .into()
}

/// # Safety
///
/// `data` must be valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn chip_noc_write(
    chip: ChipHandle,
    noc_id: u8,
    x: u32,
    y: u32,
    addr: u64,
    data: *const u8,
    len: u64,
) -> CResult {
    let (x, y) = match node(x, y) {
        Ok(node) => node,
        Err(err) => return Err::<u32, _>(err).into(),
    };

    unsafe { buffer(data, len as usize) }
        .and_then(|data| with_chip(chip, |chip| chip.noc_write(noc_id, x, y, addr, data)))
        .map(|_| 0u32)
        .into()
}

/// # Safety
///
/// `data` must be valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn chip_noc_broadcast(
    chip: ChipHandle,
    noc_id: u8,
    addr: u64,
    data: *const u8,
    len: u64,
) -> CResult {
    unsafe { buffer(data, len as usize) }
        .and_then(|data| with_chip(chip, |chip| chip.noc_broadcast(noc_id, addr, data)))
        .map(|_| 0u32)
        .into()
}

/// Release the message of an `Err` result.
///
/// # Safety
///
/// `err` must be null or a message returned in a `CResult` that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn luwen_free_error(err: *mut c_char) {
    if !err.is_null() {
        drop(unsafe { CString::from_raw(err) });
    }
}
