// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport agnostic communication with Tenstorrent chips.
//!
//! `api` holds the chip sessions, ARC messaging and telemetry, `arch` the chip family tag and
//! `sim` an in-memory fabric that can stand in for real hardware.

pub use luwen_core as arch;
pub use luwen_if as api;
pub use luwen_ref as sim;
