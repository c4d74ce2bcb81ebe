// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0
#![crate_type = "lib"]

pub use arc_msg::{ArcMsg, ArcMsgError, ArcMsgOk, ArcMsgProtocolError, TypedArcMsg};
pub use chip::eth_addr::{EthAddr, IntoChip};
pub use chip::{Chip, ChipImpl, SessionState};
pub use interface::{CallbackStorage, DeviceInfo, FnAxi, FnDriver, FnNoc, FnOptions, FnRemote};

/// Luwen-if implements all high level functions in a backend agnostic way.
/// In the simplest terms this includes everything defined in `ChipImpl` and `HlComms`.
/// But this also includes chip specific functions which can be found in `Wormhole` and `Grayskull` chips.
///
/// The only thing a backend has to provide is an implementation of `ChipInterface`, either directly
/// or through a `CallbackStorage` dispatch function.
pub mod arc_msg;
pub mod chip;
pub mod error;
mod interface;
