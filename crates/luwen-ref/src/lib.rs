// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! An in-memory stand in for a set of chips connected to the host and to each other over
//! ethernet. It implements `ChipInterface` so everything in `luwen-if` can be driven without
//! hardware.

use luwen_if::{chip::ChipInterface, FnAxi, FnDriver, FnNoc, FnOptions};

mod chip;
mod detect;
pub mod error;
mod transport;

pub use chip::{
    ArcResponse, SimChip, ETH_FW_VERSION, TELEMETRY_CSM_OFFSET, TELEMETRY_ENUM_VERSION,
};
pub use detect::detect_chips;
pub use transport::{Call, SharedFabric, SimFabric, SimTransport};

/// Dispatch function for use with `luwen_if::CallbackStorage`.
pub fn comms_callback(
    ud: &SimTransport,
    op: FnOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    match op {
        FnOptions::Driver(FnDriver::DeviceInfo(info)) => {
            *info = ud.get_device_info()?;
        }
        FnOptions::Axi(op) => match op {
            FnAxi::Read { addr, data } => ud.axi_read(addr, data)?,
            FnAxi::Write { addr, data } => ud.axi_write(addr, data)?,
        },
        FnOptions::Noc(op) => match op {
            FnNoc::Read {
                noc_id,
                x,
                y,
                addr,
                data,
            } => ud.noc_read(noc_id, x, y, addr, data)?,
            FnNoc::Write {
                noc_id,
                x,
                y,
                addr,
                data,
            } => ud.noc_write(noc_id, x, y, addr, data)?,
            FnNoc::Broadcast { noc_id, addr, data } => ud.noc_broadcast(noc_id, addr, data)?,
        },
        FnOptions::Eth(op) => match op.rw {
            FnNoc::Read {
                noc_id,
                x,
                y,
                addr,
                data,
            } => ud.eth_noc_read(op.addr, noc_id, x, y, addr, data)?,
            FnNoc::Write {
                noc_id,
                x,
                y,
                addr,
                data,
            } => ud.eth_noc_write(op.addr, noc_id, x, y, addr, data)?,
            FnNoc::Broadcast { noc_id, addr, data } => {
                ud.eth_noc_broadcast(op.addr, noc_id, addr, data)?
            }
        },
    }

    Ok(())
}
