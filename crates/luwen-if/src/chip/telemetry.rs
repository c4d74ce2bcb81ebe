// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use luwen_core::Arch;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

use super::{ChipComms, ChipInterface};

/// Address ARC reports for the telemetry block is relative to the start of its CSM.
const ARC_CSM_ARC_VIEW_BASE: u32 = 0x1000_0000;

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub arch: Arch,
    pub board_id: u64,
    pub enum_version: u32,
    pub device_id: u32,
    pub board_id_high: u32,
    pub board_id_low: u32,
}

impl Telemetry {
    /// Return the board serial number as an integer.
    pub fn board_serial_number(&self) -> u64 {
        ((self.board_id_high as u64) << 32) | self.board_id_low as u64
    }

    /// Return the board serial number as a hex-formatted string.
    pub fn board_serial_number_hex(&self) -> String {
        format!("{:016x}", self.board_serial_number())
    }

    /// Return the board type or None if unknown
    pub fn try_board_type(&self) -> Option<&'static str> {
        let serial_num = self.board_serial_number();
        let output = match (serial_num >> 36) & 0xFFFFF {
            0x1 => match (serial_num >> 32) & 0xF {
                0x2 => "E300_R2",
                0x3 | 0x4 => "E300_R3",
                _ => return None,
            },
            0x3 => "e150",
            0x7 => "e75",
            0x8 => "NEBULA_CB",
            0xA => "e300",
            0xB => "GALAXY",
            0x14 => "n300",
            0x18 => "n150",
            0x35 => "galaxy-wormhole",
            _ => return None,
        };

        Some(output)
    }

    /// Return the board type of UNSUPPORTED
    pub fn board_type(&self) -> &'static str {
        self.try_board_type().unwrap_or("UNSUPPORTED")
    }
}

/// Read the telemetry block that ARC reported to live at `telemetry_addr`.
pub(crate) fn read_telemetry(
    arch: Arch,
    arc_if: &dyn ChipComms,
    chip_if: &dyn ChipInterface,
    telemetry_addr: u32,
) -> Result<Telemetry, PlatformError> {
    let offset = telemetry_addr
        .checked_sub(ARC_CSM_ARC_VIEW_BASE)
        .ok_or_else(|| {
            PlatformError::from(format!(
                "ARC reported telemetry at {telemetry_addr:#x} which is outside of its CSM"
            ))
        })?;

    let csm_offset = arc_if.axi_translate("ARC_CSM.DATA[0]")?;
    let telemetry_struct_offset = csm_offset.addr + offset as u64;

    let enum_version = arc_if.axi_read32(chip_if, telemetry_struct_offset)?;
    let device_id = arc_if.axi_read32(chip_if, telemetry_struct_offset + 4)?;
    let board_id_high = arc_if.axi_read32(chip_if, telemetry_struct_offset + (4 * 4))?;
    let board_id_low = arc_if.axi_read32(chip_if, telemetry_struct_offset + (5 * 4))?;

    Ok(Telemetry {
        arch,
        board_id: ((board_id_high as u64) << 32) | board_id_low as u64,
        enum_version,
        device_id,
        board_id_high,
        board_id_low,
    })
}
