// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{
    communication::{
        chip_comms::{AxiData, AxiError, AxiTable, ChipComms},
        chip_interface::ChipInterface,
    },
    eth_addr::EthAddr,
};

/// NOC node of the ARC core on a wormhole.
pub const ARC_NOC_X: u8 = 0;
pub const ARC_NOC_Y: u8 = 10;

/// Routing for a chip that is only reachable over ethernet.
/// Every access is forwarded to the `eth_*` callbacks of the transport that reached the
/// delegate chip, tagged with the address of this chip.
pub struct RemoteArcIf {
    pub addr: EthAddr,
    pub axi_data: AxiTable,
}

impl ChipComms for RemoteArcIf {
    fn axi_translate(&self, addr: &str) -> Result<AxiData, AxiError> {
        self.axi_data.translate(addr)
    }

    fn axi_read(
        &self,
        chip_if: &dyn ChipInterface,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        chip_if.eth_noc_read(self.addr, 0, ARC_NOC_X, ARC_NOC_Y, addr, data)
    }

    fn axi_write(
        &self,
        chip_if: &dyn ChipInterface,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        chip_if.eth_noc_write(self.addr, 0, ARC_NOC_X, ARC_NOC_Y, addr, data)
    }

    fn noc_read(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        chip_if.eth_noc_read(self.addr, noc_id, x, y, addr, data)
    }

    fn noc_write(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        chip_if.eth_noc_write(self.addr, noc_id, x, y, addr, data)
    }

    fn noc_broadcast(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        chip_if.eth_noc_broadcast(self.addr, noc_id, addr, data)
    }
}

/// Every firmware version publishes its version word here.
pub const ETH_FW_VERSION_ADDR: u64 = 0x210;

/// Location of the ethernet firmware structures, these move between firmware versions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EthAddresses {
    pub masked_version: u32,

    pub version: u64,
    pub boot_params: u64,
    pub node_info: u64,
    pub eth_conn_info: u64,
    pub heartbeat: u64,
}

impl EthAddresses {
    pub fn new(fw_version: u32) -> Self {
        let masked_version = fw_version & 0x00FFFFFF;

        let (boot_params, node_info, eth_conn_info) = if masked_version >= 0x030000 {
            (0x1000, 0x1100, 0x1200)
        } else {
            (0x5000, 0x5100, 0x5200)
        };

        let heartbeat = if masked_version >= 0x060000 {
            0x1c
        } else {
            0x1f80
        };

        EthAddresses {
            masked_version,
            version: ETH_FW_VERSION_ADDR,
            boot_params,
            node_info,
            eth_conn_info,
            heartbeat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_addresses_follow_fw_version() {
        let current = EthAddresses::new(0x0006_7000);
        assert_eq!(current.node_info, 0x1100);
        assert_eq!(current.heartbeat, 0x1c);

        let old = EthAddresses::new(0x0002_0000);
        assert_eq!(old.node_info, 0x5100);
        assert_eq!(old.heartbeat, 0x1f80);

        // The top byte is not part of the version.
        assert_eq!(EthAddresses::new(0xFF06_7000).masked_version, 0x0006_7000);
    }
}
