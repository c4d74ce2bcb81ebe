// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use thiserror::Error;

use super::chip_interface::ChipInterface;

#[derive(Error, Debug)]
pub enum AxiError {
    #[error("Invalid path: {key} specifically was not able to find {path}")]
    InvalidPath { key: String, path: String },

    #[error("Invalid path: {key} specifically was not able to parse {path} as an array def.")]
    InvalidArrayPath { key: String, path: String },

    #[error("The readbuffer is not large enough to hold the requested data")]
    ReadBufferTooSmall,

    #[error("The writebuffer is not the same size as the requested field")]
    WriteBufferMismatch,

    #[error("AXI address {0:#x} does not fit in the 32 bit bar window")]
    AddressOutOfRange(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxiData {
    pub addr: u64,
    pub size: u64,
}

#[derive(Clone, Debug)]
struct AxiRegion {
    offset: u64,
    size: u64,
    array_count: Option<u64>,
}

/// Base of the ARC register block when seen over the pci bar.
pub const PCI_ARC_RESET_BASE: u64 = 0x1FF3_0000;
pub const PCI_ARC_CSM_BASE: u64 = 0x1FE8_0000;

/// Base of the ARC register block when seen over the noc, at the ARC node.
pub const NOC_ARC_RESET_BASE: u64 = 0x8_8003_0000;
pub const NOC_ARC_CSM_BASE: u64 = 0x8_1000_0000;

/// Name to address table for the ARC registers that this crate touches.
/// Grayskull and wormhole share this layout, only the path used to reach it differs.
#[derive(Clone, Debug)]
pub struct AxiTable {
    regions: HashMap<String, AxiRegion>,
}

impl AxiTable {
    fn with_bases(reset_base: u64, csm_base: u64) -> Self {
        let mut regions = HashMap::new();

        regions.insert(
            "ARC_RESET.SCRATCH".to_string(),
            AxiRegion {
                offset: reset_base + 0x60,
                size: 4,
                array_count: Some(8),
            },
        );
        // The post code lives in the first scratch register.
        regions.insert(
            "ARC_RESET.POST_CODE".to_string(),
            AxiRegion {
                offset: reset_base + 0x60,
                size: 4,
                array_count: None,
            },
        );
        regions.insert(
            "ARC_RESET.ARC_MISC_CNTL".to_string(),
            AxiRegion {
                offset: reset_base + 0x100,
                size: 4,
                array_count: None,
            },
        );
        regions.insert(
            "ARC_CSM.DATA".to_string(),
            AxiRegion {
                offset: csm_base,
                size: 4,
                array_count: Some(0x20000),
            },
        );

        Self { regions }
    }

    /// Table used when ARC is reached directly over the pci bar.
    pub fn pci() -> Self {
        Self::with_bases(PCI_ARC_RESET_BASE, PCI_ARC_CSM_BASE)
    }

    /// Table used when ARC is reached as a noc endpoint, i.e. for remote chips.
    pub fn noc() -> Self {
        Self::with_bases(NOC_ARC_RESET_BASE, NOC_ARC_CSM_BASE)
    }

    /// Translate a path of the form `BLOCK.REGISTER` or `BLOCK.REGISTER[index]`.
    pub fn translate(&self, path: &str) -> Result<AxiData, AxiError> {
        let (key, index) = match path.split_once('[') {
            Some((key, rest)) => {
                let index = rest
                    .strip_suffix(']')
                    .and_then(|index| index.parse::<u64>().ok())
                    .ok_or_else(|| AxiError::InvalidArrayPath {
                        key: key.to_string(),
                        path: path.to_string(),
                    })?;
                (key, Some(index))
            }
            None => (path, None),
        };

        let region = self.regions.get(key).ok_or_else(|| AxiError::InvalidPath {
            key: key.to_string(),
            path: path.to_string(),
        })?;

        let index = match (region.array_count, index) {
            (Some(count), Some(index)) if index < count => index,
            (None, None) => 0,
            _ => {
                return Err(AxiError::InvalidArrayPath {
                    key: key.to_string(),
                    path: path.to_string(),
                })
            }
        };

        Ok(AxiData {
            addr: region.offset + region.size * index,
            size: region.size,
        })
    }
}

/// This is a generic trait which defines the high level chip communication primatives.
/// It's functions allow for the reading and writing of data to arbirary noc endpoints on any chip
/// with the details of how the endpoint is accessed abstracted away.
///
/// For the ARC endpoint special functions are defined because unlike most noc endpoints the ARC addresses
/// are mapped into the pci BAR address space.
pub trait ChipComms {
    /// Translate a String path into the corresponding AXI address.
    fn axi_translate(&self, addr: &str) -> Result<AxiData, AxiError>;
    /// Read and write to the NOC using AXI address gotten from `axi_translate`.
    fn axi_read(
        &self,
        chip_if: &dyn ChipInterface,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error>>;
    fn axi_write(
        &self,
        chip_if: &dyn ChipInterface,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Read and write to a noc endpoint, this could be a local or remote chip.
    fn noc_read(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error>>;
    fn noc_write(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>>;
    fn noc_broadcast(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Convenience functions for reading and writing 32 bit values.
    fn noc_read32(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        let mut value = [0; 4];
        self.noc_read(chip_if, noc_id, x, y, addr, &mut value)?;
        Ok(u32::from_le_bytes(value))
    }

    fn noc_write32(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        value: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.noc_write(chip_if, noc_id, x, y, addr, value.to_le_bytes().as_slice())
    }

    fn noc_broadcast32(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        addr: u64,
        value: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.noc_broadcast(chip_if, noc_id, addr, value.to_le_bytes().as_slice())
    }

    fn axi_read32(
        &self,
        chip_if: &dyn ChipInterface,
        addr: u64,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        let mut value = [0; 4];
        self.axi_read(chip_if, addr, &mut value)?;
        Ok(u32::from_le_bytes(value))
    }

    fn axi_write32(
        &self,
        chip_if: &dyn ChipInterface,
        addr: u64,
        value: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.axi_write(chip_if, addr, value.to_le_bytes().as_slice())
    }

    fn axi_sread32(
        &self,
        chip_if: &dyn ChipInterface,
        addr: &str,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        let addr = self.axi_translate(addr)?.addr;
        self.axi_read32(chip_if, addr)
    }

    fn axi_swrite32(
        &self,
        chip_if: &dyn ChipInterface,
        addr: &str,
        value: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.axi_translate(addr)?.addr;
        self.axi_write32(chip_if, addr, value)
    }
}

/// Local AXI goes through a 32 bit bar offset, wider addresses are rejected instead of wrapped.
fn bar_addr(addr: u64) -> Result<u32, AxiError> {
    u32::try_from(addr).map_err(|_| AxiError::AddressOutOfRange(addr))
}

/// Routing for a chip that is directly attached to the transport.
pub struct ArcIf {
    pub axi_data: AxiTable,
}

impl ChipComms for ArcIf {
    fn axi_translate(&self, addr: &str) -> Result<AxiData, AxiError> {
        self.axi_data.translate(addr)
    }

    fn axi_read(
        &self,
        chip_if: &dyn ChipInterface,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        chip_if.axi_read(bar_addr(addr)?, data)
    }

    fn axi_write(
        &self,
        chip_if: &dyn ChipInterface,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        chip_if.axi_write(bar_addr(addr)?, data)
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
        chip_if.noc_read(noc_id, x, y, addr, data)
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
        chip_if.noc_write(noc_id, x, y, addr, data)
    }

    fn noc_broadcast(
        &self,
        chip_if: &dyn ChipInterface,
        noc_id: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        chip_if.noc_broadcast(noc_id, addr, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_scratch_registers() {
        let table = AxiTable::pci();

        assert_eq!(
            table.translate("ARC_RESET.SCRATCH[0]").unwrap().addr,
            0x1FF3_0060
        );
        assert_eq!(
            table.translate("ARC_RESET.SCRATCH[5]").unwrap().addr,
            0x1FF3_0074
        );
        assert_eq!(
            table.translate("ARC_RESET.ARC_MISC_CNTL").unwrap().addr,
            0x1FF3_0100
        );
        assert_eq!(
            AxiTable::noc()
                .translate("ARC_RESET.SCRATCH[3]")
                .unwrap()
                .addr,
            0x8_8003_006C
        );
    }

    #[test]
    fn translate_rejects_bad_paths() {
        let table = AxiTable::pci();

        assert!(matches!(
            table.translate("ARC_RESET.NOT_A_REG"),
            Err(AxiError::InvalidPath { .. })
        ));
        assert!(matches!(
            table.translate("ARC_RESET.SCRATCH[8]"),
            Err(AxiError::InvalidArrayPath { .. })
        ));
        assert!(matches!(
            table.translate("ARC_RESET.SCRATCH"),
            Err(AxiError::InvalidArrayPath { .. })
        ));
        assert!(matches!(
            table.translate("ARC_RESET.ARC_MISC_CNTL[0]"),
            Err(AxiError::InvalidArrayPath { .. })
        ));
        assert!(matches!(
            table.translate("ARC_RESET.SCRATCH[x]"),
            Err(AxiError::InvalidArrayPath { .. })
        ));
    }

    #[test]
    fn local_axi_rejects_wide_addresses() {
        use std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        };

        use crate::{CallbackStorage, FnOptions};

        fn count(
            calls: &Arc<AtomicUsize>,
            _op: FnOptions,
        ) -> Result<(), Box<dyn std::error::Error>> {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let storage = CallbackStorage::new(count, calls.clone());
        let arc_if = ArcIf {
            axi_data: AxiTable::pci(),
        };

        let err = arc_if
            .axi_write(&storage, 0x1_0000_0040, &[0xaa, 0xbb, 0xcc, 0xdd])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AxiError>(),
            Some(AxiError::AddressOutOfRange(0x1_0000_0040))
        ));

        let mut data = [0u8; 4];
        assert!(arc_if.axi_read(&storage, u64::MAX, &mut data).is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        arc_if.axi_read(&storage, 0xFFFF_FFFC, &mut data).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
