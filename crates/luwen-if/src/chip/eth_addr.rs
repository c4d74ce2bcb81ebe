// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

use super::{remote::ETH_FW_VERSION_ADDR, ChipComms, ChipInterface, EthAddresses};

/// Byte offset of the local coordinate word in the eth firmware node info block.
pub(crate) const NODE_INFO_COORD_OFFSET: u64 = 8;

#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EthAddr {
    pub shelf_x: u8,
    pub shelf_y: u8,
    pub rack_x: u8,
    pub rack_y: u8,
}

impl EthAddr {
    /// Decode the coordinate word the ethernet firmware publishes in its node info block.
    pub fn from_coord_word(coord: u32) -> Self {
        EthAddr {
            rack_x: (coord & 0xFF) as u8,
            rack_y: ((coord >> 8) & 0xFF) as u8,
            shelf_x: ((coord >> 16) & 0xFF) as u8,
            shelf_y: ((coord >> 24) & 0xFF) as u8,
        }
    }

    pub fn to_coord_word(&self) -> u32 {
        self.rack_x as u32
            | (self.rack_y as u32) << 8
            | (self.shelf_x as u32) << 16
            | (self.shelf_y as u32) << 24
    }
}

pub trait IntoChip<T>: Sized {
    fn cinto(&self, chip: &dyn ChipComms, cif: &dyn ChipInterface) -> Result<T, PlatformError>;
}

/// Read the coordinate of the chip reached through `chip` from its first ethernet core.
/// The node info block is located through the firmware version of that core.
pub fn get_local_chip_coord(
    chip: &dyn ChipComms,
    cif: &dyn ChipInterface,
) -> Result<EthAddr, PlatformError> {
    let fw_version = chip.noc_read32(cif, 0, 9, 0, ETH_FW_VERSION_ADDR)?;
    let node_info = EthAddresses::new(fw_version).node_info;
    let coord = chip.noc_read32(cif, 0, 9, 0, node_info + NODE_INFO_COORD_OFFSET)?;

    Ok(EthAddr::from_coord_word(coord))
}

impl IntoChip<EthAddr> for EthAddr {
    fn cinto(
        &self,
        _chip: &dyn ChipComms,
        _cif: &dyn ChipInterface,
    ) -> Result<EthAddr, PlatformError> {
        Ok(*self)
    }
}

/// (rack_x, rack_y, shelf_x, shelf_y), missing values are taken from the local chip.
impl IntoChip<EthAddr> for (Option<u8>, Option<u8>, Option<u8>, Option<u8>) {
    fn cinto(
        &self,
        chip: &dyn ChipComms,
        cif: &dyn ChipInterface,
    ) -> Result<EthAddr, PlatformError> {
        let local_coord = get_local_chip_coord(chip, cif)?;

        let rack_x = self.0.unwrap_or(local_coord.rack_x);
        let rack_y = self.1.unwrap_or(local_coord.rack_y);
        let shelf_x = self.2.unwrap_or(local_coord.shelf_x);
        let shelf_y = self.3.unwrap_or(local_coord.shelf_y);

        Ok(EthAddr {
            rack_x,
            rack_y,
            shelf_x,
            shelf_y,
        })
    }
}

/// (rack_x, rack_y, shelf_x, shelf_y)
impl IntoChip<EthAddr> for (u8, u8, u8, u8) {
    fn cinto(
        &self,
        _chip: &dyn ChipComms,
        _cif: &dyn ChipInterface,
    ) -> Result<EthAddr, PlatformError> {
        let (rack_x, rack_y, shelf_x, shelf_y) = *self;

        Ok(EthAddr {
            rack_x,
            rack_y,
            shelf_x,
            shelf_y,
        })
    }
}

/// (shelf_x, shelf_y) on the same rack as the local chip.
impl IntoChip<EthAddr> for (u8, u8) {
    fn cinto(
        &self,
        chip: &dyn ChipComms,
        cif: &dyn ChipInterface,
    ) -> Result<EthAddr, PlatformError> {
        (None, None, Some(self.0), Some(self.1)).cinto(chip, cif)
    }
}

impl Display for EthAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "[{rack_x}, {rack_y}, {shelf_x}, {shelf_y}]",
            rack_x = self.rack_x,
            rack_y = self.rack_y,
            shelf_x = self.shelf_x,
            shelf_y = self.shelf_y
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_word_layout() {
        let addr = EthAddr::from_coord_word(0x0403_0201);
        assert_eq!(
            addr,
            EthAddr {
                rack_x: 1,
                rack_y: 2,
                shelf_x: 3,
                shelf_y: 4,
            }
        );
        assert_eq!(addr.to_coord_word(), 0x0403_0201);
    }

    #[test]
    fn display_is_rack_then_shelf() {
        let addr = EthAddr {
            shelf_x: 1,
            shelf_y: 0,
            rack_x: 2,
            rack_y: 3,
        };
        assert_eq!(addr.to_string(), "[2, 3, 1, 0]");
    }

    mod coord {
        use std::{collections::HashMap, sync::Arc};

        use super::super::*;
        use crate::{
            chip::{ArcIf, AxiTable},
            CallbackStorage, FnNoc, FnOptions,
        };

        type NocWords = Arc<HashMap<(u8, u8, u64), u32>>;

        fn read_words(
            words: &NocWords,
            op: FnOptions,
        ) -> Result<(), Box<dyn std::error::Error>> {
            if let FnOptions::Noc(FnNoc::Read {
                x, y, addr, data, ..
            }) = op
            {
                let word = words.get(&(x, y, addr)).copied().unwrap_or(0);
                data.copy_from_slice(&word.to_le_bytes()[..data.len()]);
            }
            Ok(())
        }

        fn resolve(fw_version: u32, node_info: u64, partial: (u8, u8)) -> EthAddr {
            let local = EthAddr {
                rack_x: 1,
                rack_y: 2,
                shelf_x: 3,
                shelf_y: 4,
            };
            let words: HashMap<(u8, u8, u64), u32> = HashMap::from([
                ((9, 0, ETH_FW_VERSION_ADDR), fw_version),
                ((9, 0, node_info + NODE_INFO_COORD_OFFSET), local.to_coord_word()),
            ]);
            let storage = CallbackStorage::new(read_words, Arc::new(words));
            let arc_if = ArcIf {
                axi_data: AxiTable::pci(),
            };

            partial.cinto(&arc_if, &storage).unwrap()
        }

        #[test]
        fn partial_address_uses_current_layout() {
            let addr = resolve(0x0006_7000, 0x1100, (7, 8));
            assert_eq!(
                addr,
                EthAddr {
                    rack_x: 1,
                    rack_y: 2,
                    shelf_x: 7,
                    shelf_y: 8,
                }
            );
        }

        #[test]
        fn partial_address_uses_old_firmware_layout() {
            let addr = resolve(0x0002_1000, 0x5100, (7, 8));
            assert_eq!((addr.rack_x, addr.rack_y), (1, 2));
            assert_eq!((addr.shelf_x, addr.shelf_y), (7, 8));
        }
    }
}
