// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use luwen_core::Arch;

use crate::{
    error::{BtWrapper, PlatformError},
    EthAddr, IntoChip,
};

use super::{ArcIf, AxiTable, Chip, ChipImpl, ChipInterface, Grayskull, Wormhole};

impl Chip {
    /// Open a session on a chip that is directly attached through `backend`.
    /// Nothing is read from the chip until the session is used.
    pub fn open<CI: ChipInterface + Send + Sync>(
        arch: Arch,
        backend: CI,
    ) -> Result<Chip, PlatformError> {
        let inner: Box<dyn ChipImpl> = match arch {
            Arch::Grayskull => Box::new(Self::gs_open(arch, backend)?),
            Arch::Wormhole => Box::new(Self::wh_open(arch, backend)?),
        };

        Ok(Chip::new(inner, None))
    }

    pub fn gs_open<CI: ChipInterface + Send + Sync>(
        arch: Arch,
        backend: CI,
    ) -> Result<Grayskull, PlatformError> {
        if let Arch::Grayskull = arch {
            let arc_if = ArcIf {
                axi_data: AxiTable::pci(),
            };

            Grayskull::create(Arc::new(backend), Arc::new(arc_if))
        } else {
            Err(PlatformError::WrongChipArch {
                actual: arch,
                expected: Arch::Grayskull,
                backtrace: BtWrapper::capture(),
            })
        }
    }

    pub fn wh_open<CI: ChipInterface + Send + Sync>(
        arch: Arch,
        backend: CI,
    ) -> Result<Wormhole, PlatformError> {
        if let Arch::Wormhole = arch {
            let arc_if = ArcIf {
                axi_data: AxiTable::pci(),
            };

            Wormhole::init(None, Arc::new(arc_if), Arc::new(backend))
        } else {
            Err(PlatformError::WrongChipArch {
                actual: arch,
                expected: Arch::Wormhole,
                backtrace: BtWrapper::capture(),
            })
        }
    }

    /// Open a session on a chip that is reached over ethernet through this one.
    ///
    /// Only wormhole chips can forward traffic. The returned session stays valid only as long as
    /// this session (and any session this one was opened through) remains open.
    pub fn open_remote(&self, addr: impl IntoChip<EthAddr>) -> Result<Chip, PlatformError> {
        self.link().ensure_open()?;

        let Some(wh) = self.as_wh() else {
            return Err(PlatformError::WrongChipArch {
                actual: self.get_arch(),
                expected: Arch::Wormhole,
                backtrace: BtWrapper::capture(),
            });
        };

        let remote = wh.open_remote(addr)?;
        Ok(Chip::new(Box::new(remote), Some(self.link().clone())))
    }
}
