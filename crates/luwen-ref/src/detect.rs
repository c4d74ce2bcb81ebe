// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use luwen_if::chip::Chip;
use tracing::info;

use crate::{
    error::LuwenError,
    transport::{lock, SharedFabric, SimTransport},
};

/// Open a session on every chip of the fabric that has its own host link.
/// Chips are not initialized, that is left to the caller.
pub fn detect_chips(fabric: &SharedFabric) -> Result<Vec<Chip>, LuwenError> {
    let attached = lock(fabric).attached();

    let mut chips = Vec::with_capacity(attached.len());
    for (addr, arch) in attached {
        info!(%addr, %arch, "found chip");
        chips.push(Chip::open(arch, SimTransport::new(fabric.clone(), addr))?);
    }

    Ok(chips)
}

#[cfg(test)]
mod tests {
    use luwen_if::EthAddr;

    use super::*;
    use crate::{SimChip, SimFabric};

    #[test]
    fn detached_chips_are_skipped() {
        let remote = EthAddr {
            shelf_x: 1,
            ..Default::default()
        };
        let fabric = SimFabric::new()
            .with_chip(SimChip::wormhole())
            .with_chip(SimChip::wormhole().at(remote).detached())
            .into_shared();

        let chips = detect_chips(&fabric).unwrap();
        assert_eq!(chips.len(), 1);
    }
}
