#![cfg(test)]

use proptest::prelude::*;

use luwen_glue::{
    api::{chip::HlComms, Chip},
    arch::Arch,
    sim::SimTransport,
};

/// Write-then-read through every path a session can take
///
/// These tests verify:
/// - AXI writes on a local chip read back unchanged
/// - NOC writes on a local chip read back unchanged
/// - NOC writes forwarded over ethernet read back unchanged, and land on the remote chip only
mod test_utils;

use test_utils::{shelf, wormhole_pair};

fn open_local() -> Chip {
    Chip::open(Arch::Wormhole, SimTransport::new(wormhole_pair(), shelf(0))).unwrap()
}

// Tensix nodes away from the ethernet rows and the ARC node.
fn tensix() -> impl Strategy<Value = (u8, u8)> {
    (1u8..10, 1u8..6)
}

fn payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 1..64)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn axi_write_reads_back(addr in 0x1000u64..0x10_0000, data in payload()) {
        let chip = open_local();

        chip.axi_write(addr, &data).unwrap();

        let mut readback = vec![0u8; data.len()];
        chip.axi_read(addr, &mut readback).unwrap();
        prop_assert_eq!(readback, data);
    }

    #[test]
    fn noc_write_reads_back(
        noc_id in 0u8..2,
        (x, y) in tensix(),
        addr in 0x1000u64..0x10_0000,
        data in payload()
    ) {
        let chip = open_local();

        chip.noc_write(noc_id, x, y, addr, &data).unwrap();

        let mut readback = vec![0u8; data.len()];
        chip.noc_read(noc_id, x, y, addr, &mut readback).unwrap();
        prop_assert_eq!(readback, data);
    }

    #[test]
    fn eth_write_reads_back(
        (x, y) in tensix(),
        addr in 0x1000u64..0x10_0000,
        value in any::<u32>()
    ) {
        let chip = open_local();
        let remote = chip.open_remote(shelf(1)).unwrap();

        remote.noc_write32(0, x, y, addr, value).unwrap();

        prop_assert_eq!(remote.noc_read32(0, x, y, addr).unwrap(), value);
        prop_assert_eq!(chip.noc_read32(0, x, y, addr).unwrap(), 0);
    }
}

#[test]
fn nodes_outside_the_grid_are_rejected() {
    let chip = open_local();

    assert!(chip.noc_read32(0, 10, 0, 0x100).is_err());
    assert!(chip.noc_write32(0, 0, 12, 0x100, 1).is_err());
}
