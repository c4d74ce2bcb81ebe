#![cfg(test)]

use std::time::Duration;

use serial_test::serial;

use luwen_glue::{
    api::{
        chip::{InitOptions, WaitStatus},
        error::PlatformError,
        ChipImpl, SessionState,
    },
    arch::Arch,
    sim::{detect_chips, SimChip, SimFabric, TELEMETRY_ENUM_VERSION},
};

/// Chip bring-up and telemetry against the reference fabric
///
/// These tests verify:
/// - Grayskull and wormhole chips finish init when their firmware is healthy
/// - A chip that never finishes booting, or whose ethernet never trains, fails init
/// - Telemetry reports the board the fabric was configured with
mod test_utils;

use test_utils::{shelf, wormhole_pair, LOCAL_BOARD_ID, REMOTE_BOARD_ID};

fn quick() -> InitOptions {
    InitOptions {
        arc_timeout: Duration::from_millis(50),
        eth_timeout: Duration::from_millis(20),
        ..Default::default()
    }
}

#[test]
#[serial]
fn grayskull_init_completes() {
    let fabric = SimFabric::new()
        .with_chip(SimChip::grayskull())
        .into_shared();
    let mut chip = detect_chips(&fabric).unwrap().remove(0);

    let status = chip.init(InitOptions::default()).unwrap();

    assert!(status.init_complete());
    assert!(!status.has_error());
    assert!(!status.eth_status.is_present());
    assert_eq!(chip.state(), SessionState::Initialized);
}

#[test]
#[serial]
fn wormhole_init_trains_ethernet() {
    let fabric = wormhole_pair();
    let mut chip = detect_chips(&fabric).unwrap().remove(0);

    let status = chip.init(InitOptions::default()).unwrap();

    assert!(!status.has_error());
    assert_eq!(status.eth_status.wait_status.len(), 16);
    assert!(status
        .eth_status
        .wait_status
        .iter()
        .all(WaitStatus::is_done));

    // Init can be repeated on a live chip.
    assert!(chip.init(InitOptions::default()).is_ok());
}

#[test]
#[serial]
fn remote_init_skips_ethernet() {
    let fabric = wormhole_pair();
    let chip = detect_chips(&fabric).unwrap().remove(0);
    let mut remote = chip.open_remote(shelf(1)).unwrap();

    let status = remote.init(InitOptions::default()).unwrap();

    assert!(!status.has_error());
    assert!(!status.eth_status.is_present());
    assert_eq!(remote.state(), SessionState::Initialized);
}

#[test]
#[serial]
fn booting_chip_fails_init() {
    let fabric = SimFabric::new()
        .with_chip(SimChip::grayskull().booting())
        .into_shared();
    let mut chip = detect_chips(&fabric).unwrap().remove(0);

    let err = chip.init(quick()).unwrap_err();

    assert!(matches!(err, PlatformError::Generic(..)));
    assert_eq!(chip.state(), SessionState::Open);
}

#[test]
#[serial]
fn untrained_ethernet_fails_init() {
    let fabric = SimFabric::new()
        .with_chip(SimChip::wormhole().untrained_eth())
        .into_shared();
    let mut chip = detect_chips(&fabric).unwrap().remove(0);

    assert!(chip.init(quick()).is_err());
}

#[test]
#[serial]
fn noc_safe_init_skips_ethernet() {
    let fabric = SimFabric::new()
        .with_chip(SimChip::wormhole().untrained_eth())
        .into_shared();
    let mut chip = detect_chips(&fabric).unwrap().remove(0);

    let status = chip
        .init(InitOptions {
            noc_safe: true,
            ..quick()
        })
        .unwrap();
    assert!(!status.has_error());
}

#[test]
fn telemetry_reports_board_id() {
    let fabric = wormhole_pair();
    let chip = detect_chips(&fabric).unwrap().remove(0);
    let remote = chip.open_remote(shelf(1)).unwrap();

    let local = chip.get_telemetry().unwrap();
    assert_eq!(local.arch, Arch::Wormhole);
    assert_eq!(local.board_id, LOCAL_BOARD_ID);
    assert_eq!(local.enum_version, TELEMETRY_ENUM_VERSION);
    assert_eq!(local.board_type(), "n300");

    let remote = remote.get_telemetry().unwrap();
    assert_eq!(remote.board_id, REMOTE_BOARD_ID);
    assert_eq!(remote.board_serial_number_hex(), "0000014000000002");
}

#[test]
fn device_info_only_for_local_chips() {
    let fabric = wormhole_pair();
    let chip = detect_chips(&fabric).unwrap().remove(0);
    let remote = chip.open_remote(shelf(1)).unwrap();

    let info = chip.get_device_info().unwrap().unwrap();
    assert_eq!(info.vendor, 0x1e52);
    assert_eq!(info.device_id, 0x401e);

    assert!(remote.get_device_info().unwrap().is_none());
}
