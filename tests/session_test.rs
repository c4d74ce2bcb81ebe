#![cfg(test)]

use luwen_glue::{
    api::{
        chip::{ArcMsgOptions, HlComms},
        error::PlatformError,
        ArcMsgOk, Chip, ChipImpl, SessionState, TypedArcMsg,
    },
    arch::Arch,
    sim::{detect_chips, SimChip, SimFabric, SimTransport},
};

/// Session lifecycle against the reference fabric
///
/// These tests verify:
/// - Opening binds a transport without touching the chip
/// - Closing a session rejects everything issued after it
/// - Remote sessions follow the session they were opened through
mod test_utils;

use test_utils::{shelf, wormhole_pair};

fn test_msg() -> ArcMsgOptions {
    ArcMsgOptions {
        msg: TypedArcMsg::Test { arg: 1 }.into(),
        ..Default::default()
    }
}

#[test]
fn open_does_not_touch_the_chip() {
    let fabric = SimFabric::new().with_chip(SimChip::grayskull()).into_shared();
    let transport = SimTransport::new(fabric, Default::default());

    let chip = Chip::open(Arch::Grayskull, transport.clone()).unwrap();

    assert_eq!(chip.state(), SessionState::Open);
    assert_eq!(chip.get_arch(), Arch::Grayskull);
    assert!(transport.calls().is_empty());
}

#[test]
fn closed_session_rejects_operations() {
    let fabric = wormhole_pair();
    let mut chips = detect_chips(&fabric).unwrap();
    let chip = chips.remove(0);

    let link = chip.link().clone();
    assert!(chip.arc_msg(test_msg()).is_ok());

    chip.close();
    assert!(!link.is_open());
    assert!(matches!(
        link.ensure_open(),
        Err(PlatformError::SessionClosed)
    ));
}

#[test]
fn closing_local_session_invalidates_remote() {
    let fabric = wormhole_pair();
    let chip = detect_chips(&fabric).unwrap().remove(0);
    let remote = chip.open_remote(shelf(1)).unwrap();

    assert_eq!(
        remote.arc_msg(test_msg()).unwrap(),
        ArcMsgOk::Ok { rc: 0, arg: 2 }
    );

    chip.close();

    assert!(matches!(
        remote.arc_msg(test_msg()),
        Err(PlatformError::DelegateClosed)
    ));
    assert!(matches!(
        remote.get_telemetry(),
        Err(PlatformError::DelegateClosed)
    ));
    assert!(matches!(
        remote.noc_read32(0, 1, 1, 0x100),
        Err(PlatformError::DelegateClosed)
    ));
    assert!(remote.as_wh().is_none());
}

#[test]
fn closing_remote_leaves_local_open() {
    let fabric = wormhole_pair();
    let chip = detect_chips(&fabric).unwrap().remove(0);

    let remote = chip.open_remote(shelf(1)).unwrap();
    remote.close();

    assert!(chip.arc_msg(test_msg()).is_ok());
}

#[test]
fn remote_cannot_be_opened_from_closed_chain() {
    let fabric = SimFabric::new()
        .with_chip(SimChip::wormhole())
        .with_chip(SimChip::wormhole().at(shelf(1)).detached())
        .with_chip(SimChip::wormhole().at(shelf(2)).detached())
        .into_shared();
    let chip = detect_chips(&fabric).unwrap().remove(0);
    let remote = chip.open_remote(shelf(1)).unwrap();

    chip.close();

    assert!(matches!(
        remote.open_remote(shelf(2)),
        Err(PlatformError::DelegateClosed)
    ));
}

#[test]
fn grayskull_cannot_delegate() {
    let fabric = SimFabric::new().with_chip(SimChip::grayskull()).into_shared();
    let chip = detect_chips(&fabric).unwrap().remove(0);

    assert!(matches!(
        chip.open_remote(shelf(1)),
        Err(PlatformError::WrongChipArch {
            actual: Arch::Grayskull,
            expected: Arch::Wormhole,
            ..
        })
    ));
}

#[test]
fn partial_address_resolves_against_local_chip() {
    let fabric = wormhole_pair();
    let chip = detect_chips(&fabric).unwrap().remove(0);

    let remote = chip.open_remote((1u8, 0u8)).unwrap();
    assert_eq!(remote.as_wh().unwrap().remote_addr, Some(shelf(1)));
    assert_eq!(
        chip.as_wh().unwrap().get_local_chip_coord().unwrap(),
        shelf(0)
    );
}
