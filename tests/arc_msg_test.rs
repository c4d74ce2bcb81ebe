#![cfg(test)]

use std::time::{Duration, Instant};

use serial_test::serial;

use luwen_glue::{
    api::{
        arc_msg::ArcMsgProtocolError,
        chip::{ArcMsgOptions, HlCommsInterface},
        error::{ArcReadyError, PlatformError},
        ArcMsg, ArcMsgOk, Chip, ChipImpl, TypedArcMsg,
    },
    arch::Arch,
    sim::{ArcResponse, SimChip, SimFabric, SimTransport},
};

/// ARC mailbox protocol against the reference firmware
///
/// These tests verify:
/// - Replies are collected once the firmware answers
/// - Timeouts fire within a bounded overshoot
/// - Posting without waiting never blocks
/// - Every protocol failure surfaces as an error
///
/// The timing tests are serialized so they don't compete for the cpu.
mod test_utils;

use test_utils::protocol_error;

fn open(chip: SimChip) -> (Chip, SimTransport) {
    let arch = chip.arch();
    let fabric = SimFabric::new().with_chip(chip).into_shared();
    let transport = SimTransport::new(fabric, Default::default());
    let chip = Chip::open(arch, transport.clone()).unwrap();
    (chip, transport)
}

fn raw(msg: u32, arg0: u16, arg1: u16) -> ArcMsgOptions {
    ArcMsgOptions {
        msg: ArcMsg::Raw { msg, arg0, arg1 },
        ..Default::default()
    }
}

#[test]
fn grayskull_answers_on_second_poll() {
    let (chip, _) = open(
        SimChip::grayskull()
            .with_arc_response(0x90, ArcResponse::Reply { rc: 42, arg: 7 })
            .with_poll_delay(2),
    );

    let result = chip
        .arc_msg(ArcMsgOptions {
            timeout: Duration::from_millis(1000),
            ..raw(0x90, 0, 0)
        })
        .unwrap();

    assert_eq!(result, ArcMsgOk::Ok { rc: 42, arg: 7 });
}

#[test]
fn test_message_echoes_argument() {
    let (chip, _) = open(SimChip::wormhole());

    let result = chip
        .arc_msg(ArcMsgOptions {
            msg: TypedArcMsg::Test { arg: 0x0001_0004 }.into(),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(result, ArcMsgOk::Ok { rc: 0, arg: 0x0001_0005 });
}

#[test]
#[serial]
fn never_completing_message_times_out() {
    let (chip, _) = open(SimChip::wormhole().never_complete());
    let timeout = Duration::from_millis(50);

    let start = Instant::now();
    let err = chip
        .arc_msg(ArcMsgOptions {
            timeout,
            ..raw(0x90, 1, 0)
        })
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(
        protocol_error(&err),
        Some(ArcMsgProtocolError::Timeout(t)) if *t == timeout
    ));
    assert!(elapsed >= timeout, "returned after {elapsed:?}");
    assert!(
        elapsed < timeout + Duration::from_millis(500),
        "overshot by {:?}",
        elapsed - timeout
    );
}

#[test]
#[serial]
fn no_wait_returns_immediately() {
    let (chip, transport) = open(SimChip::wormhole().never_complete());

    let start = Instant::now();
    for _ in 0..2 {
        let result = chip
            .arc_msg(ArcMsgOptions {
                wait_for_done: false,
                timeout: Duration::MAX,
                ..raw(0x90, 1, 0)
            })
            .unwrap();
        assert_eq!(result, ArcMsgOk::OkNoWait);
    }
    assert!(start.elapsed() < Duration::from_millis(500));

    let fabric = transport.fabric().lock().unwrap();
    assert_eq!(
        fabric.chip(Default::default()).unwrap().received_messages(),
        &[0xaa90, 0xaa90]
    );
}

#[test]
fn unrecognized_message_is_an_error() {
    let (chip, _) = open(SimChip::grayskull());

    let err = chip.arc_msg(raw(0x77, 0, 0)).unwrap_err();
    assert!(matches!(
        protocol_error(&err),
        Some(ArcMsgProtocolError::MsgNotRecognized(0xaa77))
    ));
}

#[test]
fn stuck_interrupt_is_reported() {
    let (chip, _) = open(SimChip::wormhole().with_stuck_interrupt());

    let err = chip.arc_msg(raw(0x90, 0, 0)).unwrap_err();
    assert!(matches!(
        protocol_error(&err),
        Some(ArcMsgProtocolError::FwIntFailed)
    ));
}

#[test]
fn grayskull_has_one_mailbox() {
    let (chip, transport) = open(SimChip::grayskull());
    transport.take_calls();

    let err = chip
        .arc_msg(ArcMsgOptions {
            use_second_mailbox: true,
            ..raw(0x90, 0, 0)
        })
        .unwrap_err();
    assert!(matches!(
        protocol_error(&err),
        Some(ArcMsgProtocolError::InvalidMailbox(2))
    ));
    assert!(transport.calls().is_empty());
}

#[test]
fn wormhole_second_mailbox_answers() {
    let (chip, _) = open(SimChip::wormhole());

    let result = chip
        .arc_msg(ArcMsgOptions {
            msg: TypedArcMsg::Test { arg: 9 }.into(),
            use_second_mailbox: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(result, ArcMsgOk::Ok { rc: 0, arg: 10 });
}

#[test]
fn sleeping_arc_refuses_messages() {
    let (chip, _) = open(SimChip::wormhole());

    // Mailbox left holding the sleep request.
    chip.axi_swrite32(
        "ARC_RESET.SCRATCH[5]",
        TypedArcMsg::ArcGoToSleep.msg_code() as u32,
    )
    .unwrap();

    let err = chip.arc_msg(raw(0x90, 0, 0)).unwrap_err();
    assert!(matches!(
        err,
        PlatformError::ArcNotReady(ArcReadyError::Asleep, _)
    ));

    let err = chip
        .arc_msg(ArcMsgOptions {
            wait_for_done: false,
            ..raw(0x90, 0, 0)
        })
        .unwrap_err();
    assert!(matches!(
        protocol_error(&err),
        Some(ArcMsgProtocolError::ArcAsleep)
    ));
}

#[test]
fn booting_arc_is_not_ready() {
    let (chip, _) = open(SimChip::grayskull().booting());

    let err = chip.arc_msg(raw(0x90, 0, 0)).unwrap_err();
    assert!(matches!(
        err,
        PlatformError::ArcNotReady(ArcReadyError::BootIncomplete, _)
    ));
}

#[test]
fn raw_and_typed_messages_share_codes() {
    let (chip, transport) = open(SimChip::grayskull());

    chip.arc_msg(raw(0x34, 0, 0)).unwrap();
    let aiclk = chip
        .arc_msg(ArcMsgOptions {
            msg: TypedArcMsg::GetAiclk.into(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(aiclk, ArcMsgOk::Ok { rc: 0, arg: 1000 });

    let fabric = transport.fabric().lock().unwrap();
    assert_eq!(
        fabric.chip(Default::default()).unwrap().received_messages(),
        &[0xaa34, 0xaa34]
    );
}
