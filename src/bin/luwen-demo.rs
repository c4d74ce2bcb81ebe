// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use luwen_glue::{
    api::{
        chip::{ArcMsgOptions, InitOptions, Telemetry},
        ArcMsgOk, Chip, ChipImpl, DeviceInfo, EthAddr, TypedArcMsg,
    },
    arch::Arch,
    sim::{detect_chips, error::LuwenError, SimChip, SimFabric},
};

/// Bring up a simulated fabric, message every chip on it and print what they report.
#[derive(Parser)]
#[command(version)]
struct CmdArgs {
    /// Architecture of the chip attached to the host
    #[arg(long, default_value = "wormhole")]
    arch: Arch,

    /// Argument sent with the ARC test message
    #[arg(long, default_value_t = 101)]
    test_arg: u32,

    /// Don't open the chip that sits behind the local one
    #[arg(long)]
    local_only: bool,

    /// Print the report as json
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ChipReport {
    arch: Arch,
    addr: Option<EthAddr>,
    remote: bool,
    device_info: Option<DeviceInfo>,
    test_reply: u32,
    board_type: &'static str,
    telemetry: Telemetry,
}

fn report(chip: &Chip, test_arg: u32) -> Result<ChipReport, LuwenError> {
    let test_reply = match chip.arc_msg(ArcMsgOptions {
        msg: TypedArcMsg::Test { arg: test_arg }.into(),
        ..Default::default()
    })? {
        ArcMsgOk::Ok { arg, .. } => arg,
        ArcMsgOk::OkNoWait => 0,
    };

    let telemetry = chip.get_telemetry()?;

    let (addr, remote) = match chip.as_wh() {
        Some(wh) if wh.is_remote() => (wh.remote_addr, true),
        Some(wh) => (Some(wh.get_local_chip_coord()?), false),
        None => (None, false),
    };

    Ok(ChipReport {
        arch: chip.get_arch(),
        addr,
        remote,
        device_info: chip.get_device_info()?,
        test_reply,
        board_type: telemetry.board_type(),
        telemetry,
    })
}

fn build_fabric(arch: Arch, local_only: bool) -> SimFabric {
    let local = match arch {
        Arch::Grayskull => SimChip::grayskull().with_board_id(0x0000_0030_0000_0001),
        Arch::Wormhole => SimChip::wormhole().with_board_id(0x0000_0140_0000_0001),
    };

    let fabric = SimFabric::new().with_chip(local);
    if arch.has_ethernet() && !local_only {
        let remote = EthAddr {
            shelf_x: 1,
            ..Default::default()
        };
        fabric.with_chip(
            SimChip::wormhole()
                .at(remote)
                .detached()
                .with_board_id(0x0000_0140_0000_0002),
        )
    } else {
        fabric
    }
}

fn main() -> Result<(), LuwenError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CmdArgs::parse();

    let fabric = build_fabric(args.arch, args.local_only).into_shared();

    let mut reports = Vec::new();
    for mut chip in detect_chips(&fabric)? {
        chip.init(InitOptions::default())?;
        info!(arch = %chip.get_arch(), "chip initialized");
        reports.push(report(&chip, args.test_arg)?);

        if chip.get_arch().has_ethernet() && !args.local_only {
            // Same rack, next shelf over.
            let mut remote = chip.open_remote((1u8, 0u8))?;
            remote.init(InitOptions::default())?;
            reports.push(report(&remote, args.test_arg)?);
        }
    }

    if args.json {
        let output = serde_json::to_string_pretty(&reports)
            .map_err(|err| LuwenError::Custom(err.to_string()))?;
        println!("{output}");
    } else {
        for report in &reports {
            let location = match report.addr {
                Some(addr) if report.remote => format!("remote {addr}"),
                Some(addr) => format!("local {addr}"),
                None => "local".to_string(),
            };
            println!(
                "{} ({location}): board {} [{}], test reply {}",
                report.arch,
                report.telemetry.board_serial_number_hex(),
                report.board_type,
                report.test_reply
            );
        }
    }

    Ok(())
}
