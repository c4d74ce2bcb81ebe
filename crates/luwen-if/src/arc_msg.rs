// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    chip::{AxiError, ChipComms, HlComms, HlCommsInterface},
    error::{ArcReadyError, BtWrapper, PlatformError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Busy,
    ShortIdle,
    LongIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcState {
    A0,
    A1,
    A3,
    A5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwType {
    ArcL2,
    FwBundle,
    FwBundleSPI,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArcMsg {
    Nop,
    Test { arg: u32 },
    ArcGoToSleep,

    SetPowerState(PowerState),

    FwVersion(FwType),
    GetSmbusTelemetryAddr,

    SetArcState { state: ArcState },

    ResetSafeClks { arg: u32 },
    ToggleTensixReset { arg: u32 },
    DeassertRiscVReset,
    GetAiclk,

    GetHarvesting,

    GetSpiDumpAddr,
    SpiRead { addr: u32 },
    SpiWrite,
}

impl TypedArcMsg {
    pub fn msg_code(&self) -> u16 {
        let code = match self {
            TypedArcMsg::Nop => 0x11,
            TypedArcMsg::ArcGoToSleep => 0x55,
            TypedArcMsg::Test { .. } => 0x90,
            TypedArcMsg::GetSmbusTelemetryAddr => 0x2C,
            TypedArcMsg::SetPowerState(state) => match state {
                PowerState::Busy => 0x52,
                PowerState::ShortIdle => 0x53,
                PowerState::LongIdle => 0x54,
            },
            TypedArcMsg::GetHarvesting => 0x57,
            TypedArcMsg::DeassertRiscVReset => 0xba,
            TypedArcMsg::ResetSafeClks { .. } => 0xbb,
            TypedArcMsg::ToggleTensixReset { .. } => 0xaf,
            TypedArcMsg::GetAiclk => 0x34,
            TypedArcMsg::SetArcState { state } => match state {
                ArcState::A0 => 0xA0,
                ArcState::A1 => 0xA1,
                ArcState::A3 => 0xA3,
                ArcState::A5 => 0xA5,
            },
            TypedArcMsg::FwVersion(_) => 0xb9,
            TypedArcMsg::GetSpiDumpAddr => 0x29,
            TypedArcMsg::SpiRead { .. } => 0x2A,
            TypedArcMsg::SpiWrite => 0x2B,
        };

        0xaa00 | code
    }

    pub fn args(&self) -> (u16, u16) {
        match self {
            TypedArcMsg::Test { arg }
            | TypedArcMsg::ResetSafeClks { arg }
            | TypedArcMsg::ToggleTensixReset { arg }
            | TypedArcMsg::SpiRead { addr: arg } => {
                ((arg & 0xFFFF) as u16, ((arg >> 16) & 0xFFFF) as u16)
            }
            TypedArcMsg::SpiWrite => (0xFFFF, 0xFFFF),
            TypedArcMsg::Nop
            | TypedArcMsg::ArcGoToSleep
            | TypedArcMsg::GetSmbusTelemetryAddr
            | TypedArcMsg::SetPowerState(_)
            | TypedArcMsg::DeassertRiscVReset
            | TypedArcMsg::GetAiclk
            | TypedArcMsg::GetHarvesting
            | TypedArcMsg::GetSpiDumpAddr
            | TypedArcMsg::SetArcState { .. } => (0, 0),
            TypedArcMsg::FwVersion(ty) => match ty {
                FwType::ArcL2 => (0, 0),
                FwType::FwBundle => (1, 0),
                FwType::FwBundleSPI => (2, 0),
            },
        }
    }
}

/// A message for the ARC mailbox.
/// Codes that we know the layout of are kept typed, anything else is passed through as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcMsg {
    Typed(TypedArcMsg),
    Raw { msg: u32, arg0: u16, arg1: u16 },
}

impl From<TypedArcMsg> for ArcMsg {
    fn from(value: TypedArcMsg) -> Self {
        ArcMsg::Typed(value)
    }
}

impl ArcMsg {
    pub fn msg_code(&self) -> u16 {
        match self {
            ArcMsg::Typed(msg) => msg.msg_code(),
            ArcMsg::Raw { msg, .. } => 0xaa00 | (msg & 0xFF) as u16,
        }
    }

    pub fn args(&self) -> (u16, u16) {
        match self {
            ArcMsg::Typed(msg) => msg.args(),
            ArcMsg::Raw { arg0, arg1, .. } => (*arg0, *arg1),
        }
    }

    /// Build a message from the values that would be written into the mailbox.
    /// The result always encodes back to the same code and arguments.
    pub fn from_values(msg: u32, arg0: u16, arg1: u16) -> Self {
        let arg = ((arg1 as u32) << 16) | arg0 as u32;
        let typed = match 0xFF & msg {
            0x2A => TypedArcMsg::SpiRead { addr: arg },
            0xbb => TypedArcMsg::ResetSafeClks { arg },
            0xaf => TypedArcMsg::ToggleTensixReset { arg },
            0x90 => TypedArcMsg::Test { arg },
            0x2B if arg == 0xFFFF_FFFF => TypedArcMsg::SpiWrite,
            0xb9 if arg1 == 0 && arg0 <= 2 => TypedArcMsg::FwVersion(match arg0 {
                0 => FwType::ArcL2,
                1 => FwType::FwBundle,
                _ => FwType::FwBundleSPI,
            }),
            code if arg == 0 => match code {
                0x11 => TypedArcMsg::Nop,
                0x34 => TypedArcMsg::GetAiclk,
                0x55 => TypedArcMsg::ArcGoToSleep,
                0x2C => TypedArcMsg::GetSmbusTelemetryAddr,
                0x29 => TypedArcMsg::GetSpiDumpAddr,
                0xba => TypedArcMsg::DeassertRiscVReset,
                0x52 => TypedArcMsg::SetPowerState(PowerState::Busy),
                0x53 => TypedArcMsg::SetPowerState(PowerState::ShortIdle),
                0x54 => TypedArcMsg::SetPowerState(PowerState::LongIdle),
                0x57 => TypedArcMsg::GetHarvesting,
                0xA0 => TypedArcMsg::SetArcState {
                    state: ArcState::A0,
                },
                0xA1 => TypedArcMsg::SetArcState {
                    state: ArcState::A1,
                },
                0xA3 => TypedArcMsg::SetArcState {
                    state: ArcState::A3,
                },
                0xA5 => TypedArcMsg::SetArcState {
                    state: ArcState::A5,
                },
                _ => return ArcMsg::Raw { msg, arg0, arg1 },
            },
            _ => return ArcMsg::Raw { msg, arg0, arg1 },
        };

        ArcMsg::Typed(typed)
    }
}

#[derive(Error, Debug)]
pub enum ArcMsgProtocolError {
    #[error("Message {0:#x} not recognized")]
    MsgNotRecognized(u16),
    #[error("Timed out while waiting {0:?} for ARC to respond")]
    Timeout(std::time::Duration),
    #[error("ARC is asleep")]
    ArcAsleep,
    #[error("Failed to trigger FW interrupt")]
    FwIntFailed,
    #[error("Mailbox {0} is invalid")]
    InvalidMailbox(usize),
}

impl ArcMsgProtocolError {
    #[inline(always)]
    pub fn into_error(self) -> ArcMsgError {
        ArcMsgError::ProtocolError {
            source: self,
            backtrace: BtWrapper::capture(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArcMsgError {
    #[error("{source}\n{backtrace}")]
    ProtocolError {
        source: ArcMsgProtocolError,
        backtrace: BtWrapper,
    },

    #[error(transparent)]
    AxiError(#[from] AxiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcMsgOk {
    Ok { rc: u32, arg: u32 },
    OkNoWait,
}

/// Returns True if new interrupt triggered, or False if the
/// FW is currently busy. The message IRQ handler should only take a couple
/// dozen cycles, so if this returns False it probably means something went
/// wrong.
fn trigger_fw_int<T: HlComms + ?Sized>(
    comms: &T,
    addrs: &ArcMsgAddr,
) -> Result<bool, PlatformError> {
    let misc = comms.axi_read32(addrs.arc_misc_cntl)?;

    if misc & (1 << 16) != 0 {
        return Ok(false);
    }

    let misc_bit16_set = misc | (1 << 16);
    comms.axi_write32(addrs.arc_misc_cntl, misc_bit16_set)?;

    Ok(true)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArcMsgAddr {
    pub scratch_base: u64,
    pub arc_misc_cntl: u64,
}

impl TryFrom<&dyn ChipComms> for ArcMsgAddr {
    type Error = AxiError;

    fn try_from(value: &dyn ChipComms) -> Result<Self, Self::Error> {
        Ok(ArcMsgAddr {
            scratch_base: value.axi_translate("ARC_RESET.SCRATCH[0]")?.addr,
            arc_misc_cntl: value.axi_translate("ARC_RESET.ARC_MISC_CNTL")?.addr,
        })
    }
}

pub fn arc_msg<T: HlComms + ?Sized>(
    comms: &T,
    msg: &ArcMsg,
    wait_for_done: bool,
    timeout: std::time::Duration,
    msg_reg: u64,
    return_reg: u64,
    addrs: &ArcMsgAddr,
) -> Result<ArcMsgOk, PlatformError> {
    const MSG_ERROR_REPLY: u32 = 0xffffffff;

    let (arg0, arg1) = msg.args();

    let code = msg.msg_code();

    let current_code = comms.axi_read32(addrs.scratch_base + (msg_reg * 4))?;
    if (current_code & 0xFFFF) as u16 == TypedArcMsg::ArcGoToSleep.msg_code() {
        Err(ArcMsgProtocolError::ArcAsleep.into_error())?;
    }

    comms.axi_write32(
        addrs.scratch_base + (return_reg * 4),
        arg0 as u32 | ((arg1 as u32) << 16),
    )?;

    comms.axi_write32(addrs.scratch_base + (msg_reg * 4), code as u32)?;

    if !trigger_fw_int(comms, addrs)? {
        Err(ArcMsgProtocolError::FwIntFailed.into_error())?;
    }

    debug!(code = %format!("{code:#x}"), arg0, arg1, "posted arc message");

    if wait_for_done {
        let start = std::time::Instant::now();
        loop {
            let status = comms.axi_read32(addrs.scratch_base + (msg_reg * 4))?;
            trace!(status = %format!("{status:#x}"), "polled arc mailbox");
            if (status & 0xFFFF) as u16 == code & 0xFF {
                let exit_code = (status >> 16) & 0xFFFF;
                let arg = comms.axi_read32(addrs.scratch_base + (return_reg * 4))?;

                debug!(
                    code = %format!("{code:#x}"),
                    rc = exit_code,
                    arg,
                    "arc message completed"
                );
                return Ok(ArcMsgOk::Ok { rc: exit_code, arg });
            } else if status == MSG_ERROR_REPLY {
                Err(ArcMsgProtocolError::MsgNotRecognized(code).into_error())?;
            }

            std::thread::sleep(std::time::Duration::from_millis(1));
            if start.elapsed() > timeout {
                Err(ArcMsgProtocolError::Timeout(timeout).into_error())?;
            }
        }
    }

    Ok(ArcMsgOk::OkNoWait)
}

/// Check the mailbox and post code to see if it is safe to post a new message.
pub(crate) fn check_arc_msg_safe<T: HlComms + ?Sized>(
    comms: &T,
    msg_reg: u64,
) -> Result<(), PlatformError> {
    const POST_CODE_INIT_DONE: u32 = 0xC0DE0001;
    const POST_CODE_ARC_MSG_HANDLE_DONE: u32 = 0xC0DE003F;
    const POST_CODE_ARC_TIME_LAST: u32 = 0xC0DE007F;

    let not_ready = |reason| Err(PlatformError::ArcNotReady(reason, BtWrapper::capture()));

    let s5 = comms.axi_sread32(format!("ARC_RESET.SCRATCH[{msg_reg}]"))?;
    let pc = comms.axi_sread32("ARC_RESET.POST_CODE")?;

    if pc == 0xFFFFFFFF {
        return not_ready(ArcReadyError::NoAccess);
    }

    if s5 == 0xDEADC0DE {
        return not_ready(ArcReadyError::WatchdogTriggered);
    }

    // Still booting and it will later wipe the mailbox.
    if s5 == 0x00000060 || pc == 0x11110000 {
        return not_ready(ArcReadyError::BootIncomplete);
    }

    if s5 == 0x0000AA00 || s5 == TypedArcMsg::ArcGoToSleep.msg_code() as u32 {
        return not_ready(ArcReadyError::Asleep);
    }

    if s5 & 0xFFFFFF00 == 0x0000AA00 {
        return not_ready(ArcReadyError::MessageQueued(s5 & 0xFF));
    }

    if s5 & 0xFF00FFFF == 0xAA000000 {
        return not_ready(ArcReadyError::HandlingMessage((s5 >> 16) & 0xFF));
    }

    // Boot complete or message not recognized.
    if let 0x00000001 | 0xFFFFFFFF | 0xFFFFDEAD = s5 {
        return Ok(());
    }

    // YYYY00XX for XX != 0, 1 is a completed message.
    if s5 & 0x0000FFFF > 0x00000001 {
        return Ok(());
    }

    let pc_idle = pc == POST_CODE_INIT_DONE
        || (POST_CODE_ARC_MSG_HANDLE_DONE..=POST_CODE_ARC_TIME_LAST).contains(&pc);
    if pc_idle {
        Ok(())
    } else {
        not_ready(ArcReadyError::PostCodeBusy(pc))
    }
}
