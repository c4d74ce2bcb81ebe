// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::convert::Infallible;

use tracing::debug;

use crate::{
    arc_msg::check_arc_msg_safe,
    error::{ArcReadyError, BtWrapper, PlatformError},
    ChipImpl,
};

use status::{ArcInitError, CommsStatus, InitOptions, InitStatus, WaitStatus};

use super::{ChipInitResult, HlComms};

pub mod status;

pub enum CallReason<'a> {
    NewChip,
    InitWait(&'a InitStatus),
    ChipInitCompleted(&'a InitStatus),
}

pub struct ChipDetectState<'a> {
    pub chip: &'a dyn ChipImpl,
    pub call: CallReason<'a>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError<E> {
    #[error(transparent)]
    PlatformError(#[from] PlatformError),

    #[error("init callback failed")]
    CallbackError(E),
}

impl From<InitError<Infallible>> for PlatformError {
    fn from(val: InitError<Infallible>) -> Self {
        match val {
            InitError::PlatformError(err) => err,
            InitError::CallbackError(never) => match never {},
        }
    }
}

/// This function will wait for the chip to be initialized.
/// It will return Ok(status) if the chip initialized successfully or if it failed in a way that
/// still lets us continue and allow_failure is true.
/// An Err(..) will be returned if the chip failed to initialize and we cannot continue running.
///
/// The callback is invoked once when the chip is first seen, after every step of the state
/// machine and once more when the init completes. This allows the caller to display progress.
pub fn wait_for_init<E>(
    chip: &mut dyn ChipImpl,
    callback: &mut impl FnMut(ChipDetectState) -> Result<(), E>,
    allow_failure: bool,
    options: InitOptions,
) -> Result<InitStatus, InitError<E>> {
    // We want to make sure that we always call the callback at least once so that the caller can mark the chip presence.
    callback(ChipDetectState {
        chip,
        call: CallReason::NewChip,
    })
    .map_err(InitError::CallbackError)?;

    let mut status = InitStatus::new_unknown();
    status.init_options = options;
    loop {
        match chip.update_init_state(&mut status)? {
            ChipInitResult::NoError => {
                // No error, we don't have to do anything.
            }
            ChipInitResult::ErrorContinue(error, bt_tracker) => {
                // Hit an error, cannot continue to initialize the current chip,
                // but we can continue to initialize other chips (assuming we are allowing failures).
                if !allow_failure {
                    Err(PlatformError::Generic(
                        format!("Chip initialization failed: {error} \n{status}"),
                        BtWrapper(bt_tracker),
                    ))?;
                } else {
                    callback(ChipDetectState {
                        chip,
                        call: CallReason::ChipInitCompleted(&status),
                    })
                    .map_err(InitError::CallbackError)?;
                    return Ok(status);
                }
            }
            ChipInitResult::ErrorAbort(error, bt_tracker) => {
                Err(PlatformError::Generic(
                    format!("Chip initialization failed (aborted): {error} \n{status}"),
                    BtWrapper(bt_tracker),
                ))?;
            }
        }

        if status.init_complete() {
            callback(ChipDetectState {
                chip,
                call: CallReason::ChipInitCompleted(&status),
            })
            .map_err(InitError::CallbackError)?;

            if status.has_error() && !allow_failure {
                Err(PlatformError::Generic(
                    format!("Chip initialization failed:\n{status}"),
                    BtWrapper::capture(),
                ))?;
            }

            debug!(arch = %chip.get_arch(), has_error = status.has_error(), "chip init finished");
            return Ok(status);
        }

        callback(ChipDetectState {
            chip,
            call: CallReason::InitWait(&status),
        })
        .map_err(InitError::CallbackError)?;

        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}

/// Advance the ARC component of `status` by checking if the mailbox is ready to accept messages.
/// Returns Some(result) if the init should stop here.
pub(crate) fn update_arc_status<T: HlComms + ?Sized>(
    comms: &T,
    status: &mut InitStatus,
) -> Option<ChipInitResult> {
    let comms_status = &mut status.comms_status;
    let status = &mut status.arc_status;
    let timed_out = status.timed_out();
    let timeout = status.timeout;

    for arc_status in status.wait_status.iter_mut() {
        match arc_status {
            WaitStatus::Waiting(status_string) => match check_arc_msg_safe(comms, 5) {
                Ok(_) => *arc_status = WaitStatus::JustFinished,
                Err(PlatformError::ArcNotReady(reason, _)) => match reason {
                    // Reading back all 1s means that we have lost access to the chip.
                    ArcReadyError::NoAccess => {
                        *comms_status =
                            CommsStatus::CommunicationError("Failed to access ARC".to_string());
                        return Some(ChipInitResult::ErrorAbort(
                            reason.to_string(),
                            std::backtrace::Backtrace::capture(),
                        ));
                    }
                    // These won't resolve by waiting.
                    ArcReadyError::WatchdogTriggered | ArcReadyError::Asleep => {
                        *arc_status = WaitStatus::Error(ArcInitError::WaitingForInit(reason));
                    }
                    ArcReadyError::BootIncomplete
                    | ArcReadyError::MessageQueued(_)
                    | ArcReadyError::HandlingMessage(_)
                    | ArcReadyError::PostCodeBusy(_) => {
                        if timed_out {
                            *arc_status = WaitStatus::Timeout(timeout);
                        } else {
                            *status_string = Some(reason.to_string());
                        }
                    }
                },
                Err(PlatformError::ArcMsgError(error)) => {
                    return Some(ChipInitResult::ErrorContinue(
                        error.to_string(),
                        std::backtrace::Backtrace::capture(),
                    ));
                }
                Err(PlatformError::AxiError(error)) => {
                    *comms_status = CommsStatus::CommunicationError(error.to_string());
                    return Some(ChipInitResult::ErrorAbort(
                        format!("ARC AXI error: {error}"),
                        std::backtrace::Backtrace::capture(),
                    ));
                }
                Err(err) => {
                    *comms_status = CommsStatus::CommunicationError(err.to_string());
                    return Some(ChipInitResult::ErrorAbort(
                        err.to_string(),
                        std::backtrace::Backtrace::capture(),
                    ));
                }
            },
            WaitStatus::JustFinished => {
                *arc_status = WaitStatus::Done;
            }
            _ => {}
        }
    }

    None
}
