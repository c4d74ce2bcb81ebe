// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use luwen_if::{chip::AxiError, error::PlatformError, ArcMsgError, EthAddr};
use thiserror::Error;

/// Failures raised by the simulated transport itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("no chip at {0} is reachable over ethernet")]
    UnknownChip(EthAddr),

    #[error("noc node ({x}, {y}) is outside of the {arch} grid")]
    InvalidNode { arch: String, x: u8, y: u8 },

    #[error("{0} has no ethernet, it cannot forward remote traffic")]
    NoEthernet(String),
}

#[derive(Error, Debug)]
pub enum LuwenError {
    #[error(transparent)]
    PlatformError(#[from] PlatformError),

    #[error(transparent)]
    SimError(#[from] SimError),

    #[error("{0}")]
    Custom(String),
}

impl From<ArcMsgError> for LuwenError {
    fn from(value: ArcMsgError) -> Self {
        LuwenError::PlatformError(value.into())
    }
}

impl From<AxiError> for LuwenError {
    fn from(value: AxiError) -> Self {
        LuwenError::PlatformError(value.into())
    }
}
