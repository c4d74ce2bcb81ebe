// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use luwen_core::Arch;
use tracing::debug;

use crate::{arc_msg::ArcMsgOk, error::PlatformError, DeviceInfo};

use super::{
    init::wait_for_init,
    ArcMsgOptions, ChipComms, ChipImpl, ChipInitResult, ChipInterface, Grayskull, HlComms,
    InitOptions, InitStatus, Telemetry, Wormhole,
};

/// Liveness of a session, shared with every remote session opened through it.
#[derive(Debug)]
pub struct SessionLink {
    open: AtomicBool,
    delegate: Option<Arc<SessionLink>>,
}

impl SessionLink {
    pub fn new(delegate: Option<Arc<SessionLink>>) -> Self {
        Self {
            open: AtomicBool::new(true),
            delegate,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ensure_open().is_ok()
    }

    /// Fails if this session, or any session it was opened through, has been closed.
    pub fn ensure_open(&self) -> Result<(), PlatformError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(PlatformError::SessionClosed);
        }

        match &self.delegate {
            Some(delegate) if delegate.ensure_open().is_err() => {
                Err(PlatformError::DelegateClosed)
            }
            _ => Ok(()),
        }
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Initialized,
}

/// A wrapper around a chip that implements `ChipImpl`.
/// This allows us to create and use chips without knowing their type,
/// but we can still downcast to the concrete type if we need to.
///
/// Every operation first checks that the session is still open. Dropping or closing the chip
/// invalidates it along with every remote chip that was opened through it.
pub struct Chip {
    inner: Box<dyn ChipImpl>,
    link: Arc<SessionLink>,
    state: SessionState,
}

impl Chip {
    pub(crate) fn new(inner: Box<dyn ChipImpl>, delegate: Option<Arc<SessionLink>>) -> Self {
        debug!(arch = %inner.get_arch(), remote = delegate.is_some(), "opened chip session");
        Self {
            inner,
            link: Arc::new(SessionLink::new(delegate)),
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn link(&self) -> &Arc<SessionLink> {
        &self.link
    }

    /// Release the session. The transport is left untouched.
    pub fn close(self) {
        drop(self);
    }

    /// Run the architecture specific bring-up sequence until the chip reports ready.
    /// Can be called again on an initialized chip to re-check its state.
    pub fn init(&mut self, options: InitOptions) -> Result<InitStatus, PlatformError> {
        self.link.ensure_open()?;

        let status = wait_for_init(
            self.inner.as_mut(),
            &mut |_| Ok::<(), Infallible>(()),
            false,
            options,
        )?;
        self.state = SessionState::Initialized;

        Ok(status)
    }

    /// Downcast to a wormhole chip
    pub fn as_wh(&self) -> Option<&Wormhole> {
        self.link.ensure_open().ok()?;
        self.inner.as_any().downcast_ref::<Wormhole>()
    }

    /// Downcast to a grayskull chip
    pub fn as_gs(&self) -> Option<&Grayskull> {
        self.link.ensure_open().ok()?;
        self.inner.as_any().downcast_ref::<Grayskull>()
    }
}

impl Drop for Chip {
    fn drop(&mut self) {
        self.link.close();
        debug!(arch = %self.inner.get_arch(), "closed chip session");
    }
}

impl HlComms for Chip {
    fn comms_obj(&self) -> Result<(&dyn ChipComms, &dyn ChipInterface), PlatformError> {
        self.link.ensure_open()?;
        self.inner.comms_obj()
    }
}

impl ChipImpl for Chip {
    fn update_init_state(
        &mut self,
        status: &mut InitStatus,
    ) -> Result<ChipInitResult, PlatformError> {
        self.link.ensure_open()?;
        self.inner.update_init_state(status)
    }

    fn get_arch(&self) -> Arch {
        self.inner.get_arch()
    }

    fn arc_msg(&self, msg: ArcMsgOptions) -> Result<ArcMsgOk, PlatformError> {
        self.link.ensure_open()?;
        self.inner.arc_msg(msg)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }

    fn get_telemetry(&self) -> Result<Telemetry, PlatformError> {
        self.link.ensure_open()?;
        self.inner.get_telemetry()
    }

    fn get_device_info(&self) -> Result<Option<DeviceInfo>, PlatformError> {
        self.link.ensure_open()?;
        self.inner.get_device_info()
    }
}
