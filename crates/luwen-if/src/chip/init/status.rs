// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{convert::Infallible, fmt, time::Duration};

use crate::error::ArcReadyError;

#[derive(Clone, Debug)]
pub enum EthernetInitError {
    NotTrained,
}

impl fmt::Display for EthernetInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EthernetInitError::NotTrained => f.write_str("Ethernet is not trained"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum EthernetPartialInitError {
    FwOverwritten,
}

impl fmt::Display for EthernetPartialInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EthernetPartialInitError::FwOverwritten => {
                f.write_str("Ethernet firmware version has an invalid format and is assumed to have been overwritten")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum ArcInitError {
    WaitingForInit(ArcReadyError),
}

impl fmt::Display for ArcInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArcInitError::WaitingForInit(err) => {
                write!(f, "ARC is waiting for initialization; {err}")
            }
        }
    }
}

/// The final initialization status for a component within a chip.
/// This status is not intended to drive the initialization state machine
/// instead it gives a single high level view of the current status of a single component.
#[derive(Debug, Clone)]
pub enum WaitStatus<P, E> {
    NotPresent,
    Waiting(Option<String>),

    JustFinished,

    Done,
    /// This is used in the case where the user has specific that we shouldn't check to see if the
    /// compnent has actually been intialized.
    /// See noc_safe for an example of this enumeration being used.
    NoCheck,

    Timeout(Duration),
    NotInitialized(P),
    Error(E),
}

impl<P, E> WaitStatus<P, E> {
    pub fn is_done(&self) -> bool {
        matches!(self, WaitStatus::Done | WaitStatus::NoCheck)
    }
}

/// A generic structure which contains the status information for each instance of a component.
#[derive(Debug, Clone)]
pub struct ComponentStatusInfo<P, E> {
    pub name: String,
    pub wait_status: Box<[WaitStatus<P, E>]>,
    pub timeout: Duration,
    pub start_time: std::time::Instant,
}

impl<P: fmt::Display, E: fmt::Display> fmt::Display for ComponentStatusInfo<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut waiting_count = 0;
        let mut completed_count = 0;
        for status in self.wait_status.iter() {
            match status {
                WaitStatus::Waiting(_) => waiting_count += 1,
                WaitStatus::NoCheck | WaitStatus::Done | WaitStatus::NotPresent => {
                    completed_count += 1
                }
                _ => {}
            }
        }

        write!(f, "{}", self.name)?;

        if waiting_count != 0 {
            write!(
                f,
                " ({}/{})",
                self.start_time.elapsed().as_secs(),
                self.timeout.as_secs()
            )?;
        }

        if self.wait_status.len() > 1 {
            write!(f, " [{}/{}]", completed_count, self.wait_status.len())?;
        }

        for status in self.wait_status.iter() {
            match status {
                WaitStatus::Waiting(Some(message)) => write!(f, "\n\t{message}")?,
                WaitStatus::Timeout(timeout) => write!(f, "\n\ttimed out after {timeout:?}")?,
                WaitStatus::NotInitialized(e) => write!(f, "\n\t{e}")?,
                WaitStatus::Error(e) => write!(f, "\n\t{e}")?,
                _ => {}
            }
        }

        Ok(())
    }
}

impl<P, E> ComponentStatusInfo<P, E> {
    pub fn not_present(name: String) -> Self {
        Self {
            name,
            wait_status: Box::new([]),
            timeout: Duration::default(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn init_waiting(name: String, timeout: Duration, count: usize) -> Self {
        let wait_status = (0..count).map(|_| WaitStatus::Waiting(None)).collect();
        Self {
            name,
            wait_status,

            start_time: std::time::Instant::now(),
            timeout,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.wait_status
            .iter()
            .any(|status| matches!(status, WaitStatus::Waiting(_) | WaitStatus::JustFinished))
    }

    pub fn is_present(&self) -> bool {
        self.wait_status
            .iter()
            .any(|status| !matches!(status, WaitStatus::NotPresent))
    }

    pub fn has_error(&self) -> bool {
        self.wait_status
            .iter()
            .any(|status| matches!(status, WaitStatus::Error(_) | WaitStatus::Timeout(_)))
    }

    pub fn timed_out(&self) -> bool {
        self.start_time.elapsed() > self.timeout
    }
}

#[derive(Clone, Debug)]
pub struct InitOptions {
    /// If true, then we will not try to initialize anything that would require talking on the NOC
    pub noc_safe: bool,
    /// How long to wait for ARC to report that it is ready for messages.
    pub arc_timeout: Duration,
    /// How long to watch the ethernet heartbeats before declaring a core untrained.
    pub eth_timeout: Duration,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            noc_safe: false,
            arc_timeout: Duration::from_secs(10),
            eth_timeout: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Debug)]
pub enum CommsStatus {
    CanCommunicate,
    CommunicationError(String),
}

impl CommsStatus {
    pub fn ok(&self) -> bool {
        match self {
            CommsStatus::CanCommunicate => true,
            CommsStatus::CommunicationError(_) => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct InitStatus {
    pub comms_status: CommsStatus,
    pub arc_status: ComponentStatusInfo<Infallible, ArcInitError>,
    pub eth_status: ComponentStatusInfo<EthernetPartialInitError, EthernetInitError>,

    pub init_options: InitOptions,

    /// We cannot communicate with the chip prior to the initialization process. Therefore we start
    /// with the chip in an unknown state (all status is marked as not present).
    pub unknown_state: bool,
}

impl InitStatus {
    pub fn new_unknown() -> Self {
        InitStatus {
            comms_status: CommsStatus::CommunicationError("Haven't checked".to_string()),
            arc_status: ComponentStatusInfo::not_present("ARC".to_string()),
            eth_status: ComponentStatusInfo::not_present("ETH".to_string()),
            init_options: InitOptions::default(),
            unknown_state: true,
        }
    }

    pub fn can_communicate(&self) -> bool {
        self.comms_status.ok()
    }

    pub fn is_waiting(&self) -> bool {
        self.unknown_state || self.arc_status.is_waiting() || self.eth_status.is_waiting()
    }

    pub fn init_complete(&self) -> bool {
        !self.is_waiting()
    }

    pub fn has_error(&self) -> bool {
        !self.comms_status.ok() || self.arc_status.has_error() || self.eth_status.has_error()
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let CommsStatus::CommunicationError(err) = &self.comms_status {
            writeln!(f, "Communication error: {err}")?;
        }
        if self.arc_status.is_present() {
            writeln!(f, "{}", self.arc_status)?;
        }
        if self.eth_status.is_present() {
            writeln!(f, "{}", self.eth_status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_waiting() {
        let status = InitStatus::new_unknown();
        assert!(status.is_waiting());
        assert!(!status.can_communicate());
        assert!(!status.arc_status.is_present());
    }

    #[test]
    fn component_tracks_each_instance() {
        let mut eth: ComponentStatusInfo<EthernetPartialInitError, EthernetInitError> =
            ComponentStatusInfo::init_waiting("ETH".to_string(), Duration::from_secs(1), 2);
        assert!(eth.is_waiting());

        eth.wait_status[0] = WaitStatus::Done;
        assert!(eth.is_waiting());

        eth.wait_status[1] = WaitStatus::Error(EthernetInitError::NotTrained);
        assert!(!eth.is_waiting());
        assert!(eth.has_error());
        assert!(eth.to_string().contains("Ethernet is not trained"));
        assert!(eth.to_string().starts_with("ETH [1/2]"));
    }
}
