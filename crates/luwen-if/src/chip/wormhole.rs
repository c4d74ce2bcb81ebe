// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use luwen_core::Arch;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::{
    arc_msg::{check_arc_msg_safe, ArcMsgAddr, ArcMsgOk, TypedArcMsg},
    error::PlatformError,
    ArcMsg, ChipImpl, IntoChip,
};

use super::{
    communication::chip_comms::AxiTable,
    eth_addr::{EthAddr, NODE_INFO_COORD_OFFSET},
    init::{
        status::{
            ComponentStatusInfo, EthernetInitError, EthernetPartialInitError, WaitStatus,
        },
        update_arc_status,
    },
    remote::{EthAddresses, RemoteArcIf, ETH_FW_VERSION_ADDR},
    telemetry::read_telemetry,
    ArcMsgOptions, ChipComms, ChipInitResult, ChipInterface, CommsStatus, HlComms, InitStatus,
    Telemetry,
};

/// Implementation of the interface for a Wormhole
/// both the local and remote Wormhole chips are represented by this struct
#[derive(Clone)]
pub struct Wormhole {
    pub chip_if: Arc<dyn ChipInterface + Send + Sync>,
    pub arc_if: Arc<dyn ChipComms + Send + Sync>,

    /// Set when this chip is reached over ethernet through another chip.
    pub remote_addr: Option<EthAddr>,

    pub arc_addrs: ArcMsgAddr,
    pub eth_locations: [EthCore; 16],
    eth_addrs: Arc<OnceCell<EthAddresses>>,
    telemetry_addr: Arc<OnceCell<u32>>,
}

impl HlComms for Wormhole {
    fn comms_obj(&self) -> Result<(&dyn ChipComms, &dyn ChipInterface), PlatformError> {
        Ok((self.arc_if.as_ref(), self.chip_if.as_ref()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthCore {
    pub x: u8,
    pub y: u8,
    pub enabled: bool,
}

impl EthCore {
    const fn at(x: u8, y: u8) -> Self {
        Self {
            x,
            y,
            enabled: true,
        }
    }
}

/// Ethernet cores in port order.
const ETH_LOCATIONS: [EthCore; 16] = [
    EthCore::at(9, 0),
    EthCore::at(1, 0),
    EthCore::at(8, 0),
    EthCore::at(2, 0),
    EthCore::at(7, 0),
    EthCore::at(3, 0),
    EthCore::at(6, 0),
    EthCore::at(4, 0),
    EthCore::at(9, 6),
    EthCore::at(1, 6),
    EthCore::at(8, 6),
    EthCore::at(2, 6),
    EthCore::at(7, 6),
    EthCore::at(3, 6),
    EthCore::at(6, 6),
    EthCore::at(4, 6),
];

impl Wormhole {
    pub(crate) fn init(
        remote_addr: Option<EthAddr>,
        arc_if: Arc<dyn ChipComms + Send + Sync>,
        chip_if: Arc<dyn ChipInterface + Send + Sync>,
    ) -> Result<Self, PlatformError> {
        let arc_addrs = ArcMsgAddr::try_from(arc_if.as_ref() as &dyn ChipComms)?;

        Ok(Wormhole {
            chip_if,
            arc_if,

            remote_addr,

            arc_addrs,
            eth_locations: ETH_LOCATIONS,
            eth_addrs: Arc::new(OnceCell::new()),
            telemetry_addr: Arc::new(OnceCell::new()),
        })
    }

    pub fn get_if<T: ChipInterface>(&self) -> Option<&T> {
        self.chip_if.as_any().downcast_ref::<T>()
    }

    /// Open a chip that is reachable over ethernet from this one.
    /// The new chip shares our transport, all of its traffic is sent through the `eth_*` callbacks
    /// of that transport with the resolved address.
    pub fn open_remote(&self, addr: impl IntoChip<EthAddr>) -> Result<Wormhole, PlatformError> {
        let addr = addr.cinto(self.arc_if.as_ref(), self.chip_if.as_ref())?;
        debug!(%addr, "opening remote wormhole");

        let arc_if = RemoteArcIf {
            addr,
            axi_data: AxiTable::noc(),
        };

        Self::init(Some(addr), Arc::new(arc_if), self.chip_if.clone())
    }

    pub fn is_remote(&self) -> bool {
        self.remote_addr.is_some()
    }

    /// Layout of the ethernet firmware structures, read from the first ethernet core on first use.
    pub fn eth_addrs(&self) -> Result<&EthAddresses, PlatformError> {
        self.eth_addrs.get_or_try_init(|| {
            let core = self.eth_locations[0];
            let fw_version = self.noc_read32(0, core.x, core.y, ETH_FW_VERSION_ADDR)?;
            Ok(EthAddresses::new(fw_version))
        })
    }

    pub fn get_local_chip_coord(&self) -> Result<EthAddr, PlatformError> {
        let node_info = self.eth_addrs()?.node_info;
        let core = self.eth_locations[0];
        let coord = self.noc_read32(0, core.x, core.y, node_info + NODE_INFO_COORD_OFFSET)?;

        Ok(EthAddr::from_coord_word(coord))
    }

    /// Watch the heartbeat of every enabled ethernet core for up to `window`.
    /// A core whose heartbeat moved is considered trained.
    pub fn check_ethernet_training_complete(
        &self,
        window: Duration,
    ) -> Result<Vec<bool>, PlatformError> {
        let heartbeat_addr = self.eth_addrs()?.heartbeat;

        let read_heartbeats = || -> Result<Vec<Option<u32>>, PlatformError> {
            let mut heartbeat = Vec::with_capacity(self.eth_locations.len());
            for core in self.eth_locations.iter() {
                if core.enabled {
                    heartbeat.push(Some(self.noc_read32(0, core.x, core.y, heartbeat_addr)?));
                } else {
                    heartbeat.push(None);
                }
            }
            Ok(heartbeat)
        };

        let initial_heartbeat = read_heartbeats()?;
        let start_time = std::time::Instant::now();

        // During initial training the erisc cores aren't running their heartbeats,
        // so a core whose heartbeat is stuck is treated as not trained.
        loop {
            let heartbeat = read_heartbeats()?;

            let valid_heartbeat = initial_heartbeat
                .iter()
                .zip(heartbeat.iter())
                .map(|(h1, h2)| h1.is_none() || h1 != h2)
                .collect::<Vec<_>>();

            let init_finished = valid_heartbeat.iter().all(|&x| x);
            if init_finished || start_time.elapsed() > window {
                return Ok(valid_heartbeat);
            }
        }
    }

    /// Returns true for each ethernet core that is running the firmware version we expect.
    pub fn check_ethernet_fw_version(&self) -> Result<Vec<bool>, PlatformError> {
        let eth_addrs = self.eth_addrs()?;

        let mut valid_fw_version = Vec::with_capacity(self.eth_locations.len());
        for core in &self.eth_locations {
            let version = self.noc_read32(0, core.x, core.y, eth_addrs.version)?;
            let msbyte = (version >> 24) & 0xFF;
            valid_fw_version.push(
                (msbyte == 0x0 || msbyte == 0x6)
                    && version & 0x00FFFFFF == eth_addrs.masked_version,
            );
        }

        Ok(valid_fw_version)
    }

    fn update_eth_status(&self, status: &mut InitStatus) -> Option<ChipInitResult> {
        let noc_safe = status.init_options.noc_safe;
        let window = status.init_options.eth_timeout;
        let arc_failed = status.arc_status.has_error();
        let status = &mut status.eth_status;

        if arc_failed || noc_safe {
            for eth_status in status.wait_status.iter_mut() {
                if let WaitStatus::Waiting(_) | WaitStatus::JustFinished = eth_status {
                    *eth_status = WaitStatus::NoCheck;
                }
            }
            return None;
        }

        let pending = status
            .wait_status
            .iter()
            .any(|s| matches!(s, WaitStatus::Waiting(_)));

        let (trained, fw_valid) = if pending {
            let checked = self
                .check_ethernet_training_complete(window)
                .and_then(|trained| Ok((trained, self.check_ethernet_fw_version()?)));
            match checked {
                Ok(checked) => checked,
                Err(err) => {
                    return Some(ChipInitResult::ErrorContinue(
                        err.to_string(),
                        std::backtrace::Backtrace::capture(),
                    ))
                }
            }
        } else {
            (Vec::new(), Vec::new())
        };

        let timed_out = status.timed_out();
        for (index, eth_status) in status.wait_status.iter_mut().enumerate() {
            match eth_status {
                WaitStatus::Waiting(status_string) => {
                    let trained = trained.get(index).copied().unwrap_or(false);
                    let fw_valid = fw_valid.get(index).copied().unwrap_or(false);
                    if trained {
                        if fw_valid {
                            *eth_status = WaitStatus::JustFinished;
                        } else {
                            *eth_status = WaitStatus::NotInitialized(
                                EthernetPartialInitError::FwOverwritten,
                            );
                        }
                    } else if timed_out {
                        *eth_status = WaitStatus::Error(EthernetInitError::NotTrained);
                    } else {
                        *status_string =
                            Some("Waiting for initial training to complete".to_string());
                    }
                }
                WaitStatus::JustFinished => {
                    *eth_status = WaitStatus::Done;
                }
                _ => {}
            }
        }

        None
    }
}

fn default_status(status: &InitStatus, is_remote: bool) -> InitStatus {
    let init_options = status.init_options.clone();
    InitStatus {
        comms_status: CommsStatus::CanCommunicate,
        arc_status: ComponentStatusInfo::init_waiting(
            "ARC".to_string(),
            init_options.arc_timeout,
            1,
        ),
        // The ethernet of a remote chip is trained by definition, we reached it over ethernet.
        eth_status: if is_remote {
            ComponentStatusInfo::not_present("ETH".to_string())
        } else {
            ComponentStatusInfo::init_waiting(
                "ETH".to_string(),
                init_options.eth_timeout,
                ETH_LOCATIONS.len(),
            )
        },

        init_options,

        unknown_state: false,
    }
}

impl ChipImpl for Wormhole {
    fn update_init_state(
        &mut self,
        status: &mut InitStatus,
    ) -> Result<ChipInitResult, PlatformError> {
        if status.unknown_state {
            *status = default_status(status, self.is_remote());
        }

        if let Some(result) = update_arc_status(&*self, status) {
            return Ok(result);
        }

        // If ARC has not finished initialization then we shouldn't init eth.
        if !status.arc_status.is_waiting() {
            if let Some(result) = self.update_eth_status(status) {
                return Ok(result);
            }
        } else {
            for eth_status in status.eth_status.wait_status.iter_mut() {
                if let WaitStatus::Waiting(status_string) = eth_status {
                    *status_string = Some("Waiting for ARC".to_string());
                }
            }
        }

        Ok(ChipInitResult::NoError)
    }

    fn get_arch(&self) -> Arch {
        Arch::Wormhole
    }

    fn arc_msg(&self, msg: ArcMsgOptions) -> Result<ArcMsgOk, PlatformError> {
        let (msg_reg, return_reg) = if msg.use_second_mailbox {
            (2, 4)
        } else {
            (5, 3)
        };

        if msg.wait_for_done {
            check_arc_msg_safe(self, msg_reg)?;
        }

        crate::arc_msg::arc_msg(
            self,
            &msg.msg,
            msg.wait_for_done,
            msg.timeout,
            msg_reg,
            return_reg,
            msg.addrs.as_ref().unwrap_or(&self.arc_addrs),
        )
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn get_telemetry(&self) -> Result<Telemetry, PlatformError> {
        let offset = *self.telemetry_addr.get_or_try_init(|| {
            let result = self.arc_msg(ArcMsgOptions {
                msg: ArcMsg::Typed(TypedArcMsg::GetSmbusTelemetryAddr),
                ..Default::default()
            })?;

            match result {
                ArcMsgOk::Ok { arg, .. } => Ok(arg),
                ArcMsgOk::OkNoWait => Err(PlatformError::from(
                    "telemetry address request completed without a response".to_string(),
                )),
            }
        })?;

        read_telemetry(
            Arch::Wormhole,
            self.arc_if.as_ref(),
            self.chip_if.as_ref(),
            offset,
        )
    }

    fn get_device_info(&self) -> Result<Option<crate::DeviceInfo>, PlatformError> {
        if self.is_remote() {
            Ok(None)
        } else {
            Ok(self.chip_if.get_device_info()?)
        }
    }
}
