// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use luwen_core::Arch;

use crate::{
    arc_msg::{check_arc_msg_safe, ArcMsgAddr, ArcMsgOk, ArcMsgProtocolError, TypedArcMsg},
    error::PlatformError,
    ArcMsg, ChipImpl,
};

use super::{
    init::{status::ComponentStatusInfo, update_arc_status},
    telemetry::read_telemetry,
    ArcMsgOptions, ChipComms, ChipInitResult, ChipInterface, CommsStatus, HlComms, InitStatus,
    Telemetry,
};

#[derive(Clone)]
pub struct Grayskull {
    pub chip_if: Arc<dyn ChipInterface + Send + Sync>,
    pub arc_if: Arc<dyn ChipComms + Send + Sync>,

    pub arc_addrs: ArcMsgAddr,
}

impl Grayskull {
    pub(crate) fn create(
        chip_if: Arc<dyn ChipInterface + Send + Sync>,
        arc_if: Arc<dyn ChipComms + Send + Sync>,
    ) -> Result<Self, PlatformError> {
        let arc_addrs = ArcMsgAddr::try_from(arc_if.as_ref() as &dyn ChipComms)?;

        Ok(Grayskull {
            chip_if,
            arc_if,
            arc_addrs,
        })
    }

    pub fn get_if<T: ChipInterface>(&self) -> Option<&T> {
        self.chip_if.as_any().downcast_ref::<T>()
    }
}

impl HlComms for Grayskull {
    fn comms_obj(&self) -> Result<(&dyn ChipComms, &dyn ChipInterface), PlatformError> {
        Ok((self.arc_if.as_ref(), self.chip_if.as_ref()))
    }
}

fn default_status(status: &InitStatus) -> InitStatus {
    let init_options = status.init_options.clone();
    InitStatus {
        comms_status: CommsStatus::CanCommunicate,
        arc_status: ComponentStatusInfo::init_waiting(
            "ARC".to_string(),
            init_options.arc_timeout,
            1,
        ),
        eth_status: ComponentStatusInfo::not_present("ETH".to_string()),

        init_options,

        unknown_state: false,
    }
}

impl ChipImpl for Grayskull {
    fn update_init_state(
        &mut self,
        status: &mut InitStatus,
    ) -> Result<ChipInitResult, PlatformError> {
        if status.unknown_state {
            *status = default_status(status);
        }

        if let Some(result) = update_arc_status(&*self, status) {
            return Ok(result);
        }

        Ok(ChipInitResult::NoError)
    }

    fn get_arch(&self) -> Arch {
        Arch::Grayskull
    }

    fn arc_msg(&self, msg: ArcMsgOptions) -> Result<ArcMsgOk, PlatformError> {
        let (msg_reg, return_reg) = if msg.use_second_mailbox {
            return Err(ArcMsgProtocolError::InvalidMailbox(2).into_error().into());
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
        let result = self.arc_msg(ArcMsgOptions {
            msg: ArcMsg::Typed(TypedArcMsg::GetSmbusTelemetryAddr),
            ..Default::default()
        })?;

        let offset = match result {
            ArcMsgOk::Ok { arg, .. } => arg,
            ArcMsgOk::OkNoWait => {
                return Err(PlatformError::from(
                    "telemetry address request completed without a response".to_string(),
                ))
            }
        };

        read_telemetry(
            Arch::Grayskull,
            self.arc_if.as_ref(),
            self.chip_if.as_ref(),
            offset,
        )
    }

    fn get_device_info(&self) -> Result<Option<crate::DeviceInfo>, PlatformError> {
        Ok(self.chip_if.get_device_info()?)
    }
}
