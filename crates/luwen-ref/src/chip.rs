// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use luwen_core::Arch;
use luwen_if::{
    chip::communication::chip_comms::{
        NOC_ARC_CSM_BASE, NOC_ARC_RESET_BASE, PCI_ARC_CSM_BASE, PCI_ARC_RESET_BASE,
    },
    DeviceInfo, EthAddr,
};
use tracing::{debug, trace};

use crate::error::SimError;

const SCRATCH_OFFSET: u64 = 0x60;
const MISC_CNTL_OFFSET: u64 = 0x100;
const RESET_WINDOW: u64 = 0x1000;
const CSM_WINDOW: u64 = 0x8_0000;

const FW_INT_BIT: u32 = 1 << 16;
const MSG_ERROR_REPLY: u32 = 0xFFFF_FFFF;

pub const POST_CODE_IDLE: u32 = 0xC0DE_0001;
pub const POST_CODE_BOOTING: u32 = 0x1111_0000;

const ARC_CSM_ARC_VIEW_BASE: u32 = 0x1000_0000;
/// Where the telemetry block sits inside CSM.
pub const TELEMETRY_CSM_OFFSET: u32 = 0x1_F000;
pub const TELEMETRY_ENUM_VERSION: u32 = 0xBA5E_0001;

pub const ETH_FW_VERSION: u32 = 0x0006_7000;
const ETH_FW_VERSION_ADDR: u64 = 0x210;
const ETH_HEARTBEAT_ADDR: u64 = 0x1c;
const ETH_NODE_COORD_ADDR: u64 = 0x1108;

const WH_ETH_CORES: [(u8, u8); 16] = [
    (9, 0),
    (1, 0),
    (8, 0),
    (2, 0),
    (7, 0),
    (3, 0),
    (6, 0),
    (4, 0),
    (9, 6),
    (1, 6),
    (8, 6),
    (2, 6),
    (7, 6),
    (3, 6),
    (6, 6),
    (4, 6),
];

/// How the simulated ARC firmware answers a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArcResponse {
    Reply { rc: u32, arg: u32 },
    /// Reply with the argument plus one, this is what the test message does.
    Increment,
    NotRecognized,
}

fn default_response(code: u8) -> ArcResponse {
    let reply = |arg| ArcResponse::Reply { rc: 0, arg };
    match code {
        0x90 => ArcResponse::Increment,
        0x2C => reply(ARC_CSM_ARC_VIEW_BASE + TELEMETRY_CSM_OFFSET),
        0xB9 => reply(0x0105_0000),
        0x34 => reply(1000),
        0x11 | 0x57 | 0x52..=0x55 | 0xA0 | 0xA1 | 0xA3 | 0xA5 | 0xAF | 0xBA | 0xBB => reply(0),
        _ => ArcResponse::NotRecognized,
    }
}

#[derive(Debug)]
struct PendingMsg {
    msg_reg: u64,
    return_reg: u64,
    code: u8,
    arg: u32,
    polls: u32,
}

fn scratch_addr(index: u64) -> u64 {
    PCI_ARC_RESET_BASE + SCRATCH_OFFSET + index * 4
}

fn misc_cntl_addr() -> u64 {
    PCI_ARC_RESET_BASE + MISC_CNTL_OFFSET
}

/// A single chip held in memory.
///
/// The ARC register block is stored at its pci bar address. When the ARC node is accessed over
/// the noc the reset and CSM windows are folded back onto the same storage. Both nocs address
/// a node with the same coordinates.
#[derive(Debug)]
pub struct SimChip {
    arch: Arch,
    addr: EthAddr,
    attached: bool,
    board_id: u64,

    axi: HashMap<u64, u8>,
    noc: HashMap<(u8, u8, u64), u8>,
    broadcasts: HashMap<(u8, u8), u32>,

    responses: HashMap<u8, ArcResponse>,
    poll_delay: u32,
    never_complete: bool,
    stuck_interrupt: bool,
    eth_trained: bool,

    pending: Option<PendingMsg>,
    received: Vec<u16>,
}

impl SimChip {
    fn new(arch: Arch) -> Self {
        let mut chip = SimChip {
            arch,
            addr: EthAddr::default(),
            attached: true,
            board_id: 0,

            axi: HashMap::new(),
            noc: HashMap::new(),
            broadcasts: HashMap::new(),

            responses: HashMap::new(),
            poll_delay: 1,
            never_complete: false,
            stuck_interrupt: false,
            eth_trained: true,

            pending: None,
            received: Vec::new(),
        };

        chip.write_axi32(scratch_addr(0), POST_CODE_IDLE);
        chip.write_telemetry();
        chip.write_eth_fw();

        chip
    }

    pub fn grayskull() -> Self {
        Self::new(Arch::Grayskull)
    }

    pub fn wormhole() -> Self {
        Self::new(Arch::Wormhole)
    }

    /// Place the chip at `addr` in the ethernet fabric.
    pub fn at(mut self, addr: EthAddr) -> Self {
        self.addr = addr;
        self.write_eth_fw();
        self
    }

    /// The chip has no host link of its own, it can only be reached over ethernet.
    pub fn detached(mut self) -> Self {
        self.attached = false;
        self
    }

    pub fn with_board_id(mut self, board_id: u64) -> Self {
        self.board_id = board_id;
        self.write_telemetry();
        self
    }

    pub fn with_arc_response(mut self, code: u8, response: ArcResponse) -> Self {
        self.responses.insert(code, response);
        self
    }

    /// Number of mailbox polls before the firmware answers, at least one.
    pub fn with_poll_delay(mut self, polls: u32) -> Self {
        self.poll_delay = polls.max(1);
        self
    }

    /// Messages are accepted but never answered.
    pub fn never_complete(mut self) -> Self {
        self.never_complete = true;
        self
    }

    /// The firmware interrupt bit is stuck high.
    pub fn with_stuck_interrupt(mut self) -> Self {
        self.stuck_interrupt = true;
        let misc = self.read_axi32(misc_cntl_addr());
        self.write_axi32(misc_cntl_addr(), misc | FW_INT_BIT);
        self
    }

    /// ARC never leaves its boot sequence.
    pub fn booting(mut self) -> Self {
        self.write_axi32(scratch_addr(0), POST_CODE_BOOTING);
        self
    }

    /// Ethernet heartbeats never move.
    pub fn untrained_eth(mut self) -> Self {
        self.eth_trained = false;
        self
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn addr(&self) -> EthAddr {
        self.addr
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn has_ethernet(&self) -> bool {
        self.arch.has_ethernet()
    }

    pub fn grid_size(&self) -> (u8, u8) {
        match self.arch {
            Arch::Grayskull => (13, 12),
            Arch::Wormhole => (10, 12),
        }
    }

    fn arc_node(&self) -> (u8, u8) {
        match self.arch {
            Arch::Grayskull => (0, 2),
            Arch::Wormhole => (0, 10),
        }
    }

    fn is_eth_core(&self, x: u8, y: u8) -> bool {
        self.has_ethernet() && WH_ETH_CORES.contains(&(x, y))
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            vendor: 0x1e52,
            device_id: match self.arch {
                Arch::Grayskull => 0xfaca,
                Arch::Wormhole => 0x401e,
            },
            bar_size: 1 << 29,
            ..Default::default()
        }
    }

    /// Message codes the firmware has accepted, in order.
    pub fn received_messages(&self) -> &[u16] {
        &self.received
    }

    pub fn broadcast_count(&self, x: u8, y: u8) -> u32 {
        self.broadcasts.get(&(x, y)).copied().unwrap_or(0)
    }

    pub fn axi_peek32(&self, addr: u64) -> u32 {
        self.read_axi32(addr)
    }

    pub fn noc_peek32(&self, x: u8, y: u8, addr: u64) -> u32 {
        let mut value = [0u8; 4];
        for (offset, byte) in value.iter_mut().enumerate() {
            *byte = self
                .noc
                .get(&(x, y, addr + offset as u64))
                .copied()
                .unwrap_or(0);
        }
        u32::from_le_bytes(value)
    }

    fn read_axi32(&self, addr: u64) -> u32 {
        let mut value = [0u8; 4];
        for (offset, byte) in value.iter_mut().enumerate() {
            *byte = self.axi.get(&(addr + offset as u64)).copied().unwrap_or(0);
        }
        u32::from_le_bytes(value)
    }

    fn write_axi32(&mut self, addr: u64, value: u32) {
        for (offset, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.axi.insert(addr + offset as u64, byte);
        }
    }

    fn write_noc32(&mut self, x: u8, y: u8, addr: u64, value: u32) {
        for (offset, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.noc.insert((x, y, addr + offset as u64), byte);
        }
    }

    fn write_telemetry(&mut self) {
        let base = PCI_ARC_CSM_BASE + TELEMETRY_CSM_OFFSET as u64;
        let device_id = self.device_info().device_id as u32;

        self.write_axi32(base, TELEMETRY_ENUM_VERSION);
        self.write_axi32(base + 4, device_id);
        self.write_axi32(base + 4 * 4, (self.board_id >> 32) as u32);
        self.write_axi32(base + 5 * 4, self.board_id as u32);
    }

    fn write_eth_fw(&mut self) {
        if !self.has_ethernet() {
            return;
        }

        let coord = self.addr.to_coord_word();
        for (x, y) in WH_ETH_CORES {
            self.write_noc32(x, y, ETH_FW_VERSION_ADDR, ETH_FW_VERSION);
            self.write_noc32(x, y, ETH_NODE_COORD_ADDR, coord);
        }
    }

    pub fn axi_read(&mut self, addr: u64, data: &mut [u8]) {
        self.poll_mailbox(addr);

        for (offset, byte) in data.iter_mut().enumerate() {
            *byte = self.axi.get(&(addr + offset as u64)).copied().unwrap_or(0);
        }
    }

    pub fn axi_write(&mut self, addr: u64, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            self.axi.insert(addr + offset as u64, *byte);
        }

        if addr == misc_cntl_addr() {
            let misc = self.read_axi32(addr);
            if misc & FW_INT_BIT != 0 && !self.stuck_interrupt {
                self.accept_message();
                self.write_axi32(addr, misc & !FW_INT_BIT);
            }
        }
    }

    /// Latch whichever mailbox holds a queued message.
    fn accept_message(&mut self) {
        for (msg_reg, return_reg) in [(5, 3), (2, 4)] {
            let queued = self.read_axi32(scratch_addr(msg_reg));
            if queued & 0xFFFF_FF00 == 0xAA00 {
                let arg = self.read_axi32(scratch_addr(return_reg));
                debug!(
                    chip = %self.addr,
                    code = %format!("{queued:#x}"),
                    arg,
                    "sim arc accepted message"
                );

                self.received.push(queued as u16);
                self.pending = Some(PendingMsg {
                    msg_reg,
                    return_reg,
                    code: (queued & 0xFF) as u8,
                    arg,
                    polls: 0,
                });
                return;
            }
        }
    }

    /// Reading the mailbox of a pending message advances the firmware.
    fn poll_mailbox(&mut self, addr: u64) {
        let ready = match self.pending.as_mut() {
            Some(pending) if scratch_addr(pending.msg_reg) == addr => {
                pending.polls += 1;
                trace!(polls = pending.polls, "sim arc mailbox polled");
                !self.never_complete && pending.polls >= self.poll_delay
            }
            _ => false,
        };

        if ready {
            if let Some(pending) = self.pending.take() {
                self.complete(pending);
            }
        }
    }

    fn complete(&mut self, pending: PendingMsg) {
        let response = self
            .responses
            .get(&pending.code)
            .copied()
            .unwrap_or_else(|| default_response(pending.code));

        let (rc, arg) = match response {
            ArcResponse::Reply { rc, arg } => (rc, arg),
            ArcResponse::Increment => (0, pending.arg.wrapping_add(1)),
            ArcResponse::NotRecognized => {
                self.write_axi32(scratch_addr(pending.msg_reg), MSG_ERROR_REPLY);
                return;
            }
        };

        self.write_axi32(scratch_addr(pending.return_reg), arg);
        self.write_axi32(
            scratch_addr(pending.msg_reg),
            (rc << 16) | pending.code as u32,
        );
    }

    fn check_node(&self, x: u8, y: u8) -> Result<(), SimError> {
        let (grid_x, grid_y) = self.grid_size();
        if x < grid_x && y < grid_y {
            Ok(())
        } else {
            Err(SimError::InvalidNode {
                arch: self.arch.to_string(),
                x,
                y,
            })
        }
    }

    /// Map a noc address at the ARC node onto the pci view of the register block.
    fn arc_window(&self, x: u8, y: u8, addr: u64) -> Option<u64> {
        if (x, y) != self.arc_node() {
            return None;
        }

        if (NOC_ARC_RESET_BASE..NOC_ARC_RESET_BASE + RESET_WINDOW).contains(&addr) {
            Some(addr - NOC_ARC_RESET_BASE + PCI_ARC_RESET_BASE)
        } else if (NOC_ARC_CSM_BASE..NOC_ARC_CSM_BASE + CSM_WINDOW).contains(&addr) {
            Some(addr - NOC_ARC_CSM_BASE + PCI_ARC_CSM_BASE)
        } else {
            None
        }
    }

    pub fn noc_read(
        &mut self,
        _noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), SimError> {
        self.check_node(x, y)?;

        if let Some(axi_addr) = self.arc_window(x, y, addr) {
            self.axi_read(axi_addr, data);
            return Ok(());
        }

        if self.eth_trained && addr == ETH_HEARTBEAT_ADDR && self.is_eth_core(x, y) {
            let heartbeat = self.noc_peek32(x, y, addr).wrapping_add(1);
            self.write_noc32(x, y, addr, heartbeat);
        }

        for (offset, byte) in data.iter_mut().enumerate() {
            *byte = self
                .noc
                .get(&(x, y, addr + offset as u64))
                .copied()
                .unwrap_or(0);
        }

        Ok(())
    }

    pub fn noc_write(
        &mut self,
        _noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), SimError> {
        self.check_node(x, y)?;
        self.write_node(x, y, addr, data);
        Ok(())
    }

    /// Write `data` to every node of the grid.
    pub fn noc_broadcast(&mut self, _noc_id: u8, addr: u64, data: &[u8]) {
        let (grid_x, grid_y) = self.grid_size();
        for x in 0..grid_x {
            for y in 0..grid_y {
                self.write_node(x, y, addr, data);
                *self.broadcasts.entry((x, y)).or_default() += 1;
            }
        }
    }

    fn write_node(&mut self, x: u8, y: u8, addr: u64, data: &[u8]) {
        if let Some(axi_addr) = self.arc_window(x, y, addr) {
            self.axi_write(axi_addr, data);
            return;
        }

        for (offset, byte) in data.iter().enumerate() {
            self.noc.insert((x, y, addr + offset as u64), *byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(chip: &mut SimChip, code: u32, arg: u32) {
        chip.axi_write(scratch_addr(3), &arg.to_le_bytes());
        chip.axi_write(scratch_addr(5), &code.to_le_bytes());
        chip.axi_write(misc_cntl_addr(), &FW_INT_BIT.to_le_bytes());
    }

    fn poll(chip: &mut SimChip) -> u32 {
        let mut data = [0u8; 4];
        chip.axi_read(scratch_addr(5), &mut data);
        u32::from_le_bytes(data)
    }

    #[test]
    fn answers_after_poll_delay() {
        let mut chip = SimChip::wormhole().with_poll_delay(3);
        post(&mut chip, 0xaa90, 41);

        assert_eq!(chip.axi_peek32(misc_cntl_addr()) & FW_INT_BIT, 0);
        assert_eq!(poll(&mut chip), 0xaa90);
        assert_eq!(poll(&mut chip), 0xaa90);
        assert_eq!(poll(&mut chip), 0x90);
        assert_eq!(chip.axi_peek32(scratch_addr(3)), 42);
        assert_eq!(chip.received_messages(), &[0xaa90]);
    }

    #[test]
    fn unknown_message_reports_error_reply() {
        let mut chip = SimChip::grayskull();
        post(&mut chip, 0xaaee, 0);

        assert_eq!(poll(&mut chip), MSG_ERROR_REPLY);
    }

    #[test]
    fn custom_response_sets_exit_code() {
        let mut chip =
            SimChip::wormhole().with_arc_response(0x34, ArcResponse::Reply { rc: 2, arg: 7 });
        post(&mut chip, 0xaa34, 0);

        assert_eq!(poll(&mut chip), 0x0002_0034);
        assert_eq!(chip.axi_peek32(scratch_addr(3)), 7);
    }

    #[test]
    fn arc_noc_window_aliases_pci_registers() {
        let mut chip = SimChip::wormhole();
        let mut data = [0u8; 4];
        chip.noc_read(0, 0, 10, NOC_ARC_RESET_BASE + SCRATCH_OFFSET, &mut data)
            .unwrap();
        assert_eq!(u32::from_le_bytes(data), POST_CODE_IDLE);

        chip.noc_write(0, 0, 10, NOC_ARC_CSM_BASE + 0x10, &[1, 2, 3, 4])
            .unwrap();
        assert_eq!(chip.axi_peek32(PCI_ARC_CSM_BASE + 0x10), 0x0403_0201);
    }

    #[test]
    fn heartbeat_moves_only_when_trained() {
        let mut trained = SimChip::wormhole();
        let mut untrained = SimChip::wormhole().untrained_eth();

        let read = |chip: &mut SimChip| {
            let mut data = [0u8; 4];
            chip.noc_read(0, 9, 0, ETH_HEARTBEAT_ADDR, &mut data).unwrap();
            u32::from_le_bytes(data)
        };

        let first = read(&mut trained);
        assert_ne!(first, read(&mut trained));

        let first = read(&mut untrained);
        assert_eq!(first, read(&mut untrained));
    }

    #[test]
    fn broadcast_covers_grid_once() {
        let mut chip = SimChip::grayskull();
        chip.noc_broadcast(0, 0x100, &[0xAB; 4]);

        for x in 0..13 {
            for y in 0..12 {
                assert_eq!(chip.broadcast_count(x, y), 1);
                assert_eq!(chip.noc_peek32(x, y, 0x100), 0xABAB_ABAB);
            }
        }
    }

    #[test]
    fn rejects_nodes_outside_grid() {
        let mut chip = SimChip::wormhole();
        let mut data = [0u8; 4];
        assert!(matches!(
            chip.noc_read(0, 10, 0, 0, &mut data),
            Err(SimError::InvalidNode { x: 10, y: 0, .. })
        ));
    }
}
