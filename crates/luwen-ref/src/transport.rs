// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use luwen_core::Arch;
use luwen_if::{chip::ChipInterface, DeviceInfo, EthAddr};

use crate::{chip::SimChip, error::SimError};

/// Every chip that can be reached, keyed by its ethernet address.
#[derive(Debug, Default)]
pub struct SimFabric {
    chips: HashMap<EthAddr, SimChip>,
}

pub type SharedFabric = Arc<Mutex<SimFabric>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimFabric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chip(mut self, chip: SimChip) -> Self {
        self.insert(chip);
        self
    }

    pub fn insert(&mut self, chip: SimChip) -> Option<SimChip> {
        self.chips.insert(chip.addr(), chip)
    }

    pub fn chip(&self, addr: EthAddr) -> Option<&SimChip> {
        self.chips.get(&addr)
    }

    pub fn chip_mut(&mut self, addr: EthAddr) -> Option<&mut SimChip> {
        self.chips.get_mut(&addr)
    }

    /// Chips with their own host link, in address order.
    pub fn attached(&self) -> Vec<(EthAddr, Arch)> {
        let mut attached = self
            .chips
            .values()
            .filter(|chip| chip.is_attached())
            .map(|chip| (chip.addr(), chip.arch()))
            .collect::<Vec<_>>();
        attached.sort_by_key(|(addr, _)| *addr);
        attached
    }

    pub fn into_shared(self) -> SharedFabric {
        Arc::new(Mutex::new(self))
    }
}

/// One transport callback as seen by the simulated host link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    DeviceInfo,
    AxiRead {
        addr: u32,
        len: usize,
    },
    AxiWrite {
        addr: u32,
        len: usize,
    },
    NocRead {
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        len: usize,
    },
    NocWrite {
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        len: usize,
    },
    NocBroadcast {
        noc_id: u8,
        addr: u64,
        len: usize,
    },
    EthRead {
        target: EthAddr,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        len: usize,
    },
    EthWrite {
        target: EthAddr,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        len: usize,
    },
    EthBroadcast {
        target: EthAddr,
        noc_id: u8,
        addr: u64,
        len: usize,
    },
}

impl Call {
    pub fn is_eth(&self) -> bool {
        matches!(
            self,
            Call::EthRead { .. } | Call::EthWrite { .. } | Call::EthBroadcast { .. }
        )
    }
}

/// Host link to the chip at `local`. Ethernet traffic is forwarded to whichever chip of the
/// fabric it is addressed to.
///
/// The fabric lock is held for the whole of each call, so transactions that share an
/// ethernet core never interleave.
#[derive(Clone)]
pub struct SimTransport {
    fabric: SharedFabric,
    local: EthAddr,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl SimTransport {
    pub fn new(fabric: SharedFabric, local: EthAddr) -> Self {
        Self {
            fabric,
            local,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn local(&self) -> EthAddr {
        self.local
    }

    pub fn fabric(&self) -> &SharedFabric {
        &self.fabric
    }

    /// Calls made so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *lock(&self.calls))
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    fn with_local<R>(
        &self,
        f: impl FnOnce(&mut SimChip) -> Result<R, SimError>,
    ) -> Result<R, SimError> {
        let mut fabric = lock(&self.fabric);
        let chip = fabric
            .chip_mut(self.local)
            .ok_or(SimError::UnknownChip(self.local))?;
        f(chip)
    }

    fn with_remote<R>(
        &self,
        target: EthAddr,
        f: impl FnOnce(&mut SimChip) -> Result<R, SimError>,
    ) -> Result<R, SimError> {
        let mut fabric = lock(&self.fabric);

        let local = fabric
            .chip(self.local)
            .ok_or(SimError::UnknownChip(self.local))?;
        if !local.has_ethernet() {
            return Err(SimError::NoEthernet(local.arch().to_string()));
        }

        let chip = fabric
            .chip_mut(target)
            .ok_or(SimError::UnknownChip(target))?;
        f(chip)
    }
}

impl ChipInterface for SimTransport {
    fn get_device_info(&self) -> Result<Option<DeviceInfo>, Box<dyn std::error::Error>> {
        self.record(Call::DeviceInfo);
        Ok(Some(self.with_local(|chip| Ok(chip.device_info()))?))
    }

    fn axi_read(&self, addr: u32, data: &mut [u8]) -> Result<(), Box<dyn std::error::Error>> {
        self.record(Call::AxiRead {
            addr,
            len: data.len(),
        });
        Ok(self.with_local(|chip| {
            chip.axi_read(addr as u64, data);
            Ok(())
        })?)
    }

    fn axi_write(&self, addr: u32, data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        self.record(Call::AxiWrite {
            addr,
            len: data.len(),
        });
        Ok(self.with_local(|chip| {
            chip.axi_write(addr as u64, data);
            Ok(())
        })?)
    }

    fn noc_read(
        &self,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.record(Call::NocRead {
            noc_id,
            x,
            y,
            addr,
            len: data.len(),
        });
        Ok(self.with_local(|chip| chip.noc_read(noc_id, x, y, addr, data))?)
    }

    fn noc_write(
        &self,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.record(Call::NocWrite {
            noc_id,
            x,
            y,
            addr,
            len: data.len(),
        });
        Ok(self.with_local(|chip| chip.noc_write(noc_id, x, y, addr, data))?)
    }

    fn noc_broadcast(
        &self,
        noc_id: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.record(Call::NocBroadcast {
            noc_id,
            addr,
            len: data.len(),
        });
        Ok(self.with_local(|chip| {
            chip.noc_broadcast(noc_id, addr, data);
            Ok(())
        })?)
    }

    fn eth_noc_read(
        &self,
        eth_addr: EthAddr,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.record(Call::EthRead {
            target: eth_addr,
            noc_id,
            x,
            y,
            addr,
            len: data.len(),
        });
        Ok(self.with_remote(eth_addr, |chip| chip.noc_read(noc_id, x, y, addr, data))?)
    }

    fn eth_noc_write(
        &self,
        eth_addr: EthAddr,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.record(Call::EthWrite {
            target: eth_addr,
            noc_id,
            x,
            y,
            addr,
            len: data.len(),
        });
        Ok(self.with_remote(eth_addr, |chip| chip.noc_write(noc_id, x, y, addr, data))?)
    }

    fn eth_noc_broadcast(
        &self,
        eth_addr: EthAddr,
        noc_id: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.record(Call::EthBroadcast {
            target: eth_addr,
            noc_id,
            addr,
            len: data.len(),
        });
        Ok(self.with_remote(eth_addr, |chip| {
            chip.noc_broadcast(noc_id, addr, data);
            Ok(())
        })?)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
