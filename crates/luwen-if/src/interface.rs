// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::chip::{eth_addr::EthAddr, ChipInterface};

/// A single noc transaction. The buffers are borrowed for the duration of
/// the callback and must not be retained by the implementor.
#[derive(Debug)]
pub enum FnNoc<'a> {
    Read {
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &'a mut [u8],
    },
    Write {
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &'a [u8],
    },
    Broadcast {
        noc_id: u8,
        addr: u64,
        data: &'a [u8],
    },
}

/// A noc transaction that must first be routed over ethernet to the chip at `addr`.
#[derive(Debug)]
pub struct FnRemote<'a> {
    pub addr: EthAddr,
    pub rw: FnNoc<'a>,
}

#[derive(Debug)]
pub enum FnAxi<'a> {
    Read { addr: u32, data: &'a mut [u8] },
    Write { addr: u32, data: &'a [u8] },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub interface_id: u32,

    pub domain: u16,
    pub bus: u16,
    pub slot: u16,
    pub function: u16,

    pub vendor: u16,
    pub device_id: u16,
    pub bar_size: u64,
}

#[derive(Debug)]
pub enum FnDriver<'a> {
    DeviceInfo(&'a mut Option<DeviceInfo>),
}

#[derive(Debug)]
pub enum FnOptions<'a> {
    Driver(FnDriver<'a>),
    Axi(FnAxi<'a>),
    Noc(FnNoc<'a>),
    Eth(FnRemote<'a>),
}

pub type Callback<T> = fn(&T, FnOptions<'_>) -> Result<(), Box<dyn std::error::Error>>;

/// Adapts a single dispatch function plus its user data into a `ChipInterface`.
/// This is the shape used by the language bindings, where the transport is a table of
/// foreign callbacks rather than a rust type.
#[derive(Clone)]
pub struct CallbackStorage<T: Clone + Send> {
    pub callback: Callback<T>,
    pub user_data: T,
}

impl<T: Clone + Send> CallbackStorage<T> {
    pub fn new(callback: Callback<T>, user_data: T) -> Self {
        Self {
            callback,
            user_data,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ChipInterface for CallbackStorage<T> {
    fn get_device_info(&self) -> Result<Option<DeviceInfo>, Box<dyn std::error::Error>> {
        let mut driver_info = None;
        (self.callback)(
            &self.user_data,
            FnOptions::Driver(FnDriver::DeviceInfo(&mut driver_info)),
        )?;

        Ok(driver_info)
    }

    fn axi_read(&self, addr: u32, data: &mut [u8]) -> Result<(), Box<dyn std::error::Error>> {
        (self.callback)(&self.user_data, FnOptions::Axi(FnAxi::Read { addr, data }))
    }

    fn axi_write(&self, addr: u32, data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        (self.callback)(&self.user_data, FnOptions::Axi(FnAxi::Write { addr, data }))
    }

    fn noc_read(
        &self,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        (self.callback)(
            &self.user_data,
            FnOptions::Noc(FnNoc::Read {
                noc_id,
                x,
                y,
                addr,
                data,
            }),
        )
    }

    fn noc_write(
        &self,
        noc_id: u8,
        x: u8,
        y: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        (self.callback)(
            &self.user_data,
            FnOptions::Noc(FnNoc::Write {
                noc_id,
                x,
                y,
                addr,
                data,
            }),
        )
    }

    fn noc_broadcast(
        &self,
        noc_id: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        (self.callback)(
            &self.user_data,
            FnOptions::Noc(FnNoc::Broadcast { noc_id, addr, data }),
        )
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
        (self.callback)(
            &self.user_data,
            FnOptions::Eth(FnRemote {
                addr: eth_addr,
                rw: FnNoc::Read {
                    noc_id,
                    x,
                    y,
                    addr,
                    data,
                },
            }),
        )
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
        (self.callback)(
            &self.user_data,
            FnOptions::Eth(FnRemote {
                addr: eth_addr,
                rw: FnNoc::Write {
                    noc_id,
                    x,
                    y,
                    addr,
                    data,
                },
            }),
        )
    }

    fn eth_noc_broadcast(
        &self,
        eth_addr: EthAddr,
        noc_id: u8,
        addr: u64,
        data: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        (self.callback)(
            &self.user_data,
            FnOptions::Eth(FnRemote {
                addr: eth_addr,
                rw: FnNoc::Broadcast { noc_id, addr, data },
            }),
        )
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct Scratch {
        axi: Arc<Mutex<HashMap<u32, u8>>>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    fn scratch_callback(
        ud: &Scratch,
        op: FnOptions<'_>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match op {
            FnOptions::Driver(FnDriver::DeviceInfo(info)) => {
                *info = Some(DeviceInfo {
                    interface_id: 3,
                    ..Default::default()
                });
            }
            FnOptions::Axi(FnAxi::Write { addr, data }) => {
                let mut axi = ud.axi.lock().unwrap();
                for (offset, byte) in data.iter().enumerate() {
                    axi.insert(addr + offset as u32, *byte);
                }
            }
            FnOptions::Axi(FnAxi::Read { addr, data }) => {
                let axi = ud.axi.lock().unwrap();
                for (offset, byte) in data.iter_mut().enumerate() {
                    *byte = axi.get(&(addr + offset as u32)).copied().unwrap_or(0);
                }
            }
            FnOptions::Noc(op) => ud.seen.lock().unwrap().push(format!("noc {op:?}")),
            FnOptions::Eth(op) => ud.seen.lock().unwrap().push(format!("eth {}", op.addr)),
        }
        Ok(())
    }

    #[test]
    fn callback_storage_dispatches_axi() {
        let storage = CallbackStorage::new(scratch_callback, Scratch::default());

        storage.axi_write(0x100, &[1, 2, 3, 4]).unwrap();
        let mut data = [0; 4];
        storage.axi_read(0x100, &mut data).unwrap();
        assert_eq!(data, [1, 2, 3, 4]);

        let info = storage.get_device_info().unwrap().unwrap();
        assert_eq!(info.interface_id, 3);
    }

    #[test]
    fn callback_storage_forwards_eth_address() {
        let scratch = Scratch::default();
        let storage = CallbackStorage::new(scratch_callback, scratch.clone());

        let addr = EthAddr {
            shelf_x: 1,
            shelf_y: 0,
            rack_x: 0,
            rack_y: 0,
        };
        storage.eth_noc_write(addr, 0, 1, 1, 0x0, &[0xff]).unwrap();
        storage.noc_broadcast(1, 0x0, &[0xff]).unwrap();

        let seen = scratch.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], format!("eth {addr}"));
        assert!(seen[1].starts_with("noc Broadcast"));
    }
}
