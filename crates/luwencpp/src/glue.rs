// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::ffi::c_void;

use luwen_if::FnOptions;

use crate::{DeviceInfo, EthAddr, GlueError};

pub type DeviceInfoFn = extern "C" fn(user_data: *mut c_void) -> DeviceInfo;

pub type AxiReadFn = extern "C" fn(addr: u32, data: *mut u8, len: u32, user_data: *mut c_void);
pub type AxiWriteFn =
    extern "C" fn(addr: u32, data: *const u8, len: u32, user_data: *mut c_void);

pub type NocReadFn = extern "C" fn(
    noc_id: u8,
    x: u32,
    y: u32,
    addr: u64,
    data: *mut u8,
    len: u64,
    user_data: *mut c_void,
);
pub type NocWriteFn = extern "C" fn(
    noc_id: u8,
    x: u32,
    y: u32,
    addr: u64,
    data: *const u8,
    len: u64,
    user_data: *mut c_void,
);
pub type NocBroadcastFn =
    extern "C" fn(noc_id: u8, addr: u64, data: *const u8, len: u64, user_data: *mut c_void);

pub type EthReadFn = extern "C" fn(
    eth_addr: EthAddr,
    noc_id: u8,
    x: u32,
    y: u32,
    addr: u64,
    data: *mut u8,
    len: u64,
    user_data: *mut c_void,
);
pub type EthWriteFn = extern "C" fn(
    eth_addr: EthAddr,
    noc_id: u8,
    x: u32,
    y: u32,
    addr: u64,
    data: *const u8,
    len: u64,
    user_data: *mut c_void,
);
pub type EthBroadcastFn = extern "C" fn(
    eth_addr: EthAddr,
    noc_id: u8,
    addr: u64,
    data: *const u8,
    len: u64,
    user_data: *mut c_void,
);

/// The transport as seen from C. Every callback must be set, `user_data` is passed back untouched.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct LuwenGlue {
    pub user_data: *mut c_void,

    pub device_info: Option<DeviceInfoFn>,

    /// Impls for bar reads and writes, the lowest level of communication
    /// used by local chips to talk to ARC.
    pub axi_read: Option<AxiReadFn>,
    pub axi_write: Option<AxiWriteFn>,

    /// Impls for noc reads and writes
    pub noc_read: Option<NocReadFn>,
    pub noc_write: Option<NocWriteFn>,
    pub noc_broadcast: Option<NocBroadcastFn>,

    /// Impls for eth reads and writes could be implemented with noc operations but
    /// requires exclusive access to the erisc being used. Managing this is left to the implementor.
    pub eth_read: Option<EthReadFn>,
    pub eth_write: Option<EthWriteFn>,
    pub eth_broadcast: Option<EthBroadcastFn>,
}

/// SAFETY: There is no way to guarantee that the user_data is safe to send to other threads.
/// Luwen won't create any threads, so we rely on the user to not share a chip between threads
/// if it would be unsafe for the user_data to be sent to other threads.
unsafe impl Send for LuwenGlue {}
unsafe impl Sync for LuwenGlue {}

fn required<F>(callback: Option<F>, name: &'static str) -> Result<F, GlueError> {
    callback.ok_or(GlueError::MissingCallback(name))
}

impl LuwenGlue {
    /// Make sure the whole table is filled in before any chip is bound to it.
    pub fn validate(&self) -> Result<(), GlueError> {
        required(self.device_info, "device_info")?;
        required(self.axi_read, "axi_read")?;
        required(self.axi_write, "axi_write")?;
        required(self.noc_read, "noc_read")?;
        required(self.noc_write, "noc_write")?;
        required(self.noc_broadcast, "noc_broadcast")?;
        required(self.eth_read, "eth_read")?;
        required(self.eth_write, "eth_write")?;
        required(self.eth_broadcast, "eth_broadcast")?;

        Ok(())
    }
}

/// Dispatch function handed to `CallbackStorage`, forwards each operation to the matching C callback.
pub fn callback_glue(
    glue: &LuwenGlue,
    options: FnOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_data = glue.user_data;

    match options {
        FnOptions::Driver(op) => match op {
            luwen_if::FnDriver::DeviceInfo(info) => {
                let device_info = required(glue.device_info, "device_info")?;
                *info = Some(device_info(user_data).into());
            }
        },
        FnOptions::Axi(op) => match op {
            luwen_if::FnAxi::Read { addr, data } => {
                let axi_read = required(glue.axi_read, "axi_read")?;
                axi_read(addr, data.as_mut_ptr(), data.len() as u32, user_data);
            }
            luwen_if::FnAxi::Write { addr, data } => {
                let axi_write = required(glue.axi_write, "axi_write")?;
                axi_write(addr, data.as_ptr(), data.len() as u32, user_data);
            }
        },
        FnOptions::Noc(op) => match op {
            luwen_if::FnNoc::Read {
                noc_id,
                x,
                y,
                addr,
                data,
            } => {
                let noc_read = required(glue.noc_read, "noc_read")?;
                noc_read(
                    noc_id,
                    x as u32,
                    y as u32,
                    addr,
                    data.as_mut_ptr(),
                    data.len() as u64,
                    user_data,
                );
            }
            luwen_if::FnNoc::Write {
                noc_id,
                x,
                y,
                addr,
                data,
            } => {
                let noc_write = required(glue.noc_write, "noc_write")?;
                noc_write(
                    noc_id,
                    x as u32,
                    y as u32,
                    addr,
                    data.as_ptr(),
                    data.len() as u64,
                    user_data,
                );
            }
            luwen_if::FnNoc::Broadcast { noc_id, addr, data } => {
                let noc_broadcast = required(glue.noc_broadcast, "noc_broadcast")?;
                noc_broadcast(noc_id, addr, data.as_ptr(), data.len() as u64, user_data);
            }
        },
        FnOptions::Eth(op) => {
            let eth_addr = EthAddr::from(op.addr);
            match op.rw {
                luwen_if::FnNoc::Read {
                    noc_id,
                    x,
                    y,
                    addr,
                    data,
                } => {
                    let eth_read = required(glue.eth_read, "eth_read")?;
                    eth_read(
                        eth_addr,
                        noc_id,
                        x as u32,
                        y as u32,
                        addr,
                        data.as_mut_ptr(),
                        data.len() as u64,
                        user_data,
                    );
                }
                luwen_if::FnNoc::Write {
                    noc_id,
                    x,
                    y,
                    addr,
                    data,
                } => {
                    let eth_write = required(glue.eth_write, "eth_write")?;
                    eth_write(
                        eth_addr,
                        noc_id,
                        x as u32,
                        y as u32,
                        addr,
                        data.as_ptr(),
                        data.len() as u64,
                        user_data,
                    );
                }
                luwen_if::FnNoc::Broadcast { noc_id, addr, data } => {
                    let eth_broadcast = required(glue.eth_broadcast, "eth_broadcast")?;
                    eth_broadcast(
                        eth_addr,
                        noc_id,
                        addr,
                        data.as_ptr(),
                        data.len() as u64,
                        user_data,
                    );
                }
            }
        }
    }

    Ok(())
}
