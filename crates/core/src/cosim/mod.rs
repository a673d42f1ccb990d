// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! In-process co-simulation kernel.
//!
//! Stands in for the external kernel the bridge normally talks to: a set of
//! memory-mapped targets behind a [`MemorySocket`], an exported parameter
//! space and a [`KernelControl`] endpoint that counts quanta.

pub mod shm;

use crate::dmi::{self, DmiBacking, DmiGrant, DmiPointer};
use crate::interrupt::InterruptBridge;
use crate::{
    BridgeError, BridgeResult, Command, DigitalLevel, KernelControl, MemorySocket, ParamSpace,
    Payload, ResponseStatus,
};
use anyhow::Context;
use labwired_cosim_config::{parse_size, ParamValue, SessionManifest, TargetKind};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub use shm::SharedRam;

/// Kernel parameters, in name order.
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    params: BTreeMap<String, ParamValue>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamTable {
    fn from(params: BTreeMap<String, ParamValue>) -> Self {
        Self { params }
    }
}

impl ParamSpace for ParamTable {
    fn param_names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    fn uint_param(&self, name: &str) -> Option<u64> {
        self.params.get(name)?.as_uint()
    }

    fn string_param(&self, name: &str) -> Option<String> {
        match self.params.get(name)? {
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::Uint(v) => Some(v.to_string()),
        }
    }
}

/// A memory-mapped model inside the kernel. Byte-granular like the host bus.
pub trait Target: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> BridgeResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> BridgeResult<()>;

    /// Direct pointer to the target's storage, if it has one to share.
    fn dmi(&self) -> Option<(DmiPointer, DmiBacking)> {
        None
    }
}

#[derive(Debug)]
pub struct TargetEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Target>,
}

impl TargetEntry {
    /// Inclusive last address, `None` for an empty or wrapping target.
    pub fn last_addr(&self) -> Option<u64> {
        self.base.checked_add(self.size.checked_sub(1)?)
    }

    fn contains(&self, addr: u64, len: u64) -> bool {
        let Some(last) = self.last_addr() else {
            return false;
        };
        len != 0 && addr >= self.base && addr.checked_add(len - 1).is_some_and(|end| end <= last)
    }
}

/// Plain register storage. Reads return the last value written.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    data: Vec<u8>,
}

impl RegisterFile {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }
}

impl Target for RegisterFile {
    fn read(&self, offset: u64) -> BridgeResult<u8> {
        self.data
            .get(offset as usize)
            .copied()
            .ok_or(BridgeError::TargetFault(offset))
    }

    fn write(&mut self, offset: u64, value: u8) -> BridgeResult<()> {
        let byte = self
            .data
            .get_mut(offset as usize)
            .ok_or(BridgeError::TargetFault(offset))?;
        *byte = value;
        Ok(())
    }
}

/// The kernel's initiator socket: routes payloads to targets by address.
#[derive(Debug, Default)]
pub struct LoopbackSocket {
    targets: Vec<TargetEntry>,
}

impl LoopbackSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, name: impl Into<String>, base: u64, size: u64, dev: Box<dyn Target>) {
        self.targets.push(TargetEntry {
            name: name.into(),
            base,
            size,
            dev,
        });
    }

    pub fn targets(&self) -> &[TargetEntry] {
        &self.targets
    }

    pub fn target_mut(&mut self, name: &str) -> Option<&mut TargetEntry> {
        self.targets.iter_mut().find(|t| t.name == name)
    }

    fn find(&mut self, addr: u64, len: u64) -> Option<&mut TargetEntry> {
        self.targets.iter_mut().find(|t| t.contains(addr, len))
    }
}

impl MemorySocket for LoopbackSocket {
    fn b_transport(&mut self, payload: &mut Payload) {
        if payload.command == Command::Ignore {
            payload.response = ResponseStatus::Ok;
            return;
        }
        if payload.size == 0 || payload.size > 8 {
            payload.response = ResponseStatus::BurstError;
            return;
        }
        let Some(target) = self.find(payload.address, payload.size as u64) else {
            payload.response = ResponseStatus::AddressError;
            return;
        };

        let offset = payload.address - target.base;
        let result = match payload.command {
            Command::Read => {
                let mut bytes = [0u8; 8];
                let mut res = Ok(());
                for (i, b) in bytes.iter_mut().take(payload.size as usize).enumerate() {
                    match target.dev.read(offset + i as u64) {
                        Ok(v) => *b = v,
                        Err(e) => {
                            res = Err(e);
                            break;
                        }
                    }
                }
                payload.value = u64::from_le_bytes(bytes);
                res
            }
            Command::Write => {
                let bytes = payload.value.to_le_bytes();
                bytes
                    .iter()
                    .take(payload.size as usize)
                    .enumerate()
                    .try_for_each(|(i, b)| target.dev.write(offset + i as u64, *b))
            }
            Command::Ignore => Ok(()),
        };

        payload.response = match result {
            Ok(()) => ResponseStatus::Ok,
            Err(e) => {
                tracing::warn!("{} at {:#x}: {}", target.name, payload.address, e);
                ResponseStatus::GenericError
            }
        };
    }

    fn get_direct_mem_ptr(&mut self, payload: &mut Payload) -> Option<DmiGrant> {
        let target = self.find(payload.address, 1)?;
        let end = target.last_addr()?;
        let (pointer, backing) = target.dev.dmi()?;
        payload.response = ResponseStatus::Ok;
        Some(DmiGrant {
            pointer,
            start: target.base,
            end,
            backing: Some(backing),
        })
    }
}

/// Kernel side of [`KernelControl`]: records what the host told it.
#[derive(Debug, Default)]
pub struct LoopbackControl {
    quanta: AtomicU64,
    stop_requested: AtomicBool,
}

impl LoopbackControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quanta(&self) -> u64 {
        self.quanta.load(Ordering::Acquire)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

impl KernelControl for LoopbackControl {
    fn end_of_quantum(&self) {
        self.quanta.fetch_add(1, Ordering::AcqRel);
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }
}

/// The kernel's interrupt initiator socket, bound to the bridge's target side.
#[derive(Debug, Clone)]
pub struct InterruptInitiator {
    socket: Arc<InterruptBridge>,
}

impl InterruptInitiator {
    pub fn new(socket: Arc<InterruptBridge>) -> Self {
        Self { socket }
    }

    pub fn set(&self, line: usize, level: DigitalLevel) -> ResponseStatus {
        let mut payload = Payload::new();
        payload.set_write(line as u64, bool::from(level) as u64, 4);
        self.socket.b_transport(&mut payload);
        payload.response
    }

    pub fn raise(&self, line: usize) -> ResponseStatus {
        self.set(line, DigitalLevel::High)
    }

    pub fn lower(&self, line: usize) -> ResponseStatus {
        self.set(line, DigitalLevel::Low)
    }
}

fn last_addr(name: &str, base: u64, size: u64) -> BridgeResult<u64> {
    size.checked_sub(1)
        .and_then(|span| base.checked_add(span))
        .ok_or_else(|| BridgeError::AddressOverflow {
            name: name.to_string(),
            base,
            size,
        })
}

/// A complete loopback kernel: socket, parameters and control endpoint.
#[derive(Debug, Default)]
pub struct LoopbackKernel {
    pub socket: LoopbackSocket,
    pub params: ParamTable,
    pub control: Arc<LoopbackControl>,
}

impl LoopbackKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name, value);
        self
    }

    pub fn map_registers(&mut self, name: &str, base: u64, size: u64) -> BridgeResult<()> {
        last_addr(name, base, size)?;
        self.socket
            .map(name, base, size, Box::new(RegisterFile::new(size as usize)));
        Ok(())
    }

    /// Map DMI-capable memory and advertise it through `<name>.base_addr` and
    /// `<name>.high_addr`.
    pub fn map_shared_ram(&mut self, name: &str, base: u64, ram: SharedRam) -> BridgeResult<()> {
        let size = ram.len() as u64;
        let high = last_addr(name, base, size)?;
        self.socket.map(name, base, size, Box::new(ram));
        self.params.insert(dmi::base_addr_param(name), base);
        self.params.insert(dmi::high_addr_param(name), high);
        Ok(())
    }

    pub fn from_manifest(manifest: &SessionManifest) -> anyhow::Result<Self> {
        let mut kernel = Self {
            params: ParamTable::from(manifest.params.clone()),
            ..Self::default()
        };

        for t_cfg in &manifest.targets {
            let size = parse_size(&t_cfg.size)
                .with_context(|| format!("Invalid size for target '{}'", t_cfg.id))?;
            match t_cfg.r#type {
                TargetKind::Registers => {
                    kernel.map_registers(&t_cfg.id, t_cfg.base_address, size)?
                }
                TargetKind::Ram => {
                    let ram = match &t_cfg.backing {
                        Some(path) => SharedRam::open(path, size as usize).with_context(|| {
                            format!("Failed to map backing file {:?} for '{}'", path, t_cfg.id)
                        })?,
                        None => SharedRam::anonymous(size as usize)
                            .with_context(|| format!("Failed to allocate RAM for '{}'", t_cfg.id))?,
                    };
                    kernel.map_shared_ram(&t_cfg.id, t_cfg.base_address, ram)?;
                }
            }
            tracing::debug!(
                "Target {} ({:?}) mapped at {:#x} ({} bytes)",
                t_cfg.id,
                t_cfg.r#type,
                t_cfg.base_address,
                size
            );
        }

        Ok(kernel)
    }
}
