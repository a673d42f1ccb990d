// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::RamRegion;
use crate::{BridgeError, BridgeResult, DmiRegion, MmioHandler, RamMapper, UnassignedAccess};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnassignedRecord {
    Read { addr: u64, size: u32 },
    Write { addr: u64, value: u64, size: u32 },
}

/// Unassigned-access handler: reads return zero, writes are dropped, and every
/// access is kept for inspection.
#[derive(Debug, Default)]
pub struct UnassignedLog {
    pub records: Vec<UnassignedRecord>,
}

impl UnassignedAccess for UnassignedLog {
    fn unassigned_read(&mut self, addr: u64, size: u32) -> u64 {
        tracing::warn!("unassigned read at {:#x} ({} bytes)", addr, size);
        self.records.push(UnassignedRecord::Read { addr, size });
        0
    }

    fn unassigned_write(&mut self, addr: u64, value: u64, size: u32) {
        tracing::warn!(
            "unassigned write at {:#x} ({} bytes) = {:#x}",
            addr,
            size,
            value
        );
        self.records
            .push(UnassignedRecord::Write { addr, value, size });
    }
}

/// Host physical address space: DMI-backed RAM first, the bridge for the rest.
#[derive(Debug, Default)]
pub struct AddressSpace {
    regions: Vec<RamRegion>,
    unassigned: UnassignedLog,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regions(&self) -> &[RamRegion] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&RamRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn unassigned(&self) -> &UnassignedLog {
        &self.unassigned
    }

    fn ram_for(&self, addr: u64, size: u32) -> Option<&RamRegion> {
        self.regions.iter().find(|r| r.contains(addr, size))
    }

    pub fn read(&mut self, mmio: &mut dyn MmioHandler, addr: u64, size: u32) -> u64 {
        if let Some(value) = self.ram_for(addr, size).and_then(|r| r.read(addr, size)) {
            return value;
        }
        mmio.mmio_read(&mut self.unassigned, addr, size)
    }

    pub fn write(&mut self, mmio: &mut dyn MmioHandler, addr: u64, value: u64, size: u32) {
        if self
            .ram_for(addr, size)
            .is_some_and(|r| r.write(addr, value, size))
        {
            return;
        }
        mmio.mmio_write(&mut self.unassigned, addr, value, size);
    }
}

impl RamMapper for AddressSpace {
    fn map_ram(&mut self, region: &DmiRegion) -> BridgeResult<()> {
        if self
            .regions
            .iter()
            .any(|r| r.overlaps(region.base, region.high))
        {
            return Err(BridgeError::RegionOverlap(region.name.clone()));
        }
        self.regions.push(RamRegion::from_dmi(region));
        Ok(())
    }
}
