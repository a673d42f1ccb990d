// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::dmi::{DmiBacking, DmiPointer, DmiRegion};

/// Host RAM backed directly by a DMI pointer.
///
/// Accesses never reach the kernel; they go straight to the granted memory,
/// little endian, as the CPU model's fast path.
#[derive(Debug, Clone)]
pub struct RamRegion {
    pub name: String,
    pub base_addr: u64,
    /// Inclusive, so a region may end at the top of the address space.
    pub high_addr: u64,
    /// Saturates at `u64::MAX` for a region spanning the whole address space.
    pub size: u64,
    pointer: DmiPointer,
    _backing: Option<DmiBacking>,
}

impl RamRegion {
    pub fn from_dmi(region: &DmiRegion) -> Self {
        Self {
            name: region.name.clone(),
            base_addr: region.base,
            high_addr: region.high,
            size: region.size(),
            pointer: region.pointer,
            _backing: region.backing.clone(),
        }
    }

    pub fn pointer(&self) -> DmiPointer {
        self.pointer
    }

    pub fn contains(&self, addr: u64, size: u32) -> bool {
        size != 0
            && addr >= self.base_addr
            && addr
                .checked_add(size as u64 - 1)
                .is_some_and(|last| last <= self.high_addr)
    }

    /// Both ranges are inclusive.
    pub fn overlaps(&self, base: u64, high: u64) -> bool {
        base <= self.high_addr && self.base_addr <= high
    }

    pub fn read(&self, addr: u64, size: u32) -> Option<u64> {
        if !self.contains(addr, size) || size > 8 {
            return None;
        }
        let offset = (addr - self.base_addr) as usize;
        let mut bytes = [0u8; 8];
        // SAFETY: `contains` keeps offset..offset+size inside the granted range,
        // which DmiPointer::new guarantees is valid for reads.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.pointer.as_ptr().add(offset),
                bytes.as_mut_ptr(),
                size as usize,
            );
        }
        Some(u64::from_le_bytes(bytes))
    }

    pub fn write(&self, addr: u64, value: u64, size: u32) -> bool {
        if !self.contains(addr, size) || size > 8 {
            return false;
        }
        let offset = (addr - self.base_addr) as usize;
        let bytes = value.to_le_bytes();
        // SAFETY: same bounds as `read`; the grant is valid for writes.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.pointer.as_ptr().add(offset),
                size as usize,
            );
        }
        true
    }
}
