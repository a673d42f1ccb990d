// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Direct memory interface discovery.
//!
//! The kernel advertises its DMI-capable memories as parameter pairs named
//! `<module>.base_addr` and `<module>.high_addr`. Only names with exactly that
//! shape are considered: `<module>` must be non-empty and the suffix must follow
//! a `.` separator, so parameters like `dma.rebase_addr` or `ram_base_addr` are
//! never mistaken for regions.

use crate::memory::MemoryBridge;
use crate::{BridgeError, BridgeResult, MemorySocket, ParamSpace, RamMapper};
use std::any::Any;
use std::ptr::NonNull;
use std::sync::Arc;

pub const REGION_SEPARATOR: char = '.';
pub const BASE_ADDR_SUFFIX: &str = "base_addr";
pub const HIGH_ADDR_SUFFIX: &str = "high_addr";

/// A host-visible pointer handed out by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmiPointer(NonNull<u8>);

// SAFETY: a DmiPointer is only dereferenced by `RamRegion`, and `DmiPointer::new`
// requires the memory to stay valid for every thread for the grant's lifetime.
unsafe impl Send for DmiPointer {}
unsafe impl Sync for DmiPointer {}

impl DmiPointer {
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes over the whole granted range for
    /// as long as the grant's backing (or, without one, the session) is alive.
    pub unsafe fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// # Safety
    ///
    /// `offset` must stay inside the granted range.
    pub unsafe fn add(self, offset: usize) -> Self {
        Self(NonNull::new_unchecked(self.0.as_ptr().add(offset)))
    }
}

/// Keeps the memory behind a grant alive while regions still point into it.
pub type DmiBacking = Arc<dyn Any + Send + Sync>;

/// The kernel's answer to a DMI query: `pointer` maps `start..=end`.
#[derive(Debug, Clone)]
pub struct DmiGrant {
    pub pointer: DmiPointer,
    pub start: u64,
    pub end: u64,
    pub backing: Option<DmiBacking>,
}

impl DmiGrant {
    pub fn covers(&self, base: u64, high: u64) -> bool {
        self.start <= base && high <= self.end
    }
}

/// A discovered direct-mapped range, installed into the host as RAM.
#[derive(Debug, Clone)]
pub struct DmiRegion {
    pub name: String,
    pub base: u64,
    /// Inclusive.
    pub high: u64,
    pub pointer: DmiPointer,
    pub backing: Option<DmiBacking>,
}

impl DmiRegion {
    /// Byte count, saturating at `u64::MAX` for `0..=u64::MAX`.
    pub fn size(&self) -> u64 {
        (self.high - self.base).saturating_add(1)
    }
}

/// Returns the module name if `param` is a region base-address parameter.
pub fn region_module(param: &str) -> Option<&str> {
    let module = param
        .strip_suffix(BASE_ADDR_SUFFIX)?
        .strip_suffix(REGION_SEPARATOR)?;
    if module.is_empty() || module.ends_with(REGION_SEPARATOR) {
        return None;
    }
    Some(module)
}

pub fn base_addr_param(module: &str) -> String {
    format!("{module}{REGION_SEPARATOR}{BASE_ADDR_SUFFIX}")
}

pub fn high_addr_param(module: &str) -> String {
    format!("{module}{REGION_SEPARATOR}{HIGH_ADDR_SUFFIX}")
}

/// Scan `params` for region pairs, query DMI for each one and map every grant.
///
/// Returns the installed regions; an empty result is left to the caller to
/// judge.
pub fn discover<S: MemorySocket>(
    memory: &mut MemoryBridge<S>,
    params: &dyn ParamSpace,
    mapper: &mut dyn RamMapper,
) -> BridgeResult<Vec<DmiRegion>> {
    let mut regions = Vec::new();

    for param in params.param_names() {
        let Some(module) = region_module(&param) else {
            continue;
        };

        let Some(base) = params.uint_param(&param) else {
            tracing::warn!("{} is not an unsigned parameter, skipped", param);
            continue;
        };
        let high_name = high_addr_param(module);
        let Some(high) = params.uint_param(&high_name) else {
            tracing::warn!("{} has no matching {}, skipped", param, high_name);
            continue;
        };
        if high < base {
            return Err(BridgeError::InvalidRegion {
                name: module.to_string(),
                base,
                high,
            });
        }

        let Some(grant) = memory.query_dmi(base) else {
            tracing::debug!("{} at {:#x} refused DMI", module, base);
            continue;
        };
        if !grant.covers(base, high) {
            tracing::warn!(
                "{}: DMI grant {:#x}..={:#x} does not cover {:#x}..={:#x}, skipped",
                module,
                grant.start,
                grant.end,
                base,
                high
            );
            continue;
        }

        // SAFETY: `covers` checked base lies inside the granted range.
        let pointer = unsafe { grant.pointer.add((base - grant.start) as usize) };
        let region = DmiRegion {
            name: module.to_string(),
            base,
            high,
            pointer,
            backing: grant.backing.clone(),
        };
        mapper.map_ram(&region)?;
        memory.metrics().on_dmi_region();
        tracing::info!(
            "DMI region {} mapped at {:#x}..={:#x} ({} bytes)",
            region.name,
            region.base,
            region.high,
            region.size()
        );
        regions.push(region);
    }

    Ok(regions)
}
