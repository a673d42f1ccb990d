// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::Target;
use crate::dmi::{DmiBacking, DmiPointer};
use crate::{BridgeError, BridgeResult};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

#[derive(Debug)]
struct Mapping {
    _map: MmapMut,
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is only touched through `ptr` with bounds checks; it is
// plain memory shared by every holder of the Arc.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

/// Memory shared between the kernel and the host through DMI.
///
/// Backed either by an anonymous mapping or by a file, so an out-of-process
/// kernel can map the same pages.
#[derive(Debug, Clone)]
pub struct SharedRam {
    mapping: Arc<Mapping>,
}

impl SharedRam {
    pub fn anonymous(size: usize) -> BridgeResult<Self> {
        Self::from_map(MmapMut::map_anon(Self::checked_size(size)?)?)
    }

    pub fn open<P: AsRef<Path>>(path: P, size: usize) -> BridgeResult<Self> {
        let size = Self::checked_size(size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(size as u64)?;
        // SAFETY: the file is sized above; concurrent external writers are the
        // point of the mapping and are only observed through raw reads.
        let map = unsafe { MmapMut::map_mut(&file)? };
        Self::from_map(map)
    }

    fn checked_size(size: usize) -> BridgeResult<usize> {
        if size == 0 {
            return Err(BridgeError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "shared RAM must not be empty",
            )));
        }
        Ok(size)
    }

    fn from_map(mut map: MmapMut) -> BridgeResult<Self> {
        let len = map.len();
        let ptr = NonNull::new(map.as_mut_ptr())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "null mapping"))?;
        Ok(Self {
            mapping: Arc::new(Mapping {
                _map: map,
                ptr,
                len,
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.mapping.len
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.len == 0
    }
}

impl Target for SharedRam {
    fn read(&self, offset: u64) -> BridgeResult<u8> {
        if offset >= self.len() as u64 {
            return Err(BridgeError::TargetFault(offset));
        }
        // SAFETY: bounds checked against the mapping length.
        Ok(unsafe { self.mapping.ptr.as_ptr().add(offset as usize).read() })
    }

    fn write(&mut self, offset: u64, value: u8) -> BridgeResult<()> {
        if offset >= self.len() as u64 {
            return Err(BridgeError::TargetFault(offset));
        }
        // SAFETY: bounds checked against the mapping length.
        unsafe { self.mapping.ptr.as_ptr().add(offset as usize).write(value) };
        Ok(())
    }

    fn dmi(&self) -> Option<(DmiPointer, DmiBacking)> {
        // SAFETY: the pointer covers the whole mapping, and the backing Arc
        // keeps the mapping alive for every region built from it.
        let pointer = unsafe { DmiPointer::new(self.mapping.ptr) };
        Some((pointer, self.mapping.clone() as DmiBacking))
    }
}
