// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Reference implementation of the host-simulator side of the bridge.
//!
//! A real host plugs in its own address space, clock and lock; these are used
//! by the CLI, the tests and the benchmarks.

pub mod address_space;
pub mod clock;

pub use address_space::{AddressSpace, UnassignedLog};
pub use clock::VirtualClock;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// The host simulator's global execution lock.
///
/// Interrupt lines and other CPU-visible state only change while it is held.
#[derive(Debug, Default)]
pub struct ExecutionLock {
    inner: Mutex<()>,
}

impl ExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, a panic elsewhere cannot leave it torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.inner.try_lock().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_lock_excludes() {
        let lock = ExecutionLock::new();
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }
}
