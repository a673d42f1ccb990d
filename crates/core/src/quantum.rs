// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Quantum-based time synchronization.
//!
//! The host runs ahead freely for one quantum of virtual time, then tells the
//! kernel the quantum is over and re-arms. This timer is the only thing that
//! bounds how far the two kernels' clocks can drift apart.

use crate::bridge::SessionFlags;
use crate::metrics::BridgeMetrics;
use crate::{BridgeError, BridgeResult, KernelControl};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::sync::Arc;

/// The host's virtual clock and a one-shot timer on it.
pub trait VirtualTimer: std::fmt::Debug + Send + Sync {
    fn now_ns(&self) -> u64;
    /// Fire the timer once `now_ns()` reaches `deadline_ns`. Replaces any
    /// earlier deadline.
    fn arm(&self, deadline_ns: u64);
    fn disarm(&self);
}

/// A positive synchronization quantum in simulated nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantum(NonZeroU64);

impl Quantum {
    pub fn from_ns(ns: u64) -> BridgeResult<Self> {
        NonZeroU64::new(ns).map(Self).ok_or(BridgeError::BadQuantum)
    }

    pub fn as_ns(self) -> u64 {
        self.0.get()
    }
}

/// Periodic timer signalling the end of every quantum to the kernel.
///
/// Created by `Bridge::start_quantum_timer`, which fires it once at the current
/// virtual time before any instruction runs. The host calls [`expired`] each
/// time its one-shot timer fires. Dropping the timer disarms it.
///
/// [`expired`]: QuantumTimer::expired
#[derive(Debug)]
pub struct QuantumTimer {
    quantum: Quantum,
    timer: Arc<dyn VirtualTimer>,
    kernel: Arc<dyn KernelControl>,
    flags: Arc<SessionFlags>,
    metrics: Arc<BridgeMetrics>,
    fired: u64,
}

impl QuantumTimer {
    pub(crate) fn start(
        quantum: Quantum,
        timer: Arc<dyn VirtualTimer>,
        kernel: Arc<dyn KernelControl>,
        flags: Arc<SessionFlags>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        let mut t = Self {
            quantum,
            timer,
            kernel,
            flags,
            metrics,
            fired: 0,
        };
        t.expired();
        t
    }

    /// Timer callback: end the current quantum and schedule the next one.
    pub fn expired(&mut self) {
        self.flags.mark_initialized();
        self.kernel.end_of_quantum();
        self.metrics.on_quantum();
        self.fired += 1;

        let now = self.timer.now_ns();
        let next = now.saturating_add(self.quantum.as_ns());
        self.timer.arm(next);
        tracing::debug!("quantum {} ended at {} ns, next at {} ns", self.fired, now, next);
    }

    pub fn quantum(&self) -> Quantum {
        self.quantum
    }

    /// Number of quantum boundaries signalled so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

impl Drop for QuantumTimer {
    fn drop(&mut self) {
        self.timer.disarm();
    }
}
