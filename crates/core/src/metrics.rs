// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters shared by every bridge component.
#[derive(Debug)]
pub struct BridgeMetrics {
    transactions: AtomicU64,
    unassigned_fallbacks: AtomicU64,
    dmi_regions: AtomicU64,
    irq_received: AtomicU64,
    irq_pool_hits: AtomicU64,
    irq_overflow_allocations: AtomicU64,
    irq_delivered: AtomicU64,
    quanta: AtomicU64,
    start_time: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub transactions: u64,
    pub unassigned_fallbacks: u64,
    pub dmi_regions: u64,
    pub irq_received: u64,
    pub irq_pool_hits: u64,
    pub irq_overflow_allocations: u64,
    pub irq_delivered: u64,
    pub quanta: u64,
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self {
            transactions: AtomicU64::new(0),
            unassigned_fallbacks: AtomicU64::new(0),
            dmi_regions: AtomicU64::new(0),
            irq_received: AtomicU64::new(0),
            irq_pool_hits: AtomicU64::new(0),
            irq_overflow_allocations: AtomicU64::new(0),
            irq_delivered: AtomicU64::new(0),
            quanta: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn on_transaction(&self) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_unassigned(&self) {
        self.unassigned_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_dmi_region(&self) {
        self.dmi_regions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_irq_received(&self, pooled: bool) {
        self.irq_received.fetch_add(1, Ordering::Relaxed);
        if pooled {
            self.irq_pool_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.irq_overflow_allocations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn on_irq_delivered(&self) {
        self.irq_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_quantum(&self) {
        self.quanta.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_quanta(&self) -> u64 {
        self.quanta.load(Ordering::Relaxed)
    }

    pub fn get_irq_delivered(&self) -> u64 {
        self.irq_delivered.load(Ordering::Relaxed)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            transactions: self.transactions.load(Ordering::Relaxed),
            unassigned_fallbacks: self.unassigned_fallbacks.load(Ordering::Relaxed),
            dmi_regions: self.dmi_regions.load(Ordering::Relaxed),
            irq_received: self.irq_received.load(Ordering::Relaxed),
            irq_pool_hits: self.irq_pool_hits.load(Ordering::Relaxed),
            irq_overflow_allocations: self.irq_overflow_allocations.load(Ordering::Relaxed),
            irq_delivered: self.irq_delivered.load(Ordering::Relaxed),
            quanta: self.quanta.load(Ordering::Relaxed),
        }
    }
}
