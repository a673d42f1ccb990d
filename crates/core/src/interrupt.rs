// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Kernel-to-host interrupt delivery.
//!
//! Interrupt transactions arrive on a kernel thread, but host interrupt lines
//! may only change on the CPU-owning thread with the execution lock held. The
//! target socket therefore only records the change in a trigger descriptor and
//! queues it; the CPU thread drains the queue through [`DeliveryPump`].
//!
//! Descriptors come from a fixed pool so the common case does not allocate.
//! The free-slot scan is a plain linear pass over atomic busy flags. Two
//! claimants racing for the same slot are resolved by the compare-exchange: the
//! loser keeps scanning, and may end up heap-allocating even though a slot was
//! freed behind it. A slot is never handed out twice. Deliveries for one line
//! from several producers are not ordered with respect to each other.

use crate::host::ExecutionLock;
use crate::metrics::BridgeMetrics;
use crate::{BridgeError, BridgeResult, DigitalLevel, IrqLine, Payload, ResponseStatus};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

#[derive(Debug, Default)]
struct PoolSlot {
    busy: AtomicBool,
    line: AtomicUsize,
    level: AtomicBool,
}

/// A heap-allocated trigger, used when every pool slot is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqTrigger {
    pub line: usize,
    pub level: DigitalLevel,
}

/// A pending interrupt delivery.
#[derive(Debug)]
pub enum Trigger {
    /// Index of a claimed pool slot.
    Pooled(usize),
    /// Overflow descriptor, freed after delivery.
    Allocated(Box<IrqTrigger>),
}

impl Trigger {
    pub fn is_allocated(&self) -> bool {
        matches!(self, Trigger::Allocated(_))
    }
}

/// Fixed set of reusable trigger descriptors.
#[derive(Debug)]
pub struct TriggerPool {
    slots: Box<[PoolSlot]>,
    overflow_live: AtomicUsize,
}

impl TriggerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| PoolSlot::default()).collect(),
            overflow_live: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently claimed.
    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.busy.load(Ordering::Acquire))
            .count()
    }

    /// Overflow descriptors not yet released.
    pub fn overflow_live(&self) -> usize {
        self.overflow_live.load(Ordering::Acquire)
    }

    pub fn claim(&self, line: usize, level: DigitalLevel) -> Trigger {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.busy.load(Ordering::Relaxed) {
                continue;
            }
            if slot
                .busy
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                // Published to the consumer by the queue's send/recv.
                slot.line.store(line, Ordering::Relaxed);
                slot.level.store(level.into(), Ordering::Relaxed);
                return Trigger::Pooled(idx);
            }
        }

        self.overflow_live.fetch_add(1, Ordering::AcqRel);
        Trigger::Allocated(Box::new(IrqTrigger { line, level }))
    }

    pub fn contents(&self, trigger: &Trigger) -> IrqTrigger {
        match trigger {
            Trigger::Pooled(idx) => {
                let slot = &self.slots[*idx];
                IrqTrigger {
                    line: slot.line.load(Ordering::Relaxed),
                    level: slot.level.load(Ordering::Relaxed).into(),
                }
            }
            Trigger::Allocated(node) => **node,
        }
    }

    pub fn release(&self, trigger: Trigger) {
        match trigger {
            Trigger::Pooled(idx) => self.slots[idx].busy.store(false, Ordering::Release),
            Trigger::Allocated(node) => {
                drop(node);
                self.overflow_live.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }
}

/// Target side of the kernel's interrupt socket.
#[derive(Debug)]
pub struct InterruptBridge {
    lines: OnceLock<Box<[Arc<dyn IrqLine>]>>,
    pool: TriggerPool,
    queue: Sender<Trigger>,
    metrics: Arc<BridgeMetrics>,
}

impl InterruptBridge {
    /// Create the bridge and the CPU-thread end of its delivery queue.
    pub fn new(pool_capacity: usize, metrics: Arc<BridgeMetrics>) -> (Arc<Self>, DeliveryPump) {
        let (tx, rx) = mpsc::channel();
        let bridge = Arc::new(Self {
            lines: OnceLock::new(),
            pool: TriggerPool::new(pool_capacity),
            queue: tx,
            metrics,
        });
        let pump = DeliveryPump {
            bridge: bridge.clone(),
            rx,
        };
        (bridge, pump)
    }

    /// Export the host interrupt lines. Allowed exactly once.
    pub fn export_irqs(&self, lines: Vec<Arc<dyn IrqLine>>) -> BridgeResult<()> {
        if lines.is_empty() {
            return Err(BridgeError::EmptyIrqExport);
        }
        let count = lines.len();
        self.lines
            .set(lines.into_boxed_slice())
            .map_err(|_| BridgeError::IrqAlreadyExported)?;
        tracing::info!("{} irq line(s) exported", count);
        Ok(())
    }

    pub fn exported_lines(&self) -> usize {
        self.lines.get().map_or(0, |l| l.len())
    }

    pub fn pool(&self) -> &TriggerPool {
        &self.pool
    }

    /// Queue a level change for `line`. Never blocks.
    ///
    /// # Panics
    ///
    /// If `line` is not below the number of exported lines; that is a platform
    /// wiring bug, not a runtime condition.
    pub fn submit(&self, line: usize, level: DigitalLevel) -> BridgeResult<()> {
        let lines = self.lines.get().ok_or(BridgeError::IrqNotExported)?;
        assert!(
            line < lines.len(),
            "irq line {} out of range ({} exported)",
            line,
            lines.len()
        );

        let trigger = self.pool.claim(line, level);
        self.metrics.on_irq_received(!trigger.is_allocated());
        tracing::debug!("irq {} -> {:?} queued ({:?})", line, level, trigger);

        if let Err(mpsc::SendError(trigger)) = self.queue.send(trigger) {
            // The CPU thread is gone; nothing will ever deliver this.
            tracing::warn!("irq {} dropped, delivery pump has shut down", line);
            self.pool.release(trigger);
        }
        Ok(())
    }

    /// Blocking transport registered on the kernel's interrupt target socket.
    ///
    /// The payload address is the line index, the value the new level. The
    /// response is OK as soon as the delivery is queued.
    pub fn b_transport(&self, payload: &mut Payload) {
        let line = payload.address as usize;
        let level = DigitalLevel::from_payload_value(payload.value);
        if let Err(e) = self.submit(line, level) {
            crate::fatal(&e);
        }
        payload.response = ResponseStatus::Ok;
    }

    fn deliver(&self, trigger: Trigger, lock: &ExecutionLock) {
        let _guard = lock.lock();
        let IrqTrigger { line, level } = self.pool.contents(&trigger);
        if let Some(lines) = self.lines.get() {
            lines[line].set_level(level);
        }
        self.pool.release(trigger);
        self.metrics.on_irq_delivered();
    }
}

/// CPU-thread end of the delivery queue.
#[derive(Debug)]
pub struct DeliveryPump {
    bridge: Arc<InterruptBridge>,
    rx: Receiver<Trigger>,
}

impl DeliveryPump {
    pub fn bridge(&self) -> &Arc<InterruptBridge> {
        &self.bridge
    }

    /// Deliver everything queued so far. Returns the number of deliveries.
    pub fn pump(&self, lock: &ExecutionLock) -> usize {
        let mut delivered = 0;
        while let Ok(trigger) = self.rx.try_recv() {
            self.bridge.deliver(trigger, lock);
            delivered += 1;
        }
        delivered
    }

    /// Wait up to `timeout` for one delivery, then drain the rest.
    pub fn pump_timeout(&self, lock: &ExecutionLock, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(trigger) => {
                self.bridge.deliver(trigger, lock);
                1 + self.pump(lock)
            }
            Err(_) => 0,
        }
    }
}
