// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::quantum::VirtualTimer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Virtual time in nanoseconds plus one one-shot deadline.
///
/// Any `u64` is a valid deadline, including `u64::MAX`; the armed state is kept
/// apart from it. Virtual time saturates instead of wrapping.
#[derive(Debug)]
pub struct VirtualClock {
    now_ns: AtomicU64,
    deadline_ns: AtomicU64,
    armed: AtomicBool,
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            now_ns: AtomicU64::new(0),
            deadline_ns: AtomicU64::new(0),
            armed: AtomicBool::new(false),
        }
    }

    pub fn deadline_ns(&self) -> Option<u64> {
        self.armed
            .load(Ordering::SeqCst)
            .then(|| self.deadline_ns.load(Ordering::SeqCst))
    }

    pub fn is_due(&self) -> bool {
        self.deadline_ns()
            .is_some_and(|d| self.now_ns.load(Ordering::SeqCst) >= d)
    }

    /// Move virtual time forward. Returns true once the deadline is reached.
    pub fn advance(&self, delta_ns: u64) -> bool {
        let _ = self
            .now_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(delta_ns))
            });
        self.is_due()
    }

    /// Jump to the armed deadline, if any, and return it.
    pub fn advance_to_deadline(&self) -> Option<u64> {
        let deadline = self.deadline_ns()?;
        self.now_ns.fetch_max(deadline, Ordering::SeqCst);
        Some(deadline)
    }
}

impl VirtualTimer for VirtualClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }

    fn arm(&self, deadline_ns: u64) {
        self.deadline_ns.store(deadline_ns, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_reached() {
        let clock = VirtualClock::new();
        assert!(!clock.advance(10));
        clock.arm(100);
        assert!(!clock.advance(50));
        assert!(clock.advance(40));
        assert_eq!(clock.now_ns(), 100);
        clock.disarm();
        assert!(!clock.is_due());
    }

    #[test]
    fn test_advance_to_deadline() {
        let clock = VirtualClock::new();
        assert_eq!(clock.advance_to_deadline(), None);
        clock.arm(250);
        assert_eq!(clock.advance_to_deadline(), Some(250));
        assert_eq!(clock.now_ns(), 250);
        assert!(clock.is_due());
    }

    #[test]
    fn test_deadline_at_end_of_time_stays_armed() {
        let clock = VirtualClock::new();
        clock.arm(u64::MAX);
        assert_eq!(clock.deadline_ns(), Some(u64::MAX));
        assert!(!clock.advance(1 << 63));
        assert!(clock.advance(u64::MAX));
        assert_eq!(clock.now_ns(), u64::MAX);
        clock.disarm();
        assert_eq!(clock.deadline_ns(), None);
    }
}
