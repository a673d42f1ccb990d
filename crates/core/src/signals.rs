// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::IrqLine;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        match level {
            DigitalLevel::High => true,
            DigitalLevel::Low => false,
        }
    }
}

impl DigitalLevel {
    /// Interrupt transactions carry the level in the payload value; any
    /// non-zero value is high.
    pub fn from_payload_value(value: u64) -> Self {
        Self::from(value != 0)
    }
}

/// A host interrupt line that latches its level.
///
/// Counts every `set_level` call and every actual transition so tests and the
/// CLI can see what the bridge delivered.
#[derive(Debug, Default)]
pub struct LevelLine {
    level: AtomicBool,
    updates: AtomicU64,
    transitions: AtomicU64,
}

impl LevelLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> DigitalLevel {
        self.level.load(Ordering::SeqCst).into()
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::SeqCst)
    }
}

impl IrqLine for LevelLine {
    fn set_level(&self, level: DigitalLevel) {
        let new = bool::from(level);
        let old = self.level.swap(new, Ordering::SeqCst);
        self.updates.fetch_add(1, Ordering::SeqCst);
        if old != new {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_level_conversions() {
        assert_eq!(DigitalLevel::from(true), DigitalLevel::High);
        let b: bool = DigitalLevel::Low.into();
        assert!(!b);
        assert_eq!(DigitalLevel::from_payload_value(0), DigitalLevel::Low);
        assert_eq!(DigitalLevel::from_payload_value(7), DigitalLevel::High);
    }

    #[test]
    fn test_level_line_counts_transitions() {
        let line = LevelLine::new();
        assert!(!line.is_high());
        line.set_level(DigitalLevel::High);
        line.set_level(DigitalLevel::High);
        assert!(line.is_high());
        line.set_level(DigitalLevel::Low);
        assert_eq!(line.level(), DigitalLevel::Low);
        assert_eq!(line.updates(), 3);
        assert_eq!(line.transitions(), 2);
    }
}
