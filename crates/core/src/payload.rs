// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    #[default]
    Read,
    Write,
    Ignore,
}

/// TLM-style response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Incomplete,
    Ok,
    AddressError,
    CommandError,
    BurstError,
    ByteEnableError,
    GenericError,
}

impl ResponseStatus {
    pub fn is_ok(self) -> bool {
        self == ResponseStatus::Ok
    }
}

/// One memory access crossing the kernel boundary.
///
/// The memory path keeps a single payload and overwrites it on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub address: u64,
    pub size: u32,
    pub command: Command,
    pub value: u64,
    pub response: ResponseStatus,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read(&mut self, address: u64, size: u32) {
        self.address = address;
        self.size = size;
        self.command = Command::Read;
        self.response = ResponseStatus::Incomplete;
    }

    pub fn set_write(&mut self, address: u64, value: u64, size: u32) {
        self.address = address;
        self.size = size;
        self.value = value;
        self.command = Command::Write;
        self.response = ResponseStatus::Incomplete;
    }

    /// Mask for the low `size` bytes of `value`.
    pub fn value_mask(&self) -> u64 {
        match self.size {
            0 => 0,
            1..=7 => (1u64 << (self.size * 8)) - 1,
            _ => u64::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_read_clears_stale_response() {
        let mut p = Payload::new();
        p.response = ResponseStatus::Ok;
        p.set_read(0x40, 4);
        assert_eq!(p.command, Command::Read);
        assert_eq!(p.response, ResponseStatus::Incomplete);
        assert_eq!(p.address, 0x40);
        assert_eq!(p.size, 4);
    }

    #[test]
    fn test_set_write_keeps_value() {
        let mut p = Payload::new();
        p.set_write(0x1000, 0xdead_beef, 4);
        assert_eq!(p.command, Command::Write);
        assert_eq!(p.value, 0xdead_beef);
        assert_eq!(p.value_mask(), 0xffff_ffff);
    }

    #[test]
    fn test_value_mask_widths() {
        let mut p = Payload::new();
        p.size = 1;
        assert_eq!(p.value_mask(), 0xff);
        p.size = 2;
        assert_eq!(p.value_mask(), 0xffff);
        p.size = 8;
        assert_eq!(p.value_mask(), u64::MAX);
    }
}
