// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod ram;

use crate::metrics::BridgeMetrics;
use crate::{
    BridgeError, BridgeResult, Command, DmiGrant, MemorySocket, Payload, ResponseStatus,
    UnassignedAccess,
};
use std::sync::Arc;

pub use ram::RamRegion;

/// Forwards host MMIO accesses to the kernel's memory socket.
///
/// There is one payload per bridge and it is rewritten on every access, so the
/// memory path takes `&mut self`: callers on different threads have to be
/// serialized by whoever owns the bridge.
pub struct MemoryBridge<S> {
    socket: S,
    payload: Option<Payload>,
    metrics: Arc<BridgeMetrics>,
}

impl<S: MemorySocket> MemoryBridge<S> {
    pub fn new(socket: S, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            socket,
            payload: None,
            metrics,
        }
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }

    /// The payload of the last transaction, if any was issued.
    pub fn last_payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn read(
        &mut self,
        host: &mut dyn UnassignedAccess,
        addr: u64,
        size: u32,
    ) -> BridgeResult<u64> {
        let payload = self.payload.get_or_insert_with(Payload::new);
        payload.set_read(addr, size);
        self.socket.b_transport(payload);
        self.metrics.on_transaction();

        match payload.response {
            ResponseStatus::Ok => Ok(payload.value & payload.value_mask()),
            ResponseStatus::AddressError => {
                // Nobody in the kernel claims the address: behave as if there
                // were no bridge at all.
                self.metrics.on_unassigned();
                tracing::debug!("read {:#x}/{} unassigned", addr, size);
                Ok(host.unassigned_read(addr, size))
            }
            status => Err(BridgeError::Protocol {
                addr,
                command: Command::Read,
                status,
            }),
        }
    }

    pub fn write(
        &mut self,
        host: &mut dyn UnassignedAccess,
        addr: u64,
        value: u64,
        size: u32,
    ) -> BridgeResult<()> {
        let payload = self.payload.get_or_insert_with(Payload::new);
        payload.set_write(addr, value, size);
        self.socket.b_transport(payload);
        self.metrics.on_transaction();

        match payload.response {
            ResponseStatus::Ok => Ok(()),
            ResponseStatus::AddressError => {
                self.metrics.on_unassigned();
                tracing::debug!("write {:#x}/{} = {:#x} unassigned", addr, size, value);
                host.unassigned_write(addr, value, size);
                Ok(())
            }
            status => Err(BridgeError::Protocol {
                addr,
                command: Command::Write,
                status,
            }),
        }
    }

    /// Ask the kernel whether `addr` can be accessed through a direct pointer.
    pub fn query_dmi(&mut self, addr: u64) -> Option<DmiGrant> {
        let payload = self.payload.get_or_insert_with(Payload::new);
        payload.set_read(addr, 0);
        self.socket.get_direct_mem_ptr(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Answers from a map; everything else is an address error.
    #[derive(Default)]
    struct MapSocket {
        regs: HashMap<u64, u64>,
        force: Option<ResponseStatus>,
    }

    impl MemorySocket for MapSocket {
        fn b_transport(&mut self, payload: &mut Payload) {
            if let Some(status) = self.force {
                payload.response = status;
                return;
            }
            let Some(reg) = self.regs.get_mut(&payload.address) else {
                payload.response = ResponseStatus::AddressError;
                return;
            };
            match payload.command {
                Command::Read => payload.value = *reg,
                Command::Write => *reg = payload.value,
                Command::Ignore => {}
            }
            payload.response = ResponseStatus::Ok;
        }

        fn get_direct_mem_ptr(&mut self, _payload: &mut Payload) -> Option<DmiGrant> {
            None
        }
    }

    #[derive(Default)]
    struct Unassigned {
        reads: Vec<(u64, u32)>,
        writes: Vec<(u64, u64, u32)>,
    }

    impl UnassignedAccess for Unassigned {
        fn unassigned_read(&mut self, addr: u64, size: u32) -> u64 {
            self.reads.push((addr, size));
            0xdead
        }

        fn unassigned_write(&mut self, addr: u64, value: u64, size: u32) {
            self.writes.push((addr, value, size));
        }
    }

    fn bridge(socket: MapSocket) -> MemoryBridge<MapSocket> {
        MemoryBridge::new(socket, Arc::new(BridgeMetrics::new()))
    }

    #[test]
    fn test_payload_is_created_lazily() {
        let mut mem = bridge(MapSocket::default());
        assert!(mem.last_payload().is_none());
        let mut host = Unassigned::default();
        mem.read(&mut host, 0x10, 4).unwrap();
        assert!(mem.last_payload().is_some());
    }

    #[test]
    fn test_claimed_read_and_write() {
        let mut socket = MapSocket::default();
        socket.regs.insert(0x100, 0x1234);
        let mut mem = bridge(socket);
        let mut host = Unassigned::default();

        assert_eq!(mem.read(&mut host, 0x100, 4).unwrap(), 0x1234);
        mem.write(&mut host, 0x100, 0xabcd, 4).unwrap();
        assert_eq!(mem.read(&mut host, 0x100, 4).unwrap(), 0xabcd);
        assert!(host.reads.is_empty());
        assert!(host.writes.is_empty());
        assert_eq!(mem.metrics().report().transactions, 3);
    }

    #[test]
    fn test_read_value_masked_to_size() {
        let mut socket = MapSocket::default();
        socket.regs.insert(0x200, 0x1122_3344_5566_7788);
        let mut mem = bridge(socket);
        let mut host = Unassigned::default();
        assert_eq!(mem.read(&mut host, 0x200, 2).unwrap(), 0x7788);
        assert_eq!(mem.read(&mut host, 0x200, 8).unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_address_error_falls_back_unchanged() {
        let mut mem = bridge(MapSocket::default());
        let mut host = Unassigned::default();

        assert_eq!(mem.read(&mut host, 0x9000, 2).unwrap(), 0xdead);
        mem.write(&mut host, 0x9004, 0x55, 1).unwrap();
        assert_eq!(host.reads, vec![(0x9000, 2)]);
        assert_eq!(host.writes, vec![(0x9004, 0x55, 1)]);
        assert_eq!(mem.metrics().report().unassigned_fallbacks, 2);
    }

    #[test]
    fn test_other_status_is_protocol_violation() {
        let mut mem = bridge(MapSocket {
            force: Some(ResponseStatus::GenericError),
            ..Default::default()
        });
        let mut host = Unassigned::default();
        let err = mem.read(&mut host, 0x100, 4).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Protocol {
                addr: 0x100,
                command: Command::Read,
                status: ResponseStatus::GenericError
            }
        ));
        assert!(host.reads.is_empty());
    }

    #[test]
    fn test_incomplete_response_is_protocol_violation() {
        let mut mem = bridge(MapSocket {
            force: Some(ResponseStatus::Incomplete),
            ..Default::default()
        });
        let mut host = Unassigned::default();
        let err = mem.write(&mut host, 0x100, 1, 4).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Protocol {
                status: ResponseStatus::Incomplete,
                ..
            }
        ));
    }
}
