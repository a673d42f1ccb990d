// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod args;
pub mod bridge;
pub mod config;
pub mod cosim;
pub mod dmi;
pub mod host;
pub mod interrupt;
pub mod irq_stub;
pub mod memory;
pub mod metrics;
pub mod payload;
pub mod quantum;
pub mod signals;
pub mod snapshot;


pub use bridge::{Bridge, LifecycleState};
pub use config::BridgeConfig;
pub use dmi::{DmiGrant, DmiPointer, DmiRegion};
pub use payload::{Command, Payload, ResponseStatus};
pub use signals::DigitalLevel;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("unexpected response {status:?} to {command:?} at {addr:#x}")]
    Protocol {
        addr: u64,
        command: Command,
        status: ResponseStatus,
    },
    #[error("bad quantum: the synchronization quantum must be a positive number of nanoseconds")]
    BadQuantum,
    #[error("missing parameter {0}")]
    MissingParam(String),
    #[error("irq already exported")]
    IrqAlreadyExported,
    #[error("irq transaction received before any irq was exported")]
    IrqNotExported,
    #[error("cannot export an empty irq set")]
    EmptyIrqExport,
    #[error("no dmi region has been discovered")]
    NoDmiRegion,
    #[error("region {name}: high address {high:#x} is below base address {base:#x}")]
    InvalidRegion { name: String, base: u64, high: u64 },
    #[error("{name}: {size:#x} bytes at {base:#x} run past the end of the address space")]
    AddressOverflow { name: String, base: u64, size: u64 },
    #[error("region {0} overlaps an installed region")]
    RegionOverlap(String),
    #[error("{op} is not allowed while the bridge is {state:?}")]
    Lifecycle {
        op: &'static str,
        state: LifecycleState,
    },
    #[error("target fault at offset {0:#x}")]
    TargetFault(u64),
    #[error("snapshot version {0} is not supported")]
    SnapshotVersion(u32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Terminate the process after an unrecoverable bridge error.
///
/// Once the two kernels disagree on protocol, configuration or wiring there is
/// no state worth continuing from, so this never unwinds.
pub fn fatal(err: &BridgeError) -> ! {
    tracing::error!("{}", err);
    eprintln!("error: {}", err);
    std::process::abort()
}

/// Trait representing the co-simulation kernel's outbound memory socket.
pub trait MemorySocket: Send {
    /// Blocking transport. The kernel must leave a response status in `payload`.
    fn b_transport(&mut self, payload: &mut Payload);

    /// Ask for a direct pointer covering `payload.address`.
    fn get_direct_mem_ptr(&mut self, payload: &mut Payload) -> Option<DmiGrant>;
}

/// Trait representing the co-simulation kernel's exported parameter space.
pub trait ParamSpace {
    fn param_names(&self) -> Vec<String>;
    fn uint_param(&self, name: &str) -> Option<u64>;
    fn string_param(&self, name: &str) -> Option<String>;
}

/// One-way notifications towards the co-simulation kernel.
pub trait KernelControl: std::fmt::Debug + Send + Sync {
    /// The host has executed one more quantum of virtual time.
    fn end_of_quantum(&self);
    /// The host wants the whole session to stop.
    fn request_stop(&self);
}

/// A host interrupt line exported to the bridge.
pub trait IrqLine: std::fmt::Debug + Send + Sync {
    fn set_level(&self, level: DigitalLevel);
}

/// The host's handler for accesses nothing in the address map claims.
pub trait UnassignedAccess {
    fn unassigned_read(&mut self, addr: u64, size: u32) -> u64;
    fn unassigned_write(&mut self, addr: u64, value: u64, size: u32);
}

/// Installs DMI regions into the host address space as plain RAM.
pub trait RamMapper {
    fn map_ram(&mut self, region: &DmiRegion) -> BridgeResult<()>;
}

/// Read/write callbacks for the host region that falls through to the bridge.
///
/// The signatures are infallible because the host has no way to report an
/// error to the guest CPU; implementations terminate on fatal errors.
pub trait MmioHandler {
    fn mmio_read(&mut self, host: &mut dyn UnassignedAccess, addr: u64, size: u32) -> u64;
    fn mmio_write(&mut self, host: &mut dyn UnassignedAccess, addr: u64, value: u64, size: u32);
}
