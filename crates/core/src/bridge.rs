// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The bridge context object.
//!
//! One `Bridge` per co-simulation session. It owns the memory path, holds the
//! interrupt socket and walks through an explicit lifecycle:
//!
//! ```text
//! Elaborated --on_kernel_init--> Configured --start_quantum_timer--> Running
//!      \__________________________\______________________request_exit--> Stopping
//! ```

use crate::args::ArgumentVector;
use crate::config::{params, BridgeConfig};
use crate::dmi::{self, DmiRegion};
use crate::interrupt::{DeliveryPump, InterruptBridge};
use crate::memory::MemoryBridge;
use crate::metrics::BridgeMetrics;
use crate::quantum::{Quantum, QuantumTimer, VirtualTimer};
use crate::{
    BridgeError, BridgeResult, IrqLine, KernelControl, MemorySocket, MmioHandler, ParamSpace,
    RamMapper, UnassignedAccess,
};
use labwired_cosim_config::Platform;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    /// Sockets exist; nothing has been read from the kernel yet.
    Elaborated,
    /// Quantum known, argument vector frozen.
    Configured,
    /// The quantum timer is armed.
    Running,
    /// Exit requested; the session is winding down.
    Stopping,
}

/// Session-wide flags read from several threads.
#[derive(Debug, Default)]
pub struct SessionFlags {
    initialized: AtomicBool,
    exit_requested: AtomicBool,
}

impl SessionFlags {
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Returns false if exit had already been requested.
    fn request_exit(&self) -> bool {
        !self.exit_requested.swap(true, Ordering::AcqRel)
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::Acquire)
    }
}

pub struct Bridge<S> {
    config: BridgeConfig,
    state: LifecycleState,
    memory: MemoryBridge<S>,
    irq: Arc<InterruptBridge>,
    kernel: Arc<dyn KernelControl>,
    flags: Arc<SessionFlags>,
    quantum: Option<Quantum>,
    args: ArgumentVector,
    regions: Vec<DmiRegion>,
    metrics: Arc<BridgeMetrics>,
}

impl<S: MemorySocket> Bridge<S> {
    /// Elaborate the bridge around the kernel's memory socket.
    ///
    /// The returned pump belongs to the host's CPU thread; interrupt
    /// deliveries only happen when it is drained.
    pub fn new(
        config: BridgeConfig,
        socket: S,
        kernel: Arc<dyn KernelControl>,
    ) -> (Self, DeliveryPump) {
        let metrics = Arc::new(BridgeMetrics::new());
        let (irq, pump) = InterruptBridge::new(config.irq_pool_capacity, metrics.clone());
        let bridge = Self {
            memory: MemoryBridge::new(socket, metrics.clone()),
            config,
            state: LifecycleState::Elaborated,
            irq,
            kernel,
            flags: Arc::new(SessionFlags::default()),
            quantum: None,
            args: ArgumentVector::new(),
            regions: Vec::new(),
            metrics,
        };
        tracing::debug!("bridge elaborated ({:?})", bridge.config);
        (bridge, pump)
    }

    fn expect_state(&self, op: &'static str, allowed: &[LifecycleState]) -> BridgeResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(BridgeError::Lifecycle {
                op,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, to: LifecycleState) {
        tracing::info!("bridge {:?} -> {:?}", self.state, to);
        self.state = to;
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Arguments pushed here come before the platform profile.
    pub fn args_mut(&mut self) -> BridgeResult<&mut ArgumentVector> {
        self.expect_state("args_mut", &[LifecycleState::Elaborated])?;
        Ok(&mut self.args)
    }

    pub fn args(&self) -> &ArgumentVector {
        &self.args
    }

    /// Export the host's interrupt lines to the interrupt socket. Once only.
    pub fn export_irqs(&self, lines: Vec<Arc<dyn IrqLine>>) -> BridgeResult<()> {
        self.expect_state(
            "export_irqs",
            &[LifecycleState::Elaborated, LifecycleState::Configured],
        )?;
        self.irq.export_irqs(lines)
    }

    /// The target side the kernel's interrupt initiator binds to.
    pub fn interrupt_socket(&self) -> Arc<InterruptBridge> {
        self.irq.clone()
    }

    /// The kernel's init hook: read the quantum and assemble the host command
    /// line for `platform`.
    pub fn on_kernel_init(
        &mut self,
        params: &dyn ParamSpace,
        platform: Platform,
    ) -> BridgeResult<&ArgumentVector> {
        self.expect_state("on_kernel_init", &[LifecycleState::Elaborated])?;

        let ns = params
            .uint_param(params::QUANTUM)
            .ok_or_else(|| BridgeError::MissingParam(params::QUANTUM.to_string()))?;
        let quantum = Quantum::from_ns(ns)?;
        self.quantum = Some(quantum);
        tracing::info!("synchronization quantum {} ns", quantum.as_ns());

        self.args.add_platform_arguments(platform, params);
        self.args.print();

        self.transition(LifecycleState::Configured);
        Ok(&self.args)
    }

    /// Map every DMI region the kernel advertises into `mapper`.
    pub fn discover_dmi(
        &mut self,
        params: &dyn ParamSpace,
        mapper: &mut dyn RamMapper,
    ) -> BridgeResult<&[DmiRegion]> {
        self.expect_state("discover_dmi", &[LifecycleState::Configured])?;

        let regions = dmi::discover(&mut self.memory, params, mapper)?;
        if regions.is_empty() && self.config.require_dmi {
            return Err(BridgeError::NoDmiRegion);
        }
        self.regions.extend(regions);
        Ok(&self.regions)
    }

    /// Arm the quantum timer. It fires once immediately, which marks the
    /// session initialized.
    pub fn start_quantum_timer(
        &mut self,
        timer: Arc<dyn VirtualTimer>,
    ) -> BridgeResult<QuantumTimer> {
        self.expect_state("start_quantum_timer", &[LifecycleState::Configured])?;
        let quantum = self.quantum.ok_or(BridgeError::BadQuantum)?;

        self.transition(LifecycleState::Running);
        Ok(QuantumTimer::start(
            quantum,
            timer,
            self.kernel.clone(),
            self.flags.clone(),
            self.metrics.clone(),
        ))
    }

    /// Ask the whole session to stop. Later calls are ignored.
    pub fn request_exit(&mut self) {
        if !self.flags.request_exit() {
            return;
        }
        tracing::info!("exit requested");
        self.kernel.request_stop();
        self.transition(LifecycleState::Stopping);
    }

    pub fn read(
        &mut self,
        host: &mut dyn UnassignedAccess,
        addr: u64,
        size: u32,
    ) -> BridgeResult<u64> {
        self.memory.read(host, addr, size)
    }

    pub fn write(
        &mut self,
        host: &mut dyn UnassignedAccess,
        addr: u64,
        value: u64,
        size: u32,
    ) -> BridgeResult<()> {
        self.memory.write(host, addr, value, size)
    }

    pub fn is_initialized(&self) -> bool {
        self.flags.is_initialized()
    }

    pub fn exit_requested(&self) -> bool {
        self.flags.exit_requested()
    }

    pub fn flags(&self) -> &Arc<SessionFlags> {
        &self.flags
    }

    pub fn quantum(&self) -> Option<Quantum> {
        self.quantum
    }

    pub fn regions(&self) -> &[DmiRegion] {
        &self.regions
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    pub fn memory(&self) -> &MemoryBridge<S> {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryBridge<S> {
        &mut self.memory
    }
}

impl<S: MemorySocket> MmioHandler for Bridge<S> {
    fn mmio_read(&mut self, host: &mut dyn UnassignedAccess, addr: u64, size: u32) -> u64 {
        match self.read(host, addr, size) {
            Ok(value) => value,
            Err(e) => crate::fatal(&e),
        }
    }

    fn mmio_write(&mut self, host: &mut dyn UnassignedAccess, addr: u64, value: u64, size: u32) {
        if let Err(e) = self.write(host, addr, value, size) {
            crate::fatal(&e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosim::{LoopbackKernel, LoopbackSocket, SharedRam};
    use crate::host::{AddressSpace, VirtualClock};
    use crate::signals::LevelLine;

    fn loopback() -> (Bridge<LoopbackSocket>, DeliveryPump, LoopbackKernel) {
        let mut kernel = LoopbackKernel::new().with_param("CPU.quantum", 1000u64);
        kernel
            .map_shared_ram("mem0", 0x1000, SharedRam::anonymous(0x1000).unwrap())
            .unwrap();
        let socket = std::mem::take(&mut kernel.socket);
        let (bridge, pump) = Bridge::new(BridgeConfig::default(), socket, kernel.control.clone());
        (bridge, pump, kernel)
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let (mut bridge, _pump, kernel) = loopback();
        assert_eq!(bridge.state(), LifecycleState::Elaborated);

        bridge.on_kernel_init(&kernel.params, Platform::Generic).unwrap();
        assert_eq!(bridge.state(), LifecycleState::Configured);
        assert_eq!(bridge.quantum().map(Quantum::as_ns), Some(1000));

        let mut host = AddressSpace::new();
        assert_eq!(bridge.discover_dmi(&kernel.params, &mut host).unwrap().len(), 1);

        assert!(!bridge.is_initialized());
        let clock = Arc::new(VirtualClock::new());
        let timer = bridge.start_quantum_timer(clock.clone()).unwrap();
        assert_eq!(bridge.state(), LifecycleState::Running);
        assert!(bridge.is_initialized());
        assert_eq!(kernel.control.quanta(), 1);
        assert_eq!(clock.deadline_ns(), Some(1000));

        drop(timer);
        assert_eq!(clock.deadline_ns(), None);
    }

    #[test]
    fn test_missing_or_zero_quantum() {
        let (mut bridge, _pump, _kernel) = loopback();
        let empty = crate::cosim::ParamTable::new();
        assert!(matches!(
            bridge.on_kernel_init(&empty, Platform::Generic),
            Err(BridgeError::MissingParam(p)) if p == "CPU.quantum"
        ));

        let zero = LoopbackKernel::new().with_param("CPU.quantum", 0u64);
        assert!(matches!(
            bridge.on_kernel_init(&zero.params, Platform::Generic),
            Err(BridgeError::BadQuantum)
        ));
        assert_eq!(bridge.state(), LifecycleState::Elaborated);
    }

    #[test]
    fn test_out_of_order_operations() {
        let (mut bridge, _pump, kernel) = loopback();
        let mut host = AddressSpace::new();
        assert!(matches!(
            bridge.discover_dmi(&kernel.params, &mut host),
            Err(BridgeError::Lifecycle { op: "discover_dmi", state: LifecycleState::Elaborated })
        ));
        assert!(bridge
            .start_quantum_timer(Arc::new(VirtualClock::new()))
            .is_err());

        bridge.on_kernel_init(&kernel.params, Platform::Aarch64).unwrap();
        assert!(bridge.args_mut().is_err());
        assert!(bridge.on_kernel_init(&kernel.params, Platform::Aarch64).is_err());
    }

    #[test]
    fn test_no_dmi_region_is_an_error_when_required() {
        let kernel = LoopbackKernel::new().with_param("CPU.quantum", 10u64);
        let control = kernel.control.clone();
        let (mut bridge, _pump) = Bridge::new(BridgeConfig::default(), kernel.socket, control);
        bridge.on_kernel_init(&kernel.params, Platform::Generic).unwrap();
        let mut host = AddressSpace::new();
        assert!(matches!(
            bridge.discover_dmi(&kernel.params, &mut host),
            Err(BridgeError::NoDmiRegion)
        ));
    }

    #[test]
    fn test_no_dmi_region_tolerated_when_optional() {
        let kernel = LoopbackKernel::new().with_param("CPU.quantum", 10u64);
        let control = kernel.control.clone();
        let config = BridgeConfig {
            require_dmi: false,
            ..BridgeConfig::default()
        };
        let (mut bridge, _pump) = Bridge::new(config, kernel.socket, control);
        bridge.on_kernel_init(&kernel.params, Platform::Generic).unwrap();
        let mut host = AddressSpace::new();
        assert!(bridge.discover_dmi(&kernel.params, &mut host).unwrap().is_empty());
    }

    #[test]
    fn test_args_assembled_at_init() {
        let (mut bridge, _pump, mut kernel) = loopback();
        kernel.params.insert("CPU.kernel", "Image");
        bridge.args_mut().unwrap().push("-d");

        let argv = bridge
            .on_kernel_init(&kernel.params, Platform::Generic)
            .unwrap();
        assert_eq!(argv.as_slice()[0], "-d");
        assert_eq!(argv.as_slice()[1], "./toplevel");
        assert!(argv.to_string().ends_with("--kernel Image"));
    }

    #[test]
    fn test_request_exit_once() {
        let (mut bridge, _pump, kernel) = loopback();
        bridge.request_exit();
        bridge.request_exit();
        assert!(bridge.exit_requested());
        assert!(kernel.control.stop_requested());
        assert_eq!(bridge.state(), LifecycleState::Stopping);
    }

    #[test]
    fn test_export_irqs_through_bridge() {
        let (bridge, _pump, _kernel) = loopback();
        let line: Arc<dyn IrqLine> = Arc::new(LevelLine::new());
        bridge.export_irqs(vec![line.clone()]).unwrap();
        assert!(matches!(
            bridge.export_irqs(vec![line]),
            Err(BridgeError::IrqAlreadyExported)
        ));
        assert_eq!(bridge.interrupt_socket().exported_lines(), 1);
    }
}
