// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use labwired_cosim::cosim::{InterruptInitiator, LoopbackKernel, LoopbackSocket, SharedRam};
use labwired_cosim::host::{AddressSpace, ExecutionLock};
use labwired_cosim::interrupt::DeliveryPump;
use labwired_cosim::signals::LevelLine;
use labwired_cosim::{Bridge, BridgeConfig, IrqLine};
use labwired_cosim_config::Platform;
use std::sync::Arc;

const REGS_BASE: u64 = 0x9000_0000;
const RAM_BASE: u64 = 0x1000;

fn setup() -> (Bridge<LoopbackSocket>, DeliveryPump, AddressSpace) {
    let mut kernel = LoopbackKernel::new().with_param("CPU.quantum", 1000u64);
    kernel.map_registers("regs", REGS_BASE, 0x1000).unwrap();
    kernel
        .map_shared_ram("mem0", RAM_BASE, SharedRam::anonymous(0x10000).unwrap())
        .unwrap();

    let socket = std::mem::take(&mut kernel.socket);
    let (mut bridge, pump) = Bridge::new(BridgeConfig::default(), socket, kernel.control.clone());
    let mut host = AddressSpace::new();
    bridge
        .on_kernel_init(&kernel.params, Platform::Generic)
        .unwrap();
    bridge.discover_dmi(&kernel.params, &mut host).unwrap();
    (bridge, pump, host)
}

fn bench_access_paths(c: &mut Criterion) {
    let (mut bridge, _pump, mut host) = setup();

    let mut group = c.benchmark_group("access_paths");
    group.bench_function("transaction_read_u32", |b| {
        b.iter(|| black_box(host.read(&mut bridge, black_box(REGS_BASE + 0x10), 4)))
    });
    group.bench_function("dmi_read_u32", |b| {
        b.iter(|| black_box(host.read(&mut bridge, black_box(RAM_BASE + 0x10), 4)))
    });
    group.bench_function("transaction_write_u32", |b| {
        b.iter(|| host.write(&mut bridge, black_box(REGS_BASE + 0x20), 0xA5A5_A5A5, 4))
    });
    group.bench_function("dmi_write_u32", |b| {
        b.iter(|| host.write(&mut bridge, black_box(RAM_BASE + 0x20), 0xA5A5_A5A5, 4))
    });
    group.finish();
}

fn bench_irq_delivery(c: &mut Criterion) {
    let (bridge, pump, _host) = setup();
    let line = Arc::new(LevelLine::new());
    bridge
        .export_irqs(vec![line as Arc<dyn IrqLine>])
        .unwrap();
    let initiator = InterruptInitiator::new(bridge.interrupt_socket());
    let lock = ExecutionLock::new();

    c.bench_function("irq_raise_and_pump", |b| {
        b.iter(|| {
            initiator.raise(0);
            initiator.lower(0);
            black_box(pump.pump(&lock))
        })
    });
}

criterion_group!(benches, bench_access_paths, bench_irq_delivery);
criterion_main!(benches);
