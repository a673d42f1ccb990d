// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::info;

use labwired_cosim::args::ArgumentVector;
use labwired_cosim::cosim::{InterruptInitiator, LoopbackKernel, ParamTable};
use labwired_cosim::host::{AddressSpace, ExecutionLock, VirtualClock};
use labwired_cosim::metrics::MetricsReport;
use labwired_cosim::quantum::VirtualTimer;
use labwired_cosim::signals::LevelLine;
use labwired_cosim::{Bridge, BridgeConfig, DigitalLevel, IrqLine, LifecycleState};
use labwired_cosim_config::{Platform, SessionManifest, TargetKind};

const EXIT_PASS: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

fn parse_u64_addr(s: &str) -> Result<u64, String> {
    labwired_cosim_config::parse_uint(s).ok_or_else(|| format!("Invalid address '{}'", s))
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    s.parse::<Platform>().map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "LabWired co-simulation bridge",
    long_about = None
)]
struct Cli {
    /// Enable per-transaction tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring a loopback session up and run it for a number of quanta.
    Run(RunArgs),

    /// Print the host command line a session would be started with.
    Args(ArgsArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the session manifest (YAML or JSON)
    #[arg(short, long)]
    manifest: PathBuf,

    /// Number of quantum boundaries to run past the initial one
    #[arg(long, default_value = "10")]
    quanta: u64,

    /// Virtual time advanced per host step, in ns (default: one quantum)
    #[arg(long)]
    quantum_step: Option<u64>,

    /// Address read through the host address space after every quantum (repeatable)
    #[arg(long, value_parser = parse_u64_addr)]
    probe: Vec<u64>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct ArgsArgs {
    /// Path to the session manifest (YAML or JSON)
    #[arg(short, long)]
    manifest: PathBuf,

    /// Override the manifest's platform profile (generic, aarch64)
    #[arg(long, value_parser = parse_platform)]
    platform: Option<Platform>,

    /// Print the argument vector as a JSON array
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RegionReport {
    name: String,
    base: u64,
    size: u64,
}

#[derive(Debug, Serialize)]
struct RunReport {
    schema_version: &'static str,
    status: &'static str,
    session: String,
    platform: Platform,
    argv: ArgumentVector,
    lifecycle: LifecycleState,
    quantum_ns: u64,
    virtual_time_ns: u64,
    kernel_quanta: u64,
    regions: Vec<RegionReport>,
    irq_lines_high: usize,
    probes: Vec<(u64, u64)>,
    metrics: MetricsReport,
    wall_time_secs: f64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Args(args) => print_args(args),
    }
}

fn load(path: &Path) -> Result<SessionManifest, ExitCode> {
    SessionManifest::from_file(path).map_err(|e| {
        tracing::error!("{:#}", e);
        ExitCode::from(EXIT_CONFIG_ERROR)
    })
}

fn print_args(args: ArgsArgs) -> ExitCode {
    let manifest = match load(&args.manifest) {
        Ok(m) => m,
        Err(code) => return code,
    };

    let params = ParamTable::from(manifest.params.clone());
    let mut argv = ArgumentVector::new();
    argv.add_platform_arguments(args.platform.unwrap_or(manifest.platform), &params);

    if args.json {
        match serde_json::to_string(&argv) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        }
    } else {
        println!("{}", argv);
    }
    ExitCode::from(EXIT_PASS)
}

fn run(args: RunArgs) -> ExitCode {
    let manifest = match load(&args.manifest) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let kernel = match LoopbackKernel::from_manifest(&manifest) {
        Ok(k) => k,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    info!("Starting co-simulation session '{}'", manifest.name);
    let report = match run_session(&args, &manifest, kernel) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    if args.json {
        match serde_json::to_string(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        }
    } else {
        info!(
            "Session finished: {} quanta, {} ns virtual time, {} transactions, {} irqs delivered",
            report.kernel_quanta,
            report.virtual_time_ns,
            report.metrics.transactions,
            report.metrics.irq_delivered
        );
        for (addr, value) in &report.probes {
            info!("probe {:#x} = {:#x}", addr, value);
        }
    }
    ExitCode::from(EXIT_PASS)
}

fn run_session(
    args: &RunArgs,
    manifest: &SessionManifest,
    mut kernel: LoopbackKernel,
) -> anyhow::Result<RunReport> {
    let socket = std::mem::take(&mut kernel.socket);
    let control = kernel.control.clone();
    let (mut bridge, pump) = Bridge::new(
        BridgeConfig::from(&manifest.bridge),
        socket,
        control.clone(),
    );

    let lines: Vec<Arc<LevelLine>> = (0..manifest.irq_lines)
        .map(|_| Arc::new(LevelLine::new()))
        .collect();
    bridge.export_irqs(
        lines
            .iter()
            .map(|l| l.clone() as Arc<dyn IrqLine>)
            .collect(),
    )?;

    let argv = bridge
        .on_kernel_init(&kernel.params, manifest.platform)?
        .clone();
    let mut host = AddressSpace::new();
    bridge
        .discover_dmi(&kernel.params, &mut host)
        .context("DMI discovery failed")?;

    let clock = Arc::new(VirtualClock::new());
    let mut timer = bridge.start_quantum_timer(clock.clone())?;
    let quantum_ns = timer.quantum().as_ns();
    let step = args.quantum_step.unwrap_or(quantum_ns);
    if step == 0 {
        bail!("--quantum-step must be positive");
    }

    // The kernel side raises one interrupt per quantum on its own thread.
    let (quantum_tx, quantum_rx) = mpsc::channel::<u64>();
    let (ack_tx, ack_rx) = mpsc::channel::<()>();
    let initiator = InterruptInitiator::new(bridge.interrupt_socket());
    let irq_lines = manifest.irq_lines as u64;
    let kernel_thread = std::thread::spawn(move || {
        for q in quantum_rx {
            let line = (q - 1) % irq_lines;
            let level = DigitalLevel::from((q - 1) / irq_lines % 2 == 0);
            let status = initiator.set(line as usize, level);
            if !status.is_ok() {
                tracing::warn!("irq {} -> {:?} answered {:?}", line, level, status);
            }
            if ack_tx.send(()).is_err() {
                break;
            }
        }
    });

    let lock = ExecutionLock::new();
    let mut probes = Vec::new();
    let mut ended = 0;
    while ended < args.quanta {
        if !clock.advance(step) {
            continue;
        }
        timer.expired();
        ended += 1;

        quantum_tx.send(ended).context("kernel thread exited")?;
        ack_rx.recv().context("kernel thread exited")?;
        pump.pump(&lock);

        exercise_targets(manifest, &mut host, &mut bridge, ended)?;
        for &addr in &args.probe {
            probes.push((addr, host.read(&mut bridge, addr, 4)));
        }
    }

    bridge.request_exit();
    drop(quantum_tx);
    if kernel_thread.join().is_err() {
        bail!("kernel thread panicked");
    }

    Ok(RunReport {
        schema_version: RESULT_SCHEMA_VERSION,
        status: "finished",
        session: manifest.name.clone(),
        platform: manifest.platform,
        argv,
        lifecycle: bridge.state(),
        quantum_ns,
        virtual_time_ns: clock.now_ns(),
        kernel_quanta: control.quanta(),
        regions: bridge
            .regions()
            .iter()
            .map(|r| RegionReport {
                name: r.name.clone(),
                base: r.base,
                size: r.size(),
            })
            .collect(),
        irq_lines_high: lines.iter().filter(|l| l.is_high()).count(),
        probes,
        metrics: bridge.metrics().report(),
        wall_time_secs: bridge.metrics().elapsed_secs(),
    })
}

/// Write the quantum number to the first word of every target and read it back.
fn exercise_targets<S: labwired_cosim::MemorySocket>(
    manifest: &SessionManifest,
    host: &mut AddressSpace,
    bridge: &mut Bridge<S>,
    quantum: u64,
) -> anyhow::Result<()> {
    for t in &manifest.targets {
        host.write(&mut *bridge, t.base_address, quantum, 4);
        let back = host.read(&mut *bridge, t.base_address, 4);
        if back != quantum & 0xFFFF_FFFF {
            bail!(
                "{} target '{}' read back {:#x}, expected {:#x}",
                match t.r#type {
                    TargetKind::Registers => "register",
                    TargetKind::Ram => "ram",
                },
                t.id,
                back,
                quantum
            );
        }
    }
    Ok(())
}
