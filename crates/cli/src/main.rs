// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use socketbench_config::{BenchProfile, CoverageMode, FaultSpec};
use socketbench_core::patterns::{Coverage, PatternId, TestObserver, TestOutcome};
use socketbench_core::signal_map::{DeviceClass, SignalMap};
use socketbench_core::sim::SimulatedSocket;
use socketbench_core::{AddressSpace, Tester};

const EXIT_PASS: u8 = 0;
const EXIT_TEST_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "SocketBench Multi-IC Socket Tester",
    long_about = None
)]
struct Cli {
    /// Enable cycle-level debug tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pattern catalogue against the device in the (simulated) socket.
    Test(TestArgs),

    /// List the pattern catalogue.
    Patterns,

    /// Show the resolved signal map for a device class.
    Status(StatusArgs),
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Device class in the socket: z80, 6502 or sram
    #[arg(short, long)]
    device: Option<String>,

    /// Memory size ("8KiB", "32768"); required for memory devices
    #[arg(short, long)]
    size: Option<String>,

    /// Test every address instead of the sampled subset
    #[arg(long)]
    full: bool,

    /// Include test 7 (random pattern)
    #[arg(long)]
    include_random: bool,

    /// Bench profile / CI test plan (YAML)
    #[arg(short, long)]
    plan: Option<PathBuf>,

    /// Write a JSON result report
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct StatusArgs {
    /// Device class: z80, 6502 or sram
    #[arg(short, long)]
    device: String,
}

/// Machine-readable run summary written by `--report`.
#[derive(Debug, Serialize)]
struct BenchReport {
    result_schema_version: String,
    status: String,
    device: String,
    size_bytes: u32,
    coverage: Coverage,
    include_random: bool,
    failing_patterns: Vec<u8>,
    outcomes: Vec<TestOutcome>,
}

/// Renders engine callbacks as log lines; the run itself blocks until the
/// whole catalogue is done.
struct ConsoleProgress;

impl TestObserver for ConsoleProgress {
    fn on_progress(&self, pattern: PatternId, done: u32, total: u32) {
        info!(test = pattern.number(), "{}/{} addresses", done, total);
    }

    fn on_outcome(&self, outcome: &TestOutcome) {
        if outcome.pass {
            info!(
                test = outcome.pattern.number(),
                name = outcome.pattern.name(),
                addresses = outcome.addresses_tested,
                "PASS"
            );
        } else {
            warn!(
                test = outcome.pattern.number(),
                name = outcome.pattern.name(),
                "FAIL"
            );
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

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
        Commands::Test(args) => run_test(args),
        Commands::Patterns => run_patterns(),
        Commands::Status(args) => run_status(args),
    }
}

/// Merge `--plan` with command-line overrides into a validated profile.
fn resolve_profile(args: &TestArgs) -> anyhow::Result<BenchProfile> {
    let mut profile = match &args.plan {
        Some(path) => BenchProfile::from_file(path)?,
        None => {
            let device = args
                .device
                .clone()
                .context("either --plan or --device is required")?;
            BenchProfile {
                schema_version: "1.0".to_string(),
                device,
                size: args.size.clone(),
                coverage: CoverageMode::Quick,
                include_random: false,
                faults: Vec::new(),
                expect: None,
            }
        }
    };

    if let Some(device) = &args.device {
        profile.device = device.clone();
    }
    if let Some(size) = &args.size {
        profile.size = Some(size.clone());
    }
    if args.full {
        profile.coverage = CoverageMode::Full;
    }
    if args.include_random {
        profile.include_random = true;
    }
    profile.validate()?;
    Ok(profile)
}

fn run_test(args: TestArgs) -> ExitCode {
    let profile = match resolve_profile(&args) {
        Ok(p) => p,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let class = match profile.device.parse::<DeviceClass>() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    if class != DeviceClass::Memory {
        error!(
            "pattern tests need a memory device in the socket, not {}; \
             use `status` to inspect CPU signal maps",
            class.name()
        );
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let size = match profile.size_bytes() {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            error!("memory profiles need a size");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let space = match AddressSpace::new(size) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut socket = SimulatedSocket::new(size);
    for fault in &profile.faults {
        match *fault {
            FaultSpec::StuckAddress { bit, high } => socket.stuck_address_line(bit, high),
            FaultSpec::StuckData { bit, high } => socket.stuck_data_line(bit, high),
            FaultSpec::BridgedAddress { bits } => socket.bridge_address_lines(bits[0], bits[1]),
        }
    }
    if !profile.faults.is_empty() {
        info!(count = profile.faults.len(), "injected simulated faults");
    }

    let coverage = match profile.coverage {
        CoverageMode::Quick => Coverage::Sampled,
        CoverageMode::Full => Coverage::Exhaustive,
    };
    info!(
        device = class.name(),
        size,
        ?coverage,
        include_random = profile.include_random,
        "starting bench run"
    );

    let mut tester = Tester::new(Box::new(socket));
    let mut session = match tester.select_device(class, Some(space)) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };
    session.add_observer(Arc::new(ConsoleProgress));

    let outcomes = match session.run_catalogue(profile.include_random, coverage) {
        Ok(o) => o,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };
    tester.close_session(session);

    let failing: Vec<u8> = outcomes
        .iter()
        .filter(|o| !o.pass)
        .map(|o| o.pattern.number())
        .collect();

    let status = match &profile.expect {
        Some(expect) => {
            let mut want = expect.failing_patterns.clone();
            want.sort_unstable();
            want.dedup();
            if failing == want {
                info!(?failing, "failures match the plan expectation");
                "pass"
            } else {
                error!(?failing, expected = ?want, "failures differ from the plan expectation");
                "fail"
            }
        }
        None if failing.is_empty() => "pass",
        None => {
            error!(?failing, "device failed");
            "fail"
        }
    };
    info!(status, "bench run finished");

    if let Some(path) = &args.report {
        let report = BenchReport {
            result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
            status: status.to_string(),
            device: profile.device.clone(),
            size_bytes: size,
            coverage,
            include_random: profile.include_random,
            failing_patterns: failing,
            outcomes,
        };
        write_report(path, &report);
    }

    if status == "pass" {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_TEST_FAIL)
    }
}

fn write_report(path: &PathBuf, report: &BenchReport) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create report parent dir {:?}: {}", parent, e);
            return;
        }
    }
    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, report) {
                error!("Failed to write report {:?}: {}", path, e);
            }
        }
        Err(e) => error!("Failed to create report {:?}: {}", path, e),
    }
}

fn run_patterns() -> ExitCode {
    for pattern in PatternId::ALL {
        println!("{}. {}", pattern.number(), pattern.name());
    }
    ExitCode::from(EXIT_PASS)
}

fn run_status(args: StatusArgs) -> ExitCode {
    let class = match args.device.parse::<DeviceClass>() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let map = SignalMap::for_class(class);
    println!("signal map for {}:", class.name());
    for b in map.bindings() {
        println!(
            "  {:<8} {:<18} {:<13} {:?}",
            b.line.to_string(),
            format!("{:?}", b.role),
            format!("{:?}", b.direction),
            b.active_level
        );
    }
    ExitCode::from(EXIT_PASS)
}
