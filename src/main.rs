//! Paging Simulator - Main Entry Point
//!
//! Usage: paging-sim [OPTIONS] [WORKLOAD]
//!
//! Arguments:
//!   WORKLOAD - Optional file listing processes to admit, one per line
//!              (`memory_size can_block [remaining_ms] [priority]`)
//!
//! Without a workload file, `--processes` random processes are created.
//! The simulation runs until every process has terminated or the tick
//! budget is spent, then prints a summary.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use log::{LevelFilter, Metadata, Record, error, info};

use paging_sim::constants::{DEFAULT_NUM_FRAMES, DEFAULT_PAGE_SIZE, DEFAULT_QUANTUM_MS};
use paging_sim::io::{Workload, render_report, write_report};
use paging_sim::{Simulator, SimulatorConfig};

/// Command-line configuration
struct Config {
    workload: Option<PathBuf>,
    output: Option<PathBuf>,
    frames: usize,
    page_size: usize,
    quantum: u64,
    ticks: u64,
    processes: usize,
    seed: Option<u64>,
    level: LevelFilter,
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(level: LevelFilter) -> anyhow::Result<()> {
    log::set_logger(&LOGGER).map_err(|e| anyhow!("cannot install logger: {}", e))?;
    log::set_max_level(level);
    Ok(())
}

fn main() {
    let config = parse_args(cli().get_matches());

    if let Err(e) = init_logging(config.level) {
        eprintln!("{:#}", e);
    }

    // Run the simulation and handle any errors
    if let Err(e) = run(&config) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("paging-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Demand-paging and process-scheduling simulator")
        .arg(
            Arg::new("workload")
                .value_name("WORKLOAD")
                .value_parser(value_parser!(PathBuf))
                .help("Process list to admit; random processes are created when omitted"),
        )
        .arg(
            Arg::new("frames")
                .long("frames")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Number of RAM frames"),
        )
        .arg(
            Arg::new("page-size")
                .long("page-size")
                .value_name("BYTES")
                .value_parser(value_parser!(usize))
                .help("Page and frame size in bytes"),
        )
        .arg(
            Arg::new("quantum")
                .long("quantum")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Time slice in milliseconds, 0 disables preemption by quantum"),
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .value_name("N")
                .value_parser(value_parser!(u64))
                .default_value("200")
                .help("Maximum number of scheduler ticks"),
        )
        .arg(
            Arg::new("processes")
                .long("processes")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("4")
                .help("Random processes to create when no workload is given"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(value_parser!(u64))
                .help("Seed for a reproducible run"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Also write the report to FILE"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Log paging events (-v) and clock decisions (-vv)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .help("Only log warnings and errors"),
        )
}

fn parse_args(matches: ArgMatches) -> Config {
    let level = if matches.get_flag("quiet") {
        LevelFilter::Warn
    } else {
        match matches.get_count("verbose") {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Config {
        workload: matches.get_one::<PathBuf>("workload").cloned(),
        output: matches.get_one::<PathBuf>("output").cloned(),
        frames: matches.get_one::<usize>("frames").copied().unwrap_or(DEFAULT_NUM_FRAMES),
        page_size: matches.get_one::<usize>("page-size").copied().unwrap_or(DEFAULT_PAGE_SIZE),
        quantum: matches.get_one::<u64>("quantum").copied().unwrap_or(DEFAULT_QUANTUM_MS),
        ticks: matches.get_one::<u64>("ticks").copied().unwrap_or(200),
        processes: matches.get_one::<usize>("processes").copied().unwrap_or(4),
        seed: matches.get_one::<u64>("seed").copied(),
        level,
    }
}

/// Main logic separated from main() for cleaner error handling
fn run(config: &Config) -> anyhow::Result<()> {
    let workload = match &config.workload {
        Some(path) => Some(
            Workload::from_file(path)
                .with_context(|| format!("failed to load workload {}", path.display()))?,
        ),
        None => None,
    };

    let admitted = workload
        .as_ref()
        .map_or(config.processes, |w| w.processes.len());
    let mut sim = Simulator::new();
    sim.initialize(SimulatorConfig {
        ram_frames: config.frames,
        page_size: config.page_size,
        quantum: config.quantum,
        max_processes: admitted,
        seed: config.seed,
        ..SimulatorConfig::default()
    })?;

    match &workload {
        Some(workload) => {
            workload.admit_all(&mut sim).context("failed to admit workload")?;
        }
        None => {
            for i in 0..config.processes {
                sim.add_process(i % 2 == 1, None)?;
            }
        }
    }
    info!("admitted {} processes", admitted);

    sim.start()?;
    let ran = sim.run_for(config.ticks)?;
    if !sim.is_finished() {
        info!("tick budget of {} exhausted with processes still active", ran);
    }

    let report = render_report(&sim)?;
    print!("{}", report);

    if let Some(path) = &config.output {
        write_report(path, &sim)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    Ok(())
}
