use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::Pid;
use crate::constants::*;
use crate::error::{Result, SimError};
use crate::memory::{Disk, Ram};
use crate::mmu::Mmu;
use crate::process::{Process, ProcessSpec, ProcessState};
use crate::processor::{Processor, SchedulingPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub ram_frames: usize,
    pub page_size: usize,
    /// Milliseconds a process may run before it is preempted; 0 disables it.
    pub quantum: u64,
    pub max_processes: usize,
    pub auto_scheduling: bool,
    pub policy: SchedulingPolicy,
    pub event_history_limit: usize,
    /// Seed for every random decision; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            ram_frames: DEFAULT_NUM_FRAMES,
            page_size: DEFAULT_PAGE_SIZE,
            quantum: DEFAULT_QUANTUM_MS,
            max_processes: DEFAULT_MAX_PROCESSES,
            auto_scheduling: false,
            policy: SchedulingPolicy::default(),
            event_history_limit: MAX_EVENT_HISTORY,
            seed: None,
        }
    }
}

/// Point-in-time summary for dashboards and reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub total_processes: usize,
    pub active_processes: usize,
    pub terminated_processes: usize,
    pub page_faults: u64,
    pub page_hits: u64,
    pub swap_count: u64,
    pub hit_ratio: f64,
    /// Occupied fraction of RAM, in `[0, 1]`.
    pub ram_usage: f64,
    pub pages_on_disk: usize,
    pub cpu_busy: bool,
    /// Terminated processes per elapsed tick.
    pub throughput: f64,
}

/// Driver around a [`Processor`]: initialize, add processes, start, pause,
/// step and reset.
pub struct Simulator {
    config: SimulatorConfig,
    processor: Option<Processor>,
    ticks: u64,
    running: bool,
    rng: StdRng,
}

impl Simulator {
    /// An uninitialized simulator; call [`Simulator::initialize`] first.
    pub fn new() -> Self {
        Simulator {
            config: SimulatorConfig::default(),
            processor: None,
            ticks: 0,
            running: false,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Build fresh RAM, disk and processor from `config`, discarding any
    /// previous run.
    pub fn initialize(&mut self, config: SimulatorConfig) -> Result<()> {
        if config.ram_frames == 0 {
            return Err(SimError::InvalidConfig("RAM needs at least one frame".to_string()));
        }
        if config.page_size == 0 {
            return Err(SimError::InvalidConfig("page size must be positive".to_string()));
        }

        self.rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        // the scheduler gets its own stream so process generation does not
        // shift its decisions
        let scheduler_rng = StdRng::from_rng(&mut self.rng);

        let mmu = Mmu::with_event_limit(
            Ram::new(config.ram_frames, config.page_size),
            Disk::new(),
            config.event_history_limit,
        );
        let mut processor = Processor::with_mmu(config.quantum, mmu)
            .with_policy(config.policy)
            .with_rng(scheduler_rng);
        processor.set_auto_scheduling(config.auto_scheduling)?;

        info!(
            "simulator initialized: {} frames of {} bytes, quantum {}ms",
            config.ram_frames, config.page_size, config.quantum
        );
        self.running = config.auto_scheduling;
        self.config = config;
        self.processor = Some(processor);
        self.ticks = 0;
        Ok(())
    }

    fn processor_mut_or_err(&mut self) -> Result<&mut Processor> {
        self.processor.as_mut().ok_or(SimError::NotInitialized)
    }

    /// Create a random process and admit it. `memory_size` defaults to a
    /// random size when `None`.
    pub fn add_process(&mut self, can_be_blocked: bool, memory_size: Option<usize>) -> Result<Pid> {
        self.spawn(&ProcessSpec {
            can_be_blocked,
            memory_size,
            ..ProcessSpec::default()
        })
    }

    /// Create and admit a process from a workload entry.
    pub fn spawn(&mut self, spec: &ProcessSpec) -> Result<Pid> {
        let processor = self.processor.as_mut().ok_or(SimError::NotInitialized)?;
        let pid = processor.allocate_pid();
        let process = Process::from_spec(pid, spec, &mut self.rng).created_at(processor.now());
        self.admit(process)
    }

    /// Admit a caller-built process, subject to the process limit.
    pub fn admit(&mut self, process: Process) -> Result<Pid> {
        let max = self.config.max_processes;
        let processor = self.processor_mut_or_err()?;
        if processor.processes().count() >= max {
            return Err(SimError::ProcessLimit { max });
        }
        processor.admit_process(process)
    }

    /// Enable auto-scheduling so [`Simulator::run_for`] advances.
    pub fn start(&mut self) -> Result<()> {
        self.processor_mut_or_err()?.set_auto_scheduling(true)?;
        self.running = true;
        Ok(())
    }

    /// Stop the periodic driver; manual steps still work.
    pub fn pause(&mut self) -> Result<()> {
        self.processor_mut_or_err()?.set_auto_scheduling(false)?;
        self.running = false;
        Ok(())
    }

    /// One manual tick.
    pub fn step(&mut self) -> Result<()> {
        self.processor_mut_or_err()?.schedule()?;
        self.ticks += 1;
        Ok(())
    }

    /// Periodic driver: up to `ticks` ticks while running. Stops early once
    /// every process has terminated. Returns the ticks actually run.
    pub fn run_for(&mut self, ticks: u64) -> Result<u64> {
        let mut ran = 0;
        while ran < ticks && self.running && !self.is_finished() {
            self.step()?;
            ran += 1;
        }
        Ok(ran)
    }

    /// True when nothing is running, ready or blocked.
    pub fn is_finished(&self) -> bool {
        self.processor.as_ref().is_none_or(|p| {
            p.current_pid().is_none() && p.ready_queue().is_empty() && p.blocked_queue().is_empty()
        })
    }

    /// Drop the processor and return to the uninitialized state.
    pub fn reset(&mut self) {
        self.processor = None;
        self.ticks = 0;
        self.running = false;
        info!("simulator reset");
    }

    pub fn processor(&self) -> Option<&Processor> {
        self.processor.as_ref()
    }

    pub fn processor_mut(&mut self) -> Option<&mut Processor> {
        self.processor.as_mut()
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Ticks run since initialization.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current metrics, `None` before initialization.
    pub fn metrics(&self) -> Option<Metrics> {
        let processor = self.processor.as_ref()?;
        let mmu = processor.mmu();

        let total = processor.processes().count();
        let terminated = processor
            .processes()
            .filter(|p| p.state() == ProcessState::Terminated)
            .count();
        let throughput = if self.ticks > 0 {
            terminated as f64 / self.ticks as f64
        } else {
            0.0
        };

        Some(Metrics {
            total_processes: total,
            active_processes: total - terminated,
            terminated_processes: terminated,
            page_faults: mmu.page_faults(),
            page_hits: mmu.page_hits(),
            swap_count: mmu.swap_count(),
            hit_ratio: mmu.hit_ratio(),
            ram_usage: mmu.ram().usage(),
            pages_on_disk: mmu.disk().total_pages(),
            cpu_busy: processor.current_pid().is_some(),
            throughput,
        })
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
