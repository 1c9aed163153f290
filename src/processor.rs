use std::collections::{BTreeMap, VecDeque};

use log::{debug, info, warn};
use rand::Rng;

use crate::Pid;
use crate::constants::*;
use crate::error::{Result, SimError};
use crate::memory::{Disk, Ram};
use crate::mmu::Mmu;
use crate::process::{MemoryAccess, Process, ProcessState};

/// Source of the scheduler's random decisions.
///
/// Implemented for every [`rand::Rng`]; tests plug in scripted sources.
pub trait RandomSource {
    /// `true` with probability `p`.
    fn chance(&mut self, p: f64) -> bool;
    /// Uniform index in `0..n`; `n` is never zero.
    fn index(&mut self, n: usize) -> usize;
}

impl<R: Rng> RandomSource for R {
    fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.random::<f64>() < p
    }

    fn index(&mut self, n: usize) -> usize {
        self.random_range(0..n)
    }
}

/// Tick length and the probabilities behind I/O completion, I/O blocking
/// and preemption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulingPolicy {
    pub tick_ms: u64,
    pub unblock_chance: f64,
    pub io_block_chance: f64,
    pub context_switch_chance: f64,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        SchedulingPolicy {
            tick_ms: TICK_MS,
            unblock_chance: UNBLOCK_CHANCE,
            io_block_chance: IO_BLOCK_CHANCE,
            context_switch_chance: CONTEXT_SWITCH_CHANCE,
        }
    }
}

enum Execution {
    Continue,
    Released,
}

/// Single-CPU scheduler. Owns every admitted process (terminated ones are
/// kept for inspection) and the MMU.
pub struct Processor {
    quantum: u64,
    ready_queue: VecDeque<Pid>,
    blocked_queue: Vec<Pid>,
    current: Option<Pid>,
    auto_scheduling: bool,
    mmu: Mmu,
    processes: BTreeMap<Pid, Process>,
    policy: SchedulingPolicy,
    rng: Box<dyn RandomSource>,
    now: u64,
    slice_used: u64,
    next_pid: Pid,
}

impl Processor {
    /// Processor over a fresh MMU built from `ram` and `disk`.
    pub fn new(quantum: u64, ram: Ram, disk: Disk) -> Self {
        Self::with_mmu(quantum, Mmu::new(ram, disk))
    }

    /// Processor over an existing MMU, with the default policy and thread RNG.
    pub fn with_mmu(quantum: u64, mmu: Mmu) -> Self {
        Processor {
            quantum,
            ready_queue: VecDeque::new(),
            blocked_queue: Vec::new(),
            current: None,
            auto_scheduling: false,
            mmu,
            processes: BTreeMap::new(),
            policy: SchedulingPolicy::default(),
            rng: Box::new(rand::rng()),
            now: 0,
            slice_used: 0,
            next_pid: 1,
        }
    }

    /// Replace the tick length and probabilities.
    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the source of scheduling decisions.
    pub fn with_rng<R: RandomSource + 'static>(mut self, rng: R) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Next unused pid. Pids are never reused.
    pub fn allocate_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid = self.next_pid.saturating_add(1);
        pid
    }

    /// Register a `NEW` process: build its page table, move it to `READY`
    /// and queue it at the tail.
    pub fn admit_process(&mut self, mut process: Process) -> Result<Pid> {
        let pid = process.pid();
        if self.processes.contains_key(&pid) {
            return Err(SimError::DuplicateProcess { pid });
        }
        if process.state() != ProcessState::New {
            return Err(SimError::InvalidTransition {
                pid,
                from: process.state(),
                to: ProcessState::Ready,
            });
        }

        self.mmu.initialize_process(&mut process)?;
        process.transition(ProcessState::Ready, "admitted to the system", self.now)?;
        info!(
            "admitted process {} ({} bytes, {} pages, priority {})",
            pid,
            process.memory_size(),
            process.pages().len(),
            process.priority()
        );

        self.processes.insert(pid, process);
        self.ready_queue.push_back(pid);
        self.next_pid = self.next_pid.max(pid.saturating_add(1));
        Ok(pid)
    }

    /// Run one tick.
    ///
    /// Blocked processes may finish their I/O, an idle CPU picks up the head
    /// of the ready queue, and the running process executes once. When the
    /// running process gives up the CPU the next ready one is dispatched in
    /// the same tick, so a tick ends with the CPU busy or the ready queue
    /// empty. Each process executes at most once per tick.
    pub fn schedule(&mut self) -> Result<()> {
        self.now += self.policy.tick_ms;
        self.mmu.set_time(self.now);

        self.unblock_phase()?;

        let mut executed: Vec<Pid> = Vec::new();
        loop {
            if self.current.is_none() {
                let Some(pid) = self.ready_queue.pop_front() else {
                    break;
                };
                if let Err(e) = self.dispatch(pid) {
                    self.ready_queue.push_front(pid);
                    return Err(e);
                }
            }

            let Some(pid) = self.current else {
                break;
            };
            if executed.contains(&pid) {
                break;
            }
            executed.push(pid);

            match self.execute(pid)? {
                Execution::Continue => break,
                Execution::Released => continue,
            }
        }
        Ok(())
    }

    fn unblock_phase(&mut self) -> Result<()> {
        if self.blocked_queue.is_empty() {
            return Ok(());
        }

        let now = self.now;
        let chance = self.policy.unblock_chance;
        let (done, waiting): (Vec<Pid>, Vec<Pid>) = std::mem::take(&mut self.blocked_queue)
            .into_iter()
            .partition(|_| self.rng.chance(chance));
        self.blocked_queue = waiting;

        for (index, &pid) in done.iter().enumerate() {
            let moved = self
                .process_mut_or_err(pid)
                .and_then(|p| p.transition(ProcessState::Ready, "I/O completed", now));
            if let Err(e) = moved {
                // pids not yet moved stay blocked
                self.blocked_queue.extend_from_slice(&done[index..]);
                return Err(e);
            }
            self.ready_queue.push_back(pid);
        }
        Ok(())
    }

    fn dispatch(&mut self, pid: Pid) -> Result<()> {
        let now = self.now;
        self.process_mut_or_err(pid)?
            .transition(ProcessState::Running, "assigned to CPU", now)?;
        self.current = Some(pid);
        self.slice_used = 0;
        self.touch_memory(pid);
        Ok(())
    }

    fn execute(&mut self, pid: Pid) -> Result<Execution> {
        let now = self.now;
        let tick_ms = self.policy.tick_ms;
        self.process_mut_or_err(pid)?.execute(tick_ms);
        self.slice_used += tick_ms;
        self.touch_memory(pid);

        let (remaining, can_block) = {
            let p = self.process_or_err(pid)?;
            (p.remaining_time(), p.can_be_blocked())
        };

        if remaining == 0 {
            self.process_mut_or_err(pid)?
                .transition(ProcessState::Terminated, "process completed", now)?;
            self.current = None;
            if let Err(e) = self.mmu.free_process_memory(pid) {
                warn!("releasing memory of process {}: {}", pid, e);
            }
            info!("process {} terminated at {}ms", pid, now);
            return Ok(Execution::Released);
        }

        if can_block && self.rng.chance(self.policy.io_block_chance) {
            self.process_mut_or_err(pid)?
                .transition(ProcessState::Blocked, "I/O operation", now)?;
            self.blocked_queue.push(pid);
            self.current = None;
            return Ok(Execution::Released);
        }

        let quantum_spent = self.quantum > 0 && self.slice_used >= self.quantum;
        if quantum_spent || self.rng.chance(self.policy.context_switch_chance) {
            self.process_mut_or_err(pid)?.transition(
                ProcessState::Ready,
                "quantum expired (context switch)",
                now,
            )?;
            self.ready_queue.push_back(pid);
            self.current = None;
            return Ok(Execution::Released);
        }

        Ok(Execution::Continue)
    }

    /// Access a random page of `pid`, resolving faults through the MMU.
    /// `Ok(None)` when the process owns no pages.
    fn access_random_page(&mut self, pid: Pid) -> Result<Option<MemoryAccess>> {
        let process = self
            .processes
            .get(&pid)
            .ok_or(SimError::UnknownProcess { pid })?;
        let num_pages = process.pages().len();
        if num_pages == 0 {
            return Ok(None);
        }
        let page_number = self.rng.index(num_pages);
        process
            .simulate_memory_access(&mut self.mmu, page_number)
            .map(Some)
    }

    // Failures are logged and the tick goes on without the access.
    fn touch_memory(&mut self, pid: Pid) {
        match self.access_random_page(pid) {
            Ok(Some(access)) if access.faulted => {
                debug!("process {} faulted, page now in frame {}", pid, access.frame)
            }
            Ok(_) => {}
            Err(e) => warn!("memory access for process {} failed: {}", pid, e),
        }
    }

    /// Toggle the periodic driver; enabling it kicks an idle CPU with one tick.
    pub fn set_auto_scheduling(&mut self, enabled: bool) -> Result<()> {
        self.auto_scheduling = enabled;
        if enabled && self.current.is_none() && !self.ready_queue.is_empty() {
            self.schedule()?;
        }
        Ok(())
    }

    /// Administrative state change outside the tick loop.
    ///
    /// The process is pulled from the queue its current state implies and
    /// filed where the new state says. Nothing is mutated when the
    /// transition is illegal or the CPU is taken by another process.
    pub fn manual_transition(&mut self, pid: Pid, to: ProcessState, reason: &str) -> Result<()> {
        let from = self.process_or_err(pid)?.state();
        if !self.mmu.has_page_table(pid) {
            return Err(SimError::MissingPageTable { pid });
        }
        if !from.can_transition_to(to) {
            return Err(SimError::InvalidTransition { pid, from, to });
        }
        if to == ProcessState::Running {
            if let Some(running) = self.current.filter(|&running| running != pid) {
                return Err(SimError::CpuOccupied {
                    running,
                    requested: pid,
                });
            }
        }

        match from {
            ProcessState::Ready => self.ready_queue.retain(|&p| p != pid),
            ProcessState::Blocked => self.blocked_queue.retain(|&p| p != pid),
            ProcessState::Running if self.current == Some(pid) => self.current = None,
            _ => {}
        }

        let now = self.now;
        self.process_mut_or_err(pid)?.transition(to, reason, now)?;

        match to {
            ProcessState::Ready => {
                if !self.ready_queue.contains(&pid) {
                    self.ready_queue.push_back(pid);
                }
            }
            ProcessState::Blocked => {
                if !self.blocked_queue.contains(&pid) {
                    self.blocked_queue.push(pid);
                }
            }
            ProcessState::Running => {
                self.current = Some(pid);
                self.slice_used = 0;
                if let Err(e) = self.access_random_page(pid) {
                    warn!("memory access for process {} failed: {}", pid, e);
                    self.process_mut_or_err(pid)?.transition(
                        ProcessState::Blocked,
                        "memory access error",
                        now,
                    )?;
                    self.blocked_queue.push(pid);
                    self.current = None;
                }
            }
            ProcessState::Terminated => self.mmu.free_process_memory(pid)?,
            ProcessState::New => {}
        }

        if self.auto_scheduling && self.current.is_none() {
            self.schedule()?;
        }
        Ok(())
    }

    fn process_or_err(&self, pid: Pid) -> Result<&Process> {
        self.processes
            .get(&pid)
            .ok_or(SimError::UnknownProcess { pid })
    }

    fn process_mut_or_err(&mut self, pid: Pid) -> Result<&mut Process> {
        self.processes
            .get_mut(&pid)
            .ok_or(SimError::UnknownProcess { pid })
    }

    /// Process `pid`, terminated ones included.
    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    /// Mutable access for attaching listeners; state changes still go
    /// through the scheduler.
    pub fn process_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.processes.get_mut(&pid)
    }

    /// Every admitted process, terminated ones included, by pid.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// Pids waiting for the CPU, head first.
    pub fn ready_queue(&self) -> &VecDeque<Pid> {
        &self.ready_queue
    }

    /// Pids waiting on I/O, in blocking order.
    pub fn blocked_queue(&self) -> &[Pid] {
        &self.blocked_queue
    }

    /// Pid holding the CPU, if any.
    #[inline]
    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    /// Process holding the CPU, if any.
    pub fn current_process(&self) -> Option<&Process> {
        self.current.and_then(|pid| self.processes.get(&pid))
    }

    /// Time slice in simulated ms; 0 means no hard limit.
    #[inline]
    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    /// Whether the periodic driver is enabled.
    #[inline]
    pub fn auto_scheduling(&self) -> bool {
        self.auto_scheduling
    }

    /// Tick length and scheduling probabilities.
    #[inline]
    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Simulated milliseconds since construction.
    #[inline]
    pub fn now(&self) -> u64 {
        self.now
    }

    /// The memory management unit.
    #[inline]
    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    /// Mutable MMU, for subscriptions and statistics resets.
    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always answers `chance` with a fixed value and picks page 0.
    struct Fixed(bool);

    impl RandomSource for Fixed {
        fn chance(&mut self, _p: f64) -> bool {
            self.0
        }

        fn index(&mut self, _n: usize) -> usize {
            0
        }
    }

    fn quiet() -> SchedulingPolicy {
        SchedulingPolicy {
            tick_ms: TICK_MS,
            unblock_chance: 0.0,
            io_block_chance: 0.0,
            context_switch_chance: 0.0,
        }
    }

    fn processor(frames: usize) -> Processor {
        Processor::new(0, Ram::new(frames, 4096), Disk::new())
            .with_policy(quiet())
            .with_rng(Fixed(false))
    }

    fn admit(cpu: &mut Processor, can_block: bool, remaining: u64) -> Pid {
        let pid = cpu.allocate_pid();
        let process = Process::new(pid, can_block, 8192).with_remaining_time(remaining);
        cpu.admit_process(process).unwrap()
    }

    #[test]
    fn test_admit_enqueues_ready() {
        let mut cpu = processor(4);
        let pid = admit(&mut cpu, false, 5000);

        assert_eq!(pid, 1);
        assert_eq!(cpu.ready_queue().iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(cpu.process(1).unwrap().state(), ProcessState::Ready);
        assert!(cpu.mmu().has_page_table(1));
        assert_eq!(cpu.process(1).unwrap().pages().len(), 2);
    }

    #[test]
    fn test_admit_rejects_duplicates_and_non_new() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, 5000);
        assert!(matches!(
            cpu.admit_process(Process::new(1, false, 4096)),
            Err(SimError::DuplicateProcess { pid: 1 })
        ));
        assert_eq!(cpu.allocate_pid(), 2);
    }

    #[test]
    fn test_schedule_dispatches_and_runs() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, 5000);
        cpu.schedule().unwrap();

        assert_eq!(cpu.current_pid(), Some(1));
        assert!(cpu.ready_queue().is_empty());
        let p = cpu.process(1).unwrap();
        assert_eq!(p.state(), ProcessState::Running);
        assert_eq!(p.remaining_time(), 4500);
        // initial access faults, the execution access hits
        assert_eq!(cpu.mmu().page_faults(), 1);
        assert_eq!(cpu.mmu().page_hits(), 1);
        assert_eq!(cpu.now(), TICK_MS);
    }

    #[test]
    fn test_schedule_on_empty_processor() {
        let mut cpu = processor(2);
        cpu.schedule().unwrap();
        assert!(cpu.current_pid().is_none());
        assert_eq!(cpu.mmu().page_faults(), 0);
    }

    #[test]
    fn test_termination_frees_and_redispatches() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, TICK_MS);
        admit(&mut cpu, false, 5000);
        cpu.schedule().unwrap();

        assert_eq!(cpu.process(1).unwrap().state(), ProcessState::Terminated);
        assert_eq!(cpu.mmu().ram().process_frame_count(1), 0);
        assert!(!cpu.mmu().disk().has_pages(1));
        assert!(!cpu.mmu().has_page_table(1));
        // the second process took over within the same tick
        assert_eq!(cpu.current_pid(), Some(2));
        assert_eq!(cpu.process(2).unwrap().remaining_time(), 4500);
    }

    #[test]
    fn test_quantum_forces_context_switch() {
        let mut cpu = Processor::new(1000, Ram::new(4, 4096), Disk::new())
            .with_policy(quiet())
            .with_rng(Fixed(false));
        admit(&mut cpu, false, 10_000);
        admit(&mut cpu, false, 10_000);

        cpu.schedule().unwrap();
        assert_eq!(cpu.current_pid(), Some(1));
        cpu.schedule().unwrap();
        // 1000ms slice spent: P1 goes back to the tail, P2 runs
        assert_eq!(cpu.current_pid(), Some(2));
        assert_eq!(cpu.ready_queue().iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(cpu.process(1).unwrap().state(), ProcessState::Ready);
    }

    #[test]
    fn test_io_block_and_unblock() {
        let mut cpu = Processor::new(0, Ram::new(4, 4096), Disk::new())
            .with_policy(quiet())
            .with_rng(Fixed(true));
        admit(&mut cpu, true, 10_000);

        // every draw succeeds: blocks right after its first execution
        cpu.schedule().unwrap();
        assert_eq!(cpu.blocked_queue(), &[1]);
        assert!(cpu.current_pid().is_none());

        // next tick: I/O completes, it is dispatched and blocks again
        cpu.schedule().unwrap();
        assert_eq!(cpu.process(1).unwrap().state(), ProcessState::Blocked);
        let reasons: Vec<_> = cpu.process(1).unwrap().history().iter().map(|h| h.reason.clone()).collect();
        assert!(reasons.contains(&"I/O completed".to_string()));
    }

    #[test]
    fn test_unblockable_process_never_blocks() {
        let mut cpu = Processor::new(0, Ram::new(4, 4096), Disk::new())
            .with_policy(quiet())
            .with_rng(Fixed(true));
        admit(&mut cpu, false, 10_000);
        cpu.schedule().unwrap();

        // the context-switch draw fired instead; alone in the queue it is redispatched
        assert!(cpu.blocked_queue().is_empty());
        assert_eq!(cpu.current_pid(), Some(1));
    }

    #[test]
    fn test_set_auto_scheduling_kicks_idle_cpu() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, 5000);
        cpu.set_auto_scheduling(true).unwrap();
        assert!(cpu.auto_scheduling());
        assert_eq!(cpu.current_pid(), Some(1));

        cpu.set_auto_scheduling(false).unwrap();
        assert!(!cpu.auto_scheduling());
    }

    #[test]
    fn test_manual_transition_to_running() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, 5000);
        cpu.manual_transition(1, ProcessState::Running, "operator").unwrap();

        assert_eq!(cpu.current_pid(), Some(1));
        assert!(cpu.ready_queue().is_empty());
        assert_eq!(cpu.mmu().page_faults(), 1);
    }

    #[test]
    fn test_manual_transition_cpu_occupied() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, 5000);
        admit(&mut cpu, false, 5000);
        cpu.schedule().unwrap();

        let err = cpu.manual_transition(2, ProcessState::Running, "operator");
        assert!(matches!(
            err,
            Err(SimError::CpuOccupied { running: 1, requested: 2 })
        ));
        assert_eq!(cpu.process(2).unwrap().state(), ProcessState::Ready);
        assert_eq!(cpu.ready_queue().iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_manual_transition_invalid_leaves_queues() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, 5000);
        assert!(matches!(
            cpu.manual_transition(1, ProcessState::Blocked, "operator"),
            Err(SimError::InvalidTransition { .. })
        ));
        assert_eq!(cpu.ready_queue().len(), 1);
        assert!(matches!(
            cpu.manual_transition(42, ProcessState::Ready, "operator"),
            Err(SimError::UnknownProcess { pid: 42 })
        ));
    }

    #[test]
    fn test_manual_block_unblock_terminate() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, 5000);
        cpu.schedule().unwrap();

        cpu.manual_transition(1, ProcessState::Blocked, "operator").unwrap();
        assert_eq!(cpu.blocked_queue(), &[1]);
        assert!(cpu.current_pid().is_none());

        cpu.manual_transition(1, ProcessState::Ready, "operator").unwrap();
        assert!(cpu.blocked_queue().is_empty());
        assert_eq!(cpu.ready_queue().len(), 1);

        cpu.manual_transition(1, ProcessState::Running, "operator").unwrap();
        cpu.manual_transition(1, ProcessState::Terminated, "killed").unwrap();
        assert!(!cpu.mmu().has_page_table(1));
        assert!(cpu.current_pid().is_none());

        // no page table any more
        assert!(matches!(
            cpu.manual_transition(1, ProcessState::Ready, "operator"),
            Err(SimError::MissingPageTable { pid: 1 })
        ));
    }

    #[test]
    fn test_manual_running_without_frames_degrades_to_blocked() {
        let mut cpu = processor(0);
        admit(&mut cpu, false, 5000);

        cpu.manual_transition(1, ProcessState::Running, "operator")
            .unwrap();

        let p = cpu.process(1).unwrap();
        assert_eq!(p.state(), ProcessState::Blocked);
        assert_eq!(p.history().last().unwrap().reason, "memory access error");
        assert_eq!(cpu.blocked_queue(), &[1]);
        assert!(cpu.current_pid().is_none());
        assert!(cpu.ready_queue().is_empty());
    }

    #[test]
    fn test_schedule_without_frames_keeps_running() {
        let mut cpu = processor(0);
        admit(&mut cpu, false, 5000);

        cpu.schedule().unwrap();

        assert_eq!(cpu.current_pid(), Some(1));
        let p = cpu.process(1).unwrap();
        assert_eq!(p.state(), ProcessState::Running);
        assert_eq!(p.remaining_time(), 4500);
        // both accesses fault and neither can be resolved
        assert_eq!(cpu.mmu().page_faults(), 2);
        assert_eq!(cpu.mmu().ram().occupied_frames(), 0);
    }

    #[test]
    fn test_failed_unblock_keeps_pids_blocked() {
        let mut cpu = Processor::new(0, Ram::new(4, 4096), Disk::new())
            .with_policy(quiet())
            .with_rng(Fixed(true));
        admit(&mut cpu, true, 5000);
        cpu.schedule().unwrap();
        assert_eq!(cpu.blocked_queue(), &[1]);

        cpu.blocked_queue.insert(0, 99);
        assert!(matches!(
            cpu.schedule(),
            Err(SimError::UnknownProcess { pid: 99 })
        ));
        assert_eq!(cpu.blocked_queue(), &[99, 1]);
        assert_eq!(cpu.process(1).unwrap().state(), ProcessState::Blocked);
    }

    #[test]
    fn test_failed_dispatch_keeps_pid_queued() {
        let mut cpu = processor(4);
        admit(&mut cpu, false, 5000);
        cpu.ready_queue.push_front(99);

        assert!(matches!(
            cpu.schedule(),
            Err(SimError::UnknownProcess { pid: 99 })
        ));
        assert_eq!(cpu.ready_queue().iter().copied().collect::<Vec<_>>(), vec![99, 1]);
        assert!(cpu.current_pid().is_none());
    }

    #[test]
    fn test_admit_highest_pid_does_not_overflow() {
        let mut cpu = processor(4);
        let pid = cpu
            .admit_process(Process::new(Pid::MAX, false, 4096))
            .unwrap();
        assert_eq!(pid, Pid::MAX);
        assert_eq!(cpu.allocate_pid(), Pid::MAX);
        assert_eq!(cpu.allocate_pid(), Pid::MAX);
    }

    #[test]
    fn test_residency_invariant_holds_under_pressure() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let mut cpu = Processor::new(DEFAULT_QUANTUM_MS, Ram::new(3, 4096), Disk::new())
            .with_rng(StdRng::seed_from_u64(42));
        for _ in 0..4 {
            let pid = cpu.allocate_pid();
            let process = Process::new(pid, true, 5 * 4096).with_remaining_time(6000);
            cpu.admit_process(process).unwrap();
        }

        for _ in 0..400 {
            cpu.schedule().unwrap();
            cpu.mmu().check_invariants().unwrap();
            assert!(cpu.mmu().ram().occupied_frames() <= 3);
        }
        assert!(cpu.processes().all(|p| p.state() == ProcessState::Terminated));
        assert_eq!(cpu.mmu().ram().occupied_frames(), 0);
        assert_eq!(cpu.mmu().disk().total_pages(), 0);
    }
}
