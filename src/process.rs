use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use rand::Rng;

use crate::Pid;
use crate::constants::*;
use crate::error::{Result, SimError};
use crate::mmu::Mmu;
use crate::observer::Listener;
use crate::translation::AccessResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl ProcessState {
    pub const ALL: [ProcessState; 5] = [
        ProcessState::New,
        ProcessState::Ready,
        ProcessState::Running,
        ProcessState::Blocked,
        ProcessState::Terminated,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ProcessState::New => "NEW",
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Blocked => "BLOCKED",
            ProcessState::Terminated => "TERMINATED",
        }
    }

    /// The allowed-transition table.
    pub const fn can_transition_to(self, to: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, to),
            (New, Ready)
                | (Ready, Running)
                | (Running, Ready)
                | (Running, Blocked)
                | (Running, Terminated)
                | (Blocked, Ready)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub ax: u32,
    pub bx: u32,
    pub cx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub state: ProcessState,
    pub timestamp: u64,
    pub reason: String,
    /// Time spent in the state this entry replaced; `None` for the creation entry.
    pub time_in_previous_state: Option<u64>,
}

/// Sent to the transition listener after every successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionInfo {
    pub pid: Pid,
    pub from: ProcessState,
    pub to: ProcessState,
    pub reason: String,
    pub timestamp: u64,
    pub time_in_state: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateStats {
    pub total_time: u64,
    pub count: usize,
}

/// Outcome of [`Process::simulate_memory_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    pub frame: usize,
    pub faulted: bool,
}

/// What a workload asks for; anything left `None` is drawn at random.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    pub can_be_blocked: bool,
    pub memory_size: Option<usize>,
    pub remaining_time: Option<u64>,
    pub priority: Option<u8>,
}

/// A synthetic process. Time values are simulated milliseconds.
#[derive(Debug)]
pub struct Process {
    pid: Pid,
    state: ProcessState,
    priority: u8,
    pc: u32,
    registers: Registers,
    system_calls: Vec<String>,
    can_be_blocked: bool,
    remaining_time: u64,
    memory_size: usize,
    pages: Vec<usize>,
    history: Vec<HistoryEntry>,
    state_since: u64,
    on_transition: Listener<TransitionInfo>,
}

impl Process {
    /// A process in `NEW` with neutral defaults; see the `with_*` builders.
    pub fn new(pid: Pid, can_be_blocked: bool, memory_size: usize) -> Self {
        Process {
            pid,
            state: ProcessState::New,
            priority: MIN_PRIORITY,
            pc: 0,
            registers: Registers::default(),
            system_calls: Vec::new(),
            can_be_blocked,
            remaining_time: MIN_REMAINING_MS,
            memory_size,
            pages: Vec::new(),
            history: vec![HistoryEntry {
                state: ProcessState::New,
                timestamp: 0,
                reason: "process created".to_string(),
                time_in_previous_state: None,
            }],
            state_since: 0,
            on_transition: Listener::new(),
        }
    }

    /// A process with randomized priority, registers, program counter,
    /// CPU demand and (unless given) memory size.
    pub fn random<R: Rng>(
        pid: Pid,
        can_be_blocked: bool,
        memory_size: Option<usize>,
        rng: &mut R,
    ) -> Self {
        let memory_size =
            memory_size.unwrap_or_else(|| rng.random_range(MIN_MEMORY_SIZE..MAX_MEMORY_SIZE));
        Process::new(pid, can_be_blocked, memory_size)
            .with_priority(rng.random_range(MIN_PRIORITY..=MAX_PRIORITY))
            .with_pc(rng.random_range(0..MAX_PC))
            .with_registers(Registers {
                ax: rng.random_range(0..MAX_REGISTER),
                bx: rng.random_range(0..MAX_REGISTER),
                cx: rng.random_range(0..MAX_REGISTER),
            })
            .with_remaining_time(rng.random_range(MIN_REMAINING_MS..MAX_REMAINING_MS))
    }

    pub fn from_spec<R: Rng>(pid: Pid, spec: &ProcessSpec, rng: &mut R) -> Self {
        let mut process = Process::random(pid, spec.can_be_blocked, spec.memory_size, rng);
        if let Some(priority) = spec.priority {
            process.priority = priority;
        }
        if let Some(remaining_time) = spec.remaining_time {
            process.remaining_time = remaining_time;
        }
        process
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_pc(mut self, pc: u32) -> Self {
        self.pc = pc;
        self
    }

    pub fn with_registers(mut self, registers: Registers) -> Self {
        self.registers = registers;
        self
    }

    pub fn with_remaining_time(mut self, remaining_time: u64) -> Self {
        self.remaining_time = remaining_time;
        self
    }

    /// Stamp the creation entry with the simulated time of creation.
    pub fn created_at(mut self, now: u64) -> Self {
        if let [entry] = self.history.as_mut_slice() {
            entry.timestamp = now;
            self.state_since = now;
        }
        self
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    #[inline]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    #[inline]
    pub fn registers(&self) -> Registers {
        self.registers
    }

    pub fn system_calls(&self) -> &[String] {
        &self.system_calls
    }

    #[inline]
    pub fn can_be_blocked(&self) -> bool {
        self.can_be_blocked
    }

    #[inline]
    pub fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    #[inline]
    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// Page numbers owned by this process, in order.
    pub fn pages(&self) -> &[usize] {
        &self.pages
    }

    pub(crate) fn assign_pages(&mut self, pages: Vec<usize>) {
        self.pages = pages;
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// The newest `count` history entries, oldest first.
    pub fn history_tail(&self, count: usize) -> &[HistoryEntry] {
        &self.history[self.history.len().saturating_sub(count)..]
    }

    pub fn on_transition(&mut self) -> &mut Listener<TransitionInfo> {
        &mut self.on_transition
    }

    /// Consume one tick of CPU: burn `tick_ms` of remaining time and step
    /// the program counter.
    pub(crate) fn execute(&mut self, tick_ms: u64) {
        self.remaining_time = self.remaining_time.saturating_sub(tick_ms);
        self.pc = self.pc.wrapping_add(1);
    }

    /// Move to `to` if the transition table allows it.
    ///
    /// On failure the process is left exactly as it was.
    pub fn transition(&mut self, to: ProcessState, reason: &str, now: u64) -> Result<TransitionInfo> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(SimError::InvalidTransition {
                pid: self.pid,
                from,
                to,
            });
        }

        let time_in_state = now.saturating_sub(self.state_since);
        let reason = if reason.is_empty() { "automatic change" } else { reason };

        self.state = to;
        self.state_since = now;
        self.history.push(HistoryEntry {
            state: to,
            timestamp: now,
            reason: reason.to_string(),
            time_in_previous_state: Some(time_in_state),
        });

        match to {
            ProcessState::Running => self.system_calls.push(format!("exec() @ {}ms", now)),
            ProcessState::Blocked => self.system_calls.push(format!("I/O wait @ {}ms", now)),
            _ => {}
        }

        debug!("process {}: {} -> {} ({})", self.pid, from, to, reason);

        let info = TransitionInfo {
            pid: self.pid,
            from,
            to,
            reason: reason.to_string(),
            timestamp: now,
            time_in_state,
        };
        self.on_transition.notify(&info);
        Ok(info)
    }

    pub fn time_in_current_state(&self, now: u64) -> u64 {
        now.saturating_sub(self.state_since)
    }

    /// Total time and number of visits per state, from the history log.
    pub fn stats(&self) -> BTreeMap<ProcessState, StateStats> {
        let mut stats: BTreeMap<ProcessState, StateStats> = ProcessState::ALL
            .iter()
            .map(|&s| (s, StateStats::default()))
            .collect();

        for (index, entry) in self.history.iter().enumerate() {
            if let Some(s) = stats.get_mut(&entry.state) {
                s.count += 1;
            }
            if let (Some(elapsed), Some(prev)) = (
                entry.time_in_previous_state,
                index.checked_sub(1).map(|i| self.history[i].state),
            ) {
                if let Some(s) = stats.get_mut(&prev) {
                    s.total_time += elapsed;
                }
            }
        }
        stats
    }

    /// Touch one of this process's pages, resolving a fault through the MMU.
    pub fn simulate_memory_access(&self, mmu: &mut Mmu, page_number: usize) -> Result<MemoryAccess> {
        if page_number >= self.pages.len() {
            return Err(SimError::InvalidPageNumber {
                pid: self.pid,
                page_number,
                page_count: self.pages.len(),
            });
        }

        match mmu.access_memory(self.pid, page_number)? {
            AccessResult::Resident(frame) => Ok(MemoryAccess {
                frame,
                faulted: false,
            }),
            AccessResult::Fault => {
                let frame = mmu.handle_page_fault(self.pid, page_number)?;
                Ok(MemoryAccess {
                    frame,
                    faulted: true,
                })
            }
        }
    }
}
