use std::fmt;

use crate::Pid;
use crate::process::ProcessState;

pub type Result<T> = std::result::Result<T, SimError>;

/// Failures surfaced by the simulator core.
///
/// Routine paging (hits, faults, swaps, loads) never shows up here; page
/// faults travel as [`crate::translation::AccessResult::Fault`].
#[derive(Debug)]
pub enum SimError {
    InvalidTransition {
        pid: Pid,
        from: ProcessState,
        to: ProcessState,
    },
    InvalidPageNumber {
        pid: Pid,
        page_number: usize,
        page_count: usize,
    },
    MissingPageTable {
        pid: Pid,
    },
    /// The page table says "on disk" but the disk has no such page.
    MissingDiskPage {
        pid: Pid,
        page_number: usize,
    },
    /// Residency bookkeeping disagrees between RAM, disk and page tables.
    Invariant(String),
    /// RAM was built with zero frames, so nothing can ever be loaded.
    NoFrames,
    CpuOccupied {
        running: Pid,
        requested: Pid,
    },
    UnknownProcess {
        pid: Pid,
    },
    DuplicateProcess {
        pid: Pid,
    },
    ProcessLimit {
        max: usize,
    },
    /// A configuration value the simulator cannot work with.
    InvalidConfig(String),
    NotInitialized,
    Parse {
        line: usize,
        message: String,
    },
    Io(std::io::Error),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidTransition { pid, from, to } => {
                write!(f, "invalid transition for process {}: {} -> {}", pid, from, to)
            }
            SimError::InvalidPageNumber {
                pid,
                page_number,
                page_count,
            } => write!(
                f,
                "invalid page number {} for process {} ({} pages)",
                page_number, pid, page_count
            ),
            SimError::MissingPageTable { pid } => write!(f, "no page table for process {}", pid),
            SimError::MissingDiskPage { pid, page_number } => write!(
                f,
                "page {} of process {} not found on disk",
                page_number, pid
            ),
            SimError::Invariant(message) => write!(f, "paging invariant violated: {}", message),
            SimError::NoFrames => write!(f, "RAM has no frames to load pages into"),
            SimError::CpuOccupied { running, requested } => write!(
                f,
                "CPU is already occupied by process {} (requested {})",
                running, requested
            ),
            SimError::UnknownProcess { pid } => write!(f, "unknown process {}", pid),
            SimError::DuplicateProcess { pid } => write!(f, "process {} already admitted", pid),
            SimError::ProcessLimit { max } => write!(f, "process limit of {} reached", max),
            SimError::InvalidConfig(message) => write!(f, "invalid configuration: {}", message),
            SimError::NotInitialized => write!(f, "simulator has not been initialized"),
            SimError::Parse { line, message } => write!(f, "line {}: {}", line, message),
            SimError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::Io(e)
    }
}
