pub const DEFAULT_NUM_FRAMES: usize = 16;
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Simulated milliseconds consumed by one `schedule()` call.
pub const TICK_MS: u64 = 500;
pub const DEFAULT_QUANTUM_MS: u64 = 2000;
pub const DEFAULT_MAX_PROCESSES: usize = 10;

pub const UNBLOCK_CHANCE: f64 = 0.6;
pub const IO_BLOCK_CHANCE: f64 = 0.1;
pub const CONTEXT_SWITCH_CHANCE: f64 = 0.1;

pub const MAX_EVENT_HISTORY: usize = 100;

// ranges used when generating synthetic processes
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const MIN_REMAINING_MS: u64 = 4000;
pub const MAX_REMAINING_MS: u64 = 10_000;
pub const MIN_MEMORY_SIZE: usize = 4096;
pub const MAX_MEMORY_SIZE: usize = 4096 + 32_768;
pub const MAX_PC: u32 = 1000;
pub const MAX_REGISTER: u32 = 255;
