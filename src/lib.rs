pub mod clock;
pub mod constants;
pub mod error;
pub mod io;
pub mod memory;
pub mod mmu;
pub mod observer;
pub mod process;
pub mod processor;
pub mod simulator;
pub mod translation;

/// Process identifier, allocated monotonically at admission.
pub type Pid = u32;

// Re-export commonly used items for convenience
pub use error::{Result, SimError};
pub use memory::{Disk, Page, Ram};
pub use mmu::{Mmu, MmuEvent, MmuEventKind};
pub use process::{Process, ProcessSpec, ProcessState};
pub use processor::{Processor, RandomSource, SchedulingPolicy};
pub use simulator::{Metrics, Simulator, SimulatorConfig};
pub use translation::{AccessResult, PageLocation};
