use std::fmt;

/// Where a page currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLocation {
    Frame(usize),
    OnDisk,
}

impl fmt::Display for PageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageLocation::Frame(index) => write!(f, "frame {}", index),
            PageLocation::OnDisk => write!(f, "disk"),
        }
    }
}

/// Per-process mapping from page number to location.
///
/// Page numbers are dense (`0..len`), so every page has exactly one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    entries: Vec<PageLocation>,
}

impl PageTable {
    /// A table with every page on disk.
    pub fn new(page_count: usize) -> Self {
        PageTable {
            entries: vec![PageLocation::OnDisk; page_count],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Location of `page_number`, `None` if out of range.
    #[inline]
    pub fn get(&self, page_number: usize) -> Option<PageLocation> {
        self.entries.get(page_number).copied()
    }

    /// Panics if `page_number` is outside the table.
    pub fn set(&mut self, page_number: usize, location: PageLocation) {
        self.entries[page_number] = location;
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, PageLocation)> + '_ {
        self.entries.iter().copied().enumerate()
    }

    /// Entries pointing at a frame.
    pub fn resident_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|l| matches!(l, PageLocation::Frame(_)))
            .count()
    }

    /// Entries pointing at disk.
    pub fn on_disk_count(&self) -> usize {
        self.len() - self.resident_count()
    }
}

/// Outcome of an MMU lookup. A fault is an expected result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResult {
    Resident(usize),
    Fault,
}

impl AccessResult {
    pub fn frame(&self) -> Option<usize> {
        match self {
            AccessResult::Resident(index) => Some(*index),
            AccessResult::Fault => None,
        }
    }

    #[inline]
    pub fn is_fault(&self) -> bool {
        matches!(self, AccessResult::Fault)
    }
}

/// Pages needed to hold `memory_size` bytes.
#[inline]
pub fn page_count(memory_size: usize, page_size: usize) -> usize {
    memory_size.div_ceil(page_size)
}
