use std::collections::BTreeMap;

use crate::Pid;

/// A fixed-size unit of a process's address space.
///
/// The filler buffer only exists so a page has a realistic footprint; its
/// contents carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_number: usize,
    pub size: usize,
    pub referenced: bool,
    pub modified: bool,
    pub access_count: u64,
    /// Simulated time of the last swap-in, `None` until first loaded.
    pub loaded_at: Option<u64>,
    data: Vec<u8>,
}

impl Page {
    /// A clean page with a zeroed filler buffer.
    pub fn new(page_number: usize, size: usize) -> Self {
        Page {
            page_number,
            size,
            referenced: false,
            modified: false,
            access_count: 0,
            loaded_at: None,
            data: vec![0u8; size],
        }
    }

    /// Filler contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Occupant of a RAM frame. The owner is a back-reference only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    pub owner: Pid,
    pub page: Page,
}

/// Paged physical memory: `num_frames` slots of `page_size` bytes each.
pub struct Ram {
    page_size: usize,
    frames: Vec<Option<FrameEntry>>,
}

impl Ram {
    /// RAM with `num_frames` empty frames.
    pub fn new(num_frames: usize, page_size: usize) -> Self {
        Ram {
            page_size,
            frames: vec![None; num_frames],
        }
    }

    /// Total number of frames, free or not.
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Size of one frame (and page) in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Set or clear a frame's occupant, returning whatever was there before.
    ///
    /// Panics if `index` is out of range.
    pub fn allocate_frame(&mut self, index: usize, entry: Option<FrameEntry>) -> Option<FrameEntry> {
        std::mem::replace(&mut self.frames[index], entry)
    }

    /// Clear every frame owned by `owner`. Returns how many were released.
    pub fn free_frames(&mut self, owner: Pid) -> usize {
        let mut freed = 0;
        for slot in self.frames.iter_mut() {
            if slot.as_ref().is_some_and(|f| f.owner == owner) {
                *slot = None;
                freed += 1;
            }
        }
        freed
    }

    /// Occupant of frame `index`, `None` if empty or out of range.
    #[inline]
    pub fn get_frame(&self, index: usize) -> Option<&FrameEntry> {
        self.frames.get(index).and_then(Option::as_ref)
    }

    /// Mutable occupant of frame `index`.
    #[inline]
    pub fn get_frame_mut(&mut self, index: usize) -> Option<&mut FrameEntry> {
        self.frames.get_mut(index).and_then(Option::as_mut)
    }

    /// Read-only view of the whole frame array.
    pub fn frames(&self) -> &[Option<FrameEntry>] {
        &self.frames
    }

    /// Mutable frame array, for the replacement scan.
    pub(crate) fn frames_mut(&mut self) -> &mut [Option<FrameEntry>] {
        &mut self.frames
    }

    /// Number of frames held by `owner`.
    pub fn process_frame_count(&self, owner: Pid) -> usize {
        self.frames
            .iter()
            .flatten()
            .filter(|f| f.owner == owner)
            .count()
    }

    /// Frame currently holding `(owner, page_number)`, if resident.
    pub fn find_page(&self, owner: Pid, page_number: usize) -> Option<usize> {
        self.frames.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|f| f.owner == owner && f.page.page_number == page_number)
        })
    }

    /// Number of non-empty frames.
    pub fn occupied_frames(&self) -> usize {
        self.frames.iter().flatten().count()
    }

    /// Fraction of frames in use, in `[0, 1]`.
    pub fn usage(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.occupied_frames() as f64 / self.frames.len() as f64
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new(
            crate::constants::DEFAULT_NUM_FRAMES,
            crate::constants::DEFAULT_PAGE_SIZE,
        )
    }
}

/// Per-process summary of what is swapped out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    pub pid: Pid,
    pub page_count: usize,
    pub page_numbers: Vec<usize>,
}

/// Swap area: pages evicted from RAM, keyed by owner then page number.
#[derive(Default)]
pub struct Disk {
    pages: BTreeMap<Pid, BTreeMap<usize, Page>>,
}

impl Disk {
    /// An empty swap area.
    pub fn new() -> Self {
        Disk {
            pages: BTreeMap::new(),
        }
    }

    /// Insert or overwrite the page stored under `(owner, page.page_number)`.
    pub fn store_page(&mut self, owner: Pid, page: Page) {
        self.pages
            .entry(owner)
            .or_default()
            .insert(page.page_number, page);
    }

    /// Swap-in primitive: removes the page and hands it back.
    pub fn get_page(&mut self, owner: Pid, page_number: usize) -> Option<Page> {
        let process_pages = self.pages.get_mut(&owner)?;
        let page = process_pages.remove(&page_number)?;
        if process_pages.is_empty() {
            self.pages.remove(&owner);
        }
        Some(page)
    }

    /// Whether `(owner, page_number)` is swapped out.
    pub fn contains(&self, owner: Pid, page_number: usize) -> bool {
        self.pages
            .get(&owner)
            .is_some_and(|p| p.contains_key(&page_number))
    }

    /// Whether `owner` has anything on disk.
    pub fn has_pages(&self, owner: Pid) -> bool {
        self.pages.get(&owner).is_some_and(|p| !p.is_empty())
    }

    /// Pages of `owner` currently on disk, by page number.
    pub fn process_pages(&self, owner: Pid) -> Option<&BTreeMap<usize, Page>> {
        self.pages.get(&owner)
    }

    /// Drop every swapped page of `owner`. Returns how many were dropped.
    pub fn clear_pages(&mut self, owner: Pid) -> usize {
        self.pages.remove(&owner).map_or(0, |p| p.len())
    }

    /// Per-process listing of swapped-out pages, ordered by pid.
    pub fn all_pages_info(&self) -> Vec<DiskUsage> {
        self.pages
            .iter()
            .map(|(&pid, pages)| DiskUsage {
                pid,
                page_count: pages.len(),
                page_numbers: pages.keys().copied().collect(),
            })
            .collect()
    }

    /// Number of pages on disk across all processes.
    pub fn total_pages(&self) -> usize {
        self.pages.values().map(BTreeMap::len).sum()
    }
}
