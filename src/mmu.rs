use std::collections::{HashMap, VecDeque};
use std::fmt;

use log::{debug, warn};

use crate::Pid;
use crate::clock::ClockAlgorithm;
use crate::constants::MAX_EVENT_HISTORY;
use crate::error::{Result, SimError};
use crate::memory::{Disk, FrameEntry, Page, Ram};
use crate::observer::Listener;
use crate::process::Process;
use crate::translation::{AccessResult, PageLocation, PageTable, page_count};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuEventKind {
    Hit,
    Fault,
    /// A resident page was written back to disk to make room.
    Swap,
    /// A page was brought in from disk.
    Load,
}

impl MmuEventKind {
    /// Event tag as shown in logs and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            MmuEventKind::Hit => "PAGE_HIT",
            MmuEventKind::Fault => "PAGE_FAULT",
            MmuEventKind::Swap => "PAGE_SWAP",
            MmuEventKind::Load => "PAGE_LOAD",
        }
    }
}

impl fmt::Display for MmuEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmuEvent {
    pub kind: MmuEventKind,
    pub timestamp: u64,
    pub pid: Pid,
    pub page_number: usize,
    pub frame: Option<usize>,
    /// `(owner, page_number)` of the page pushed out, for swap events.
    pub victim: Option<(Pid, usize)>,
}

impl fmt::Display for MmuEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} P{} page {}", self.timestamp, self.kind, self.pid, self.page_number)?;
        if let Some(frame) = self.frame {
            write!(f, " frame {}", frame)?;
        }
        if let Some((pid, page)) = self.victim {
            write!(f, " (victim P{} page {})", pid, page)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmuStats {
    pub page_faults: u64,
    pub page_hits: u64,
    pub swap_count: u64,
    pub hit_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSummary {
    pub in_ram: usize,
    pub on_disk: usize,
    pub total: usize,
}

/// Memory management unit: owns RAM, disk, the clock hand and every page
/// table, and drives demand paging.
pub struct Mmu {
    ram: Ram,
    disk: Disk,
    clock: ClockAlgorithm,
    page_tables: HashMap<Pid, PageTable>,
    page_faults: u64,
    page_hits: u64,
    swap_count: u64,
    events: VecDeque<MmuEvent>,
    event_limit: usize,
    on_event: Listener<MmuEvent>,
    now: u64,
}

impl Mmu {
    /// MMU with the default event-history cap.
    pub fn new(ram: Ram, disk: Disk) -> Self {
        Self::with_event_limit(ram, disk, MAX_EVENT_HISTORY)
    }

    /// MMU keeping at most `event_limit` events; 0 keeps none.
    pub fn with_event_limit(ram: Ram, disk: Disk, event_limit: usize) -> Self {
        Mmu {
            ram,
            disk,
            clock: ClockAlgorithm::new(),
            page_tables: HashMap::new(),
            page_faults: 0,
            page_hits: 0,
            swap_count: 0,
            events: VecDeque::with_capacity(event_limit),
            event_limit,
            on_event: Listener::new(),
            now: 0,
        }
    }

    /// Simulated time stamped onto events and page loads.
    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    /// Build the page table for a newly admitted process.
    ///
    /// Every page starts on disk (pure demand paging). Calling this again for
    /// a process that already has a table leaves the table untouched.
    pub fn initialize_process(&mut self, process: &mut Process) -> Result<()> {
        let pid = process.pid();
        if let Some(table) = self.page_tables.get(&pid) {
            debug!("mmu: process {} already has a page table", pid);
            process.assign_pages((0..table.len()).collect());
            return Ok(());
        }

        let page_size = self.ram.page_size();
        if page_size == 0 {
            return Err(SimError::InvalidConfig("page size must be positive".to_string()));
        }
        let num_pages = page_count(process.memory_size(), page_size);
        for page_number in 0..num_pages {
            self.disk.store_page(pid, Page::new(page_number, page_size));
        }
        self.page_tables.insert(pid, PageTable::new(num_pages));
        process.assign_pages((0..num_pages).collect());

        debug!(
            "mmu: process {} gets {} pages ({} bytes), all on disk",
            pid,
            num_pages,
            process.memory_size()
        );
        Ok(())
    }

    fn location(&self, pid: Pid, page_number: usize) -> Result<PageLocation> {
        let table = self
            .page_tables
            .get(&pid)
            .ok_or(SimError::MissingPageTable { pid })?;
        table.get(page_number).ok_or(SimError::InvalidPageNumber {
            pid,
            page_number,
            page_count: table.len(),
        })
    }

    /// Translate `(pid, page_number)`.
    ///
    /// A resident page gets its referenced bit set and counts as a hit. A
    /// page on disk counts as a fault and is returned as
    /// [`AccessResult::Fault`]; resolving it is the caller's job.
    pub fn access_memory(&mut self, pid: Pid, page_number: usize) -> Result<AccessResult> {
        match self.location(pid, page_number)? {
            PageLocation::Frame(index) => {
                match self.ram.get_frame_mut(index) {
                    Some(entry) if entry.owner == pid && entry.page.page_number == page_number => {
                        entry.page.referenced = true;
                        entry.page.access_count += 1;
                    }
                    _ => {
                        return Err(SimError::Invariant(format!(
                            "page table maps P{} page {} to frame {}, which holds something else",
                            pid, page_number, index
                        )));
                    }
                }
                self.page_hits += 1;
                self.record(MmuEventKind::Hit, pid, page_number, Some(index), None);
                Ok(AccessResult::Resident(index))
            }
            PageLocation::OnDisk => {
                self.page_faults += 1;
                self.record(MmuEventKind::Fault, pid, page_number, None, None);
                Ok(AccessResult::Fault)
            }
        }
    }

    /// Bring a faulted page in from disk, evicting with the clock if needed.
    /// Returns the frame it now occupies.
    pub fn handle_page_fault(&mut self, pid: Pid, page_number: usize) -> Result<usize> {
        if let PageLocation::Frame(index) = self.location(pid, page_number)? {
            debug!("mmu: P{} page {} already resident in frame {}", pid, page_number, index);
            return Ok(index);
        }
        // Checked before eviction so a corrupt table leaves RAM untouched.
        if !self.disk.contains(pid, page_number) {
            return Err(SimError::MissingDiskPage { pid, page_number });
        }

        let victim_index = self
            .clock
            .find_victim(self.ram.frames_mut())
            .ok_or(SimError::NoFrames)?;

        if let Some(victim) = self.ram.allocate_frame(victim_index, None) {
            self.swap_out(victim_index, victim);
        }

        let mut page = self
            .disk
            .get_page(pid, page_number)
            .ok_or(SimError::MissingDiskPage { pid, page_number })?;
        page.referenced = true;
        page.modified = false;
        page.loaded_at = Some(self.now);
        self.ram
            .allocate_frame(victim_index, Some(FrameEntry { owner: pid, page }));
        if let Some(table) = self.page_tables.get_mut(&pid) {
            table.set(page_number, PageLocation::Frame(victim_index));
        }
        self.record(MmuEventKind::Load, pid, page_number, Some(victim_index), None);
        Ok(victim_index)
    }

    fn swap_out(&mut self, frame: usize, victim: FrameEntry) {
        let FrameEntry { owner, mut page } = victim;
        let page_number = page.page_number;

        let Some(table) = self.page_tables.get_mut(&owner) else {
            warn!(
                "mmu: frame {} held P{} page {} with no page table; dropping it",
                frame, owner, page_number
            );
            return;
        };
        table.set(page_number, PageLocation::OnDisk);

        if page.modified {
            // Contents are filler, so the write-back is bookkeeping only.
            debug!("mmu: writing back dirty P{} page {}", owner, page_number);
            page.modified = false;
        }
        page.referenced = false;
        self.disk.store_page(owner, page);
        self.swap_count += 1;
        self.record(
            MmuEventKind::Swap,
            owner,
            page_number,
            Some(frame),
            Some((owner, page_number)),
        );
    }

    /// Release everything a terminated process holds: frames, swapped pages
    /// and its page table.
    pub fn free_process_memory(&mut self, pid: Pid) -> Result<()> {
        if self.page_tables.remove(&pid).is_none() {
            return Err(SimError::MissingPageTable { pid });
        }
        let frames = self.ram.free_frames(pid);
        let swapped = self.disk.clear_pages(pid);
        debug!(
            "mmu: freed P{} ({} frames, {} disk pages)",
            pid, frames, swapped
        );
        Ok(())
    }

    fn record(
        &mut self,
        kind: MmuEventKind,
        pid: Pid,
        page_number: usize,
        frame: Option<usize>,
        victim: Option<(Pid, usize)>,
    ) {
        let event = MmuEvent {
            kind,
            timestamp: self.now,
            pid,
            page_number,
            frame,
            victim,
        };
        debug!("mmu: {}", event);

        if self.event_limit > 0 {
            if self.events.len() == self.event_limit {
                self.events.pop_front();
            }
            self.events.push_back(event.clone());
        }
        self.on_event.notify(&event);
    }

    /// Faults counted since the last statistics reset.
    #[inline]
    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    /// Hits counted since the last statistics reset.
    #[inline]
    pub fn page_hits(&self) -> u64 {
        self.page_hits
    }

    /// Pages written back to disk to free a frame.
    #[inline]
    pub fn swap_count(&self) -> u64 {
        self.swap_count
    }

    /// hits / (hits + faults), or 0 before any access.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.page_hits + self.page_faults;
        if total == 0 {
            return 0.0;
        }
        self.page_hits as f64 / total as f64
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> MmuStats {
        MmuStats {
            page_faults: self.page_faults,
            page_hits: self.page_hits,
            swap_count: self.swap_count,
            hit_ratio: self.hit_ratio(),
        }
    }

    /// Zero the counters and clear the event history.
    pub fn reset_statistics(&mut self) {
        self.page_faults = 0;
        self.page_hits = 0;
        self.swap_count = 0;
        self.events.clear();
    }

    /// Full reset: empty RAM and disk, drop all page tables, rewind the hand.
    pub fn reset(&mut self) {
        let num_frames = self.ram.num_frames();
        let page_size = self.ram.page_size();
        self.ram = Ram::new(num_frames, page_size);
        self.disk = Disk::new();
        self.page_tables.clear();
        self.clock.reset();
        self.reset_statistics();
        self.now = 0;
    }

    /// Oldest first, capped at the configured limit.
    pub fn events(&self) -> &VecDeque<MmuEvent> {
        &self.events
    }

    /// The newest `count` events, oldest first.
    pub fn recent_events(&self, count: usize) -> impl Iterator<Item = &MmuEvent> {
        self.events.iter().skip(self.events.len().saturating_sub(count))
    }

    /// Subscription slot for paging events.
    pub fn on_event(&mut self) -> &mut Listener<MmuEvent> {
        &mut self.on_event
    }

    /// Read-only view of RAM.
    #[inline]
    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    /// Read-only view of the swap area.
    #[inline]
    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    /// The replacement hand.
    #[inline]
    pub fn clock(&self) -> &ClockAlgorithm {
        &self.clock
    }

    /// Whether `pid` is registered with the MMU.
    pub fn has_page_table(&self, pid: Pid) -> bool {
        self.page_tables.contains_key(&pid)
    }

    /// Page table of `pid`, if registered.
    pub fn page_table(&self, pid: Pid) -> Option<&PageTable> {
        self.page_tables.get(&pid)
    }

    /// How many of `pid`'s pages are resident and how many are on disk.
    pub fn memory_location_summary(&self, pid: Pid) -> Option<LocationSummary> {
        self.page_tables.get(&pid).map(|table| LocationSummary {
            in_ram: table.resident_count(),
            on_disk: table.on_disk_count(),
            total: table.len(),
        })
    }

    /// Verify that every registered page is either in exactly the frame its
    /// table names or on disk, and that RAM and disk hold nothing else.
    pub fn check_invariants(&self) -> Result<()> {
        let mut accounted_frames = 0;
        let mut accounted_disk = 0;

        for (&pid, table) in &self.page_tables {
            for (page_number, location) in table.iter() {
                let on_disk = self.disk.contains(pid, page_number);
                match location {
                    PageLocation::Frame(index) => {
                        let holds = self.ram.get_frame(index).is_some_and(|f| {
                            f.owner == pid && f.page.page_number == page_number
                        });
                        if !holds || on_disk {
                            return Err(SimError::Invariant(format!(
                                "P{} page {} should be in frame {} only",
                                pid, page_number, index
                            )));
                        }
                        accounted_frames += 1;
                    }
                    PageLocation::OnDisk => {
                        if !on_disk || self.ram.find_page(pid, page_number).is_some() {
                            return Err(SimError::Invariant(format!(
                                "P{} page {} should be on disk only",
                                pid, page_number
                            )));
                        }
                        accounted_disk += 1;
                    }
                }
            }
        }

        if accounted_frames != self.ram.occupied_frames() {
            return Err(SimError::Invariant(format!(
                "{} occupied frames but {} resident pages in page tables",
                self.ram.occupied_frames(),
                accounted_frames
            )));
        }
        if accounted_disk != self.disk.total_pages() {
            return Err(SimError::Invariant(format!(
                "{} pages on disk but {} in page tables",
                self.disk.total_pages(),
                accounted_disk
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mmu(frames: usize) -> Mmu {
        Mmu::new(Ram::new(frames, 4096), Disk::new())
    }

    fn admit(mmu: &mut Mmu, pid: Pid, memory_size: usize) -> Process {
        let mut process = Process::new(pid, false, memory_size);
        mmu.initialize_process(&mut process).unwrap();
        process
    }

    #[test]
    fn test_initialize_process_populates_table() {
        let mut mmu = mmu(4);
        let process = admit(&mut mmu, 1, 10_000);

        assert_eq!(process.pages().len(), 3);
        let table = mmu.page_table(1).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.iter().all(|(_, l)| l == PageLocation::OnDisk));
        assert_eq!(mmu.disk().process_pages(1).map(|p| p.len()), Some(3));
        mmu.check_invariants().unwrap();
    }

    #[test]
    fn test_initialize_process_is_idempotent() {
        let mut mmu = mmu(4);
        let mut process = admit(&mut mmu, 1, 8192);
        mmu.initialize_process(&mut process).unwrap();

        assert_eq!(process.pages().len(), 2);
        assert_eq!(mmu.disk().total_pages(), 2);
        mmu.check_invariants().unwrap();
    }

    #[test]
    fn test_initialize_process_rejects_zero_page_size() {
        let mut mmu = Mmu::new(Ram::new(4, 0), Disk::new());
        let mut process = Process::new(1, false, 4096);
        assert!(matches!(
            mmu.initialize_process(&mut process),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(!mmu.has_page_table(1));
        assert!(process.pages().is_empty());
    }

    #[test]
    fn test_fault_then_hit() {
        let mut mmu = mmu(4);
        admit(&mut mmu, 1, 16384);

        assert_eq!(mmu.access_memory(1, 2).unwrap(), AccessResult::Fault);
        assert_eq!(mmu.page_faults(), 1);
        assert_eq!(mmu.page_hits(), 0);

        let frame = mmu.handle_page_fault(1, 2).unwrap();
        assert_eq!(frame, 0);
        assert_eq!(mmu.swap_count(), 0);
        assert!(!mmu.disk().contains(1, 2));

        assert_eq!(mmu.access_memory(1, 2).unwrap(), AccessResult::Resident(0));
        assert_eq!(mmu.page_hits(), 1);
        assert_eq!(mmu.page_faults(), 1);
        assert_eq!(mmu.ram().get_frame(0).unwrap().page.access_count, 1);
        mmu.check_invariants().unwrap();
    }

    #[test]
    fn test_eviction_moves_victim_to_disk() {
        let mut mmu = mmu(1);
        admit(&mut mmu, 1, 8192);

        mmu.access_memory(1, 0).unwrap();
        mmu.handle_page_fault(1, 0).unwrap();
        mmu.access_memory(1, 1).unwrap();
        let frame = mmu.handle_page_fault(1, 1).unwrap();

        assert_eq!(frame, 0);
        assert_eq!(mmu.swap_count(), 1);
        assert!(mmu.disk().contains(1, 0));
        assert_eq!(mmu.page_table(1).unwrap().get(0), Some(PageLocation::OnDisk));
        assert_eq!(mmu.page_table(1).unwrap().get(1), Some(PageLocation::Frame(0)));
        mmu.check_invariants().unwrap();
    }

    #[test]
    fn test_missing_page_table() {
        let mut mmu = mmu(2);
        assert!(matches!(
            mmu.access_memory(9, 0),
            Err(SimError::MissingPageTable { pid: 9 })
        ));
        assert!(matches!(
            mmu.free_process_memory(9),
            Err(SimError::MissingPageTable { pid: 9 })
        ));
    }

    #[test]
    fn test_invalid_page_number() {
        let mut mmu = mmu(2);
        admit(&mut mmu, 1, 4096);
        assert!(matches!(
            mmu.access_memory(1, 1),
            Err(SimError::InvalidPageNumber { page_count: 1, .. })
        ));
    }

    #[test]
    fn test_missing_disk_page_is_reported() {
        let mut mmu = mmu(2);
        admit(&mut mmu, 1, 4096);
        mmu.disk.get_page(1, 0);

        assert!(matches!(
            mmu.handle_page_fault(1, 0),
            Err(SimError::MissingDiskPage { pid: 1, page_number: 0 })
        ));
        // nothing was evicted or loaded
        assert_eq!(mmu.ram().occupied_frames(), 0);
        assert_eq!(mmu.clock().pointer(), 0);
    }

    #[test]
    fn test_no_frames() {
        let mut mmu = mmu(0);
        admit(&mut mmu, 1, 4096);
        assert!(matches!(mmu.handle_page_fault(1, 0), Err(SimError::NoFrames)));
    }

    #[test]
    fn test_free_process_memory() {
        let mut mmu = mmu(2);
        admit(&mut mmu, 1, 3 * 4096);
        admit(&mut mmu, 2, 4096);
        mmu.handle_page_fault(1, 0).unwrap();
        mmu.handle_page_fault(2, 0).unwrap();

        mmu.free_process_memory(1).unwrap();
        assert_eq!(mmu.ram().process_frame_count(1), 0);
        assert!(!mmu.disk().has_pages(1));
        assert!(!mmu.has_page_table(1));
        assert_eq!(mmu.ram().process_frame_count(2), 1);
        mmu.check_invariants().unwrap();
    }

    #[test]
    fn test_hit_ratio() {
        let mut mmu = mmu(2);
        assert_eq!(mmu.hit_ratio(), 0.0);
        admit(&mut mmu, 1, 4096);
        mmu.access_memory(1, 0).unwrap();
        mmu.handle_page_fault(1, 0).unwrap();
        for _ in 0..3 {
            mmu.access_memory(1, 0).unwrap();
        }
        assert_eq!(mmu.hit_ratio(), 0.75);

        mmu.reset_statistics();
        assert_eq!(mmu.stats().page_hits, 0);
        assert_eq!(mmu.hit_ratio(), 0.0);
        assert!(mmu.events().is_empty());
    }

    #[test]
    fn test_event_history_is_capped() {
        let mut mmu = Mmu::with_event_limit(Ram::new(2, 4096), Disk::new(), 3);
        admit(&mut mmu, 1, 4096);
        mmu.access_memory(1, 0).unwrap();
        mmu.handle_page_fault(1, 0).unwrap();
        mmu.set_time(500);
        mmu.access_memory(1, 0).unwrap();
        mmu.access_memory(1, 0).unwrap();

        let kinds: Vec<_> = mmu.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![MmuEventKind::Load, MmuEventKind::Hit, MmuEventKind::Hit]);
        assert_eq!(mmu.recent_events(1).count(), 1);
        assert_eq!(mmu.recent_events(10).count(), 3);
        assert_eq!(mmu.events().back().unwrap().timestamp, 500);
    }

    #[test]
    fn test_listener_sees_every_event() {
        let mut mmu = mmu(1);
        let rx = mmu.on_event().channel();
        admit(&mut mmu, 1, 8192);
        mmu.access_memory(1, 0).unwrap();
        mmu.handle_page_fault(1, 0).unwrap();
        mmu.handle_page_fault(1, 1).unwrap();

        let kinds: Vec<_> = rx.try_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MmuEventKind::Fault,
                MmuEventKind::Load,
                MmuEventKind::Swap,
                MmuEventKind::Load
            ]
        );
    }

    #[test]
    fn test_location_summary_and_reset() {
        let mut mmu = mmu(2);
        admit(&mut mmu, 1, 3 * 4096);
        mmu.handle_page_fault(1, 1).unwrap();

        let summary = mmu.memory_location_summary(1).unwrap();
        assert_eq!(summary, LocationSummary { in_ram: 1, on_disk: 2, total: 3 });

        mmu.reset();
        assert!(mmu.memory_location_summary(1).is_none());
        assert_eq!(mmu.ram().occupied_frames(), 0);
        assert_eq!(mmu.disk().total_pages(), 0);
        assert_eq!(mmu.clock().pointer(), 0);
    }
}
