use log::trace;

use crate::memory::FrameEntry;

/// Second-chance page replacement over the RAM frame array.
///
/// The hand persists across calls; only [`ClockAlgorithm::reset`] rewinds it.
#[derive(Debug, Default)]
pub struct ClockAlgorithm {
    pointer: usize,
}

impl ClockAlgorithm {
    pub fn new() -> Self {
        ClockAlgorithm { pointer: 0 }
    }

    #[inline]
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn reset(&mut self) {
        self.pointer = 0;
    }

    #[inline]
    fn advance(&mut self, num_frames: usize) {
        self.pointer = (self.pointer + 1) % num_frames;
    }

    /// Pick the frame to (re)use for the next page load.
    ///
    /// Empty frames win immediately. Occupied frames with the referenced bit
    /// set get it cleared and are skipped. The scan is bounded to
    /// `2 * num_frames` steps; past that the frame under the hand is taken.
    /// Returns `None` only when there are no frames at all.
    pub fn find_victim(&mut self, frames: &mut [Option<FrameEntry>]) -> Option<usize> {
        let num_frames = frames.len();
        if num_frames == 0 {
            return None;
        }
        self.pointer %= num_frames;

        for _ in 0..num_frames * 2 {
            let index = self.pointer;
            match frames[index].as_mut() {
                None => {
                    self.advance(num_frames);
                    return Some(index);
                }
                Some(entry) if !entry.page.referenced => {
                    self.advance(num_frames);
                    return Some(index);
                }
                Some(entry) => {
                    trace!(
                        "clock: second chance for pid {} page {} in frame {}",
                        entry.owner, entry.page.page_number, index
                    );
                    entry.page.referenced = false;
                    self.advance(num_frames);
                }
            }
        }

        // Only reachable if something re-sets the bits while we scan.
        let index = self.pointer;
        self.advance(num_frames);
        Some(index)
    }
}
