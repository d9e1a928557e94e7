use std::ops::Range;

use crate::core::{FrameEvent, ToggleWindow};

/// Outcome of comparing a range of frames against an expected flag state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataCheck {
    /// Frames that carried the field
    pub compared: u64,
    /// Frames without the field, neither pass nor fail
    pub skipped: u64,
    pub mismatches: u64,
    /// Sequence number of the first mismatching frame
    pub first_mismatch: Option<u64>,
}

impl MetadataCheck {
    pub fn merge(&mut self, other: MetadataCheck) {
        self.compared += other.compared;
        self.skipped += other.skipped;
        self.mismatches += other.mismatches;
        self.first_mismatch = self.first_mismatch.or(other.first_mismatch);
    }
}

/// Compare `events[range]` against `expected`. The range is clamped to the slice.
pub fn check(events: &[FrameEvent], range: Range<usize>, expected: bool) -> MetadataCheck {
    let end = range.end.min(events.len());
    let start = range.start.min(end);

    let mut result = MetadataCheck::default();
    for event in &events[start..end] {
        match event.flag() {
            None => result.skipped += 1,
            Some(observed) => {
                result.compared += 1;
                if observed != expected {
                    result.mismatches += 1;
                    result.first_mismatch.get_or_insert(event.sequence);
                }
            }
        }
    }
    result
}

/// Number of frames in `events[range]` whose flag disagrees with `expected`
pub fn mismatches(events: &[FrameEvent], range: Range<usize>, expected: bool) -> u64 {
    check(events, range, expected).mismatches
}

/// Check a window of a full-log snapshot (`events[i].sequence == i`)
pub fn check_window(events: &[FrameEvent], window: &ToggleWindow) -> MetadataCheck {
    check(events, window.start as usize..window.end as usize, window.expected)
}
