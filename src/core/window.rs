use std::ops::Range;

/// Half-open range `[start, end)` of the frame log, tagged with the state the
/// harness had requested for those frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleWindow {
    pub start: u64,
    pub end: u64,
    pub expected: bool,
}

impl ToggleWindow {
    pub fn new(start: u64, end: u64, expected: bool) -> Self {
        Self {
            start,
            end: end.max(start),
            expected,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }
}
