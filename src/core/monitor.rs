use parking_lot::RwLock;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::FrameEvent;
use crate::hal::{Frame, MetadataField};

/// Append-only log of the frames delivered during one streaming session.
///
/// The device's delivery thread is the only writer; the control side reads
/// `count()` and takes snapshots. A monitor must not outlive its session:
/// a stale count would satisfy barrier waits with frames from an earlier stream.
pub struct StreamMonitor {
    field: MetadataField,
    origin: Instant,
    count: AtomicU64,
    events: RwLock<Vec<FrameEvent>>,
}

impl StreamMonitor {
    /// Create a monitor tracking `field` on every recorded frame
    pub fn new(field: MetadataField) -> Self {
        Self {
            field,
            origin: Instant::now(),
            count: AtomicU64::new(0),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Metadata field extracted from each frame
    pub fn field(&self) -> MetadataField {
        self.field
    }

    /// Record a delivered frame. Called from the device's delivery context.
    pub fn record(&self, frame: &Frame) {
        self.record_metadata(frame.metadata(self.field));
    }

    /// Record an arrival carrying an already extracted metadata value
    pub fn record_metadata(&self, metadata: Option<i64>) {
        let mut events = self.events.write();
        let sequence = events.len() as u64;
        let host_timestamp = self.origin.elapsed().as_secs_f64() * 1000.0;
        events.push(FrameEvent::new(sequence, host_timestamp, metadata));
        // Published only after the append so a reader never sees an unlogged frame
        self.count.store(sequence + 1, Ordering::Release);
    }

    /// Number of frames recorded so far
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Copy of the events in `range`, truncated to what has been recorded
    pub fn snapshot(&self, range: Range<u64>) -> Vec<FrameEvent> {
        let end = range.end.min(self.count());
        let start = range.start.min(end);

        let events = self.events.read();
        events[start as usize..end as usize].to_vec()
    }

    /// Copy of every event recorded so far
    pub fn snapshot_all(&self) -> Vec<FrameEvent> {
        self.snapshot(0..u64::MAX)
    }

    /// Host arrival timestamps (ms) of every event recorded so far
    pub fn timestamps(&self) -> Vec<f64> {
        self.timestamps_from(0)
    }

    /// Host arrival timestamps (ms) of the events from sequence `start` on.
    /// Only the tail is copied under the read lock.
    pub fn timestamps_from(&self, start: u64) -> Vec<f64> {
        let end = self.count();
        let start = start.min(end);

        let events = self.events.read();
        events[start as usize..end as usize]
            .iter()
            .map(|event| event.host_timestamp)
            .collect()
    }
}
