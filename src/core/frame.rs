use serde::{Deserialize, Serialize};

/// One observed frame, as recorded by a [`StreamMonitor`](super::StreamMonitor)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameEvent {
    /// Arrival order within the session, starting at 0
    pub sequence: u64,

    /// Host monotonic time of arrival in milliseconds
    pub host_timestamp: f64,

    /// Tracked metadata field, `None` if the device did not attach it
    pub metadata: Option<i64>,
}

impl FrameEvent {
    pub fn new(sequence: u64, host_timestamp: f64, metadata: Option<i64>) -> Self {
        Self {
            sequence,
            host_timestamp,
            metadata,
        }
    }

    /// Boolean state carried by the metadata field (`0` = off, nonzero = on).
    /// Frames without the field are not comparable.
    pub fn flag(&self) -> Option<bool> {
        self.metadata.map(|value| value != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_follows_nonzero_convention() {
        assert_eq!(FrameEvent::new(0, 0.0, Some(0)).flag(), Some(false));
        assert_eq!(FrameEvent::new(1, 1.0, Some(1)).flag(), Some(true));
        assert_eq!(FrameEvent::new(2, 2.0, Some(-3)).flag(), Some(true));
        assert_eq!(FrameEvent::new(3, 3.0, None).flag(), None);
    }
}
