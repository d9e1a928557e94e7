pub mod metadata;
pub mod timing;

pub use metadata::MetadataCheck;
pub use timing::{GapMean, TimingAnalyzer, TimingSummary, DEFAULT_SPIKE_THRESHOLD_PERCENT};
