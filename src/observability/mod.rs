pub mod logging;
pub mod report;

pub use logging::init_logging;
pub use report::RunReport;
