pub mod agg;
pub mod percentile;
pub mod window;

pub use agg::{RunningStats, per_sec};
pub use percentile::{ResponseTimeSummary, percentile};
pub use window::{LiveWindow, WindowSnapshot};
