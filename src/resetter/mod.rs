// ABOUTME: Interval resetter module: turns capacity gates into per-interval limiters.
// ABOUTME: Periodically drives managed gates back to their floor.

mod config;
mod resetter;

pub use config::ResetterConfig;
pub use resetter::IntervalResetter;
