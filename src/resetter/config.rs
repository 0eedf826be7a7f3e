// ABOUTME: Configuration for interval resetters.
// ABOUTME: An absent period leaves the resetter inert.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ResetterError;

/// Configuration for an [`IntervalResetter`](super::IntervalResetter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetterConfig {
    /// Reset period in milliseconds. `None` disables periodic resets.
    #[serde(default)]
    pub period_ms: Option<u64>,
}

impl ResetterConfig {
    /// Reset every `period`, rounded up to whole milliseconds.
    ///
    /// Sub-millisecond periods become 1ms; only a zero period stays zero.
    pub fn every(period: Duration) -> Self {
        let millis = period.as_nanos().div_ceil(1_000_000);
        Self {
            period_ms: Some(u64::try_from(millis).unwrap_or(u64::MAX)),
        }
    }

    /// A resetter that never fires on its own.
    pub fn inert() -> Self {
        Self { period_ms: None }
    }

    pub fn period(&self) -> Option<Duration> {
        self.period_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ResetterError> {
        if self.period_ms == Some(0) {
            return Err(ResetterError::InvalidConfiguration(
                "period must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
