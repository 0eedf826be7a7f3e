// ABOUTME: Root module for capgate - async capacity gates and interval resetters.
// ABOUTME: Re-exports all public types from submodules.

//! In-process capacity limiting.
//!
//! A [`CapacityGate`] admits reservations of an abstract capacity against a
//! ceiling and parks callers that do not fit until capacity is released. An
//! [`IntervalResetter`] attached to a gate resets its consumption on a fixed
//! period, turning it into a capacity-per-interval limiter.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use capgate::prelude::*;
//!
//! # async fn demo() -> Result<(), CapgateError> {
//! let gate = Arc::new(CapacityGate::new(GateConfig::new(100.0))?);
//! let _resetter =
//!     IntervalResetter::for_gate(ResetterConfig::every(Duration::from_secs(1)), &gate)?;
//!
//! // At most 100 units per second.
//! gate.reserve(10.0).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gate;
pub mod prelude;
pub mod resetter;

pub use error::{CapgateError, GateError, ResetterError};
pub use gate::{CapacityGate, GateConfig, GateSnapshot, UnsatisfiablePolicy};
pub use resetter::{IntervalResetter, ResetterConfig};
