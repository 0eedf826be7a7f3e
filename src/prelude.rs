// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use capgate::prelude::*;` to get started quickly.

pub use crate::error::{CapgateError, GateError, ResetterError};
pub use crate::gate::{CapacityGate, GateConfig, GateSnapshot, UnsatisfiablePolicy};
pub use crate::resetter::{IntervalResetter, ResetterConfig};
