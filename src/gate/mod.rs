// ABOUTME: Capacity gate module: async admission against a configurable ceiling.
// ABOUTME: Contains the gate, its configuration, and the published snapshot type.

mod config;
mod gate;

pub use config::{GateConfig, UnsatisfiablePolicy};
pub use gate::{CapacityGate, GateSnapshot};

#[cfg(test)]
mod config_test;
