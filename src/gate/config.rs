// ABOUTME: Construction-time configuration for capacity gates.
// ABOUTME: Serde-friendly config with builder-style setters and validation.

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// What a gate does with a reservation that can never fit under its ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsatisfiablePolicy {
    /// Keep the caller waiting until the ceiling is raised far enough.
    #[default]
    Wait,
    /// Fail with `GateError::UnsatisfiableReservation` instead of waiting.
    Reject,
}

/// Configuration for a [`CapacityGate`](super::CapacityGate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Admission ceiling.
    pub maximum: f64,

    /// Lowest value consumed capacity is clamped to.
    #[serde(default)]
    pub floor: f64,

    /// Initial consumed capacity. Defaults to `floor`.
    #[serde(default)]
    pub initial: Option<f64>,

    #[serde(default)]
    pub unsatisfiable: UnsatisfiablePolicy,
}

impl GateConfig {
    /// Create a config with the given ceiling and a floor of zero.
    pub fn new(maximum: f64) -> Self {
        Self {
            maximum,
            floor: 0.0,
            initial: None,
            unsatisfiable: UnsatisfiablePolicy::Wait,
        }
    }

    pub fn floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn initial(mut self, initial: f64) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn unsatisfiable(mut self, policy: UnsatisfiablePolicy) -> Self {
        self.unsatisfiable = policy;
        self
    }

    /// Starting consumed capacity, clamped to the floor.
    pub(crate) fn initial_consumed(&self) -> f64 {
        self.initial.unwrap_or(self.floor).max(self.floor)
    }

    /// Check that the config describes a usable gate.
    pub fn validate(&self) -> Result<(), GateError> {
        if !self.maximum.is_finite() {
            return Err(GateError::InvalidConfiguration(format!(
                "maximum must be finite, got {}",
                self.maximum
            )));
        }
        if !self.floor.is_finite() {
            return Err(GateError::InvalidConfiguration(format!(
                "floor must be finite, got {}",
                self.floor
            )));
        }
        if let Some(initial) = self.initial {
            if !initial.is_finite() {
                return Err(GateError::InvalidConfiguration(format!(
                    "initial must be finite, got {}",
                    initial
                )));
            }
        }
        if self.maximum < self.floor {
            return Err(GateError::InvalidConfiguration(format!(
                "maximum ({}) is below floor ({})",
                self.maximum, self.floor
            )));
        }
        Ok(())
    }
}
