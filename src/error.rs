// ABOUTME: Defines all error types for the capgate library using thiserror.
// ABOUTME: Each component has its own error enum, unified under CapgateError.

use std::time::Duration;

/// Top-level error type for the capgate library.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapgateError {
    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Resetter error: {0}")]
    Resetter(#[from] ResetterError),
}

/// Errors from capacity gate operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GateError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    /// The reservation can never fit between the floor and the ceiling.
    #[error("Reservation of {amount} can never be admitted (limit {limit})")]
    UnsatisfiableReservation { amount: f64, limit: f64 },

    #[error("Reservation cancelled")]
    Cancelled,

    #[error("Reservation timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from interval resetter operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResetterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No tokio runtime available to drive the reset timer")]
    NoRuntime,
}
