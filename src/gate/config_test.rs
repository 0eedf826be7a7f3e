// ABOUTME: Tests for gate configuration parsing and validation.
// ABOUTME: Covers serde defaults, builder setters, and invalid configs.

use super::config::{GateConfig, UnsatisfiablePolicy};
use super::gate::CapacityGate;
use crate::error::GateError;

#[test]
fn test_deserialize_applies_defaults() {
    let config: GateConfig = serde_json::from_str(r#"{"maximum": 200}"#).unwrap();

    assert_eq!(config, GateConfig::new(200.0));
    assert_eq!(config.floor, 0.0);
    assert_eq!(config.initial, None);
    assert_eq!(config.unsatisfiable, UnsatisfiablePolicy::Wait);
}

#[test]
fn test_deserialize_full_config() {
    let json = r#"{
        "maximum": 200,
        "floor": -10,
        "initial": 50,
        "unsatisfiable": "reject"
    }"#;
    let config: GateConfig = serde_json::from_str(json).unwrap();

    assert_eq!(
        config,
        GateConfig::new(200.0)
            .floor(-10.0)
            .initial(50.0)
            .unsatisfiable(UnsatisfiablePolicy::Reject)
    );
}

#[test]
fn test_maximum_below_floor_is_invalid() {
    let result = CapacityGate::new(GateConfig::new(5.0).floor(10.0));

    match result {
        Err(GateError::InvalidConfiguration(message)) => {
            assert!(message.contains("below floor"), "got: {}", message);
        }
        other => panic!("Expected InvalidConfiguration, got {:?}", other),
    }
}

#[test]
fn test_non_finite_values_are_invalid() {
    let configs = [
        GateConfig::new(f64::NAN),
        GateConfig::new(f64::INFINITY),
        GateConfig::new(10.0).floor(f64::NEG_INFINITY),
        GateConfig::new(10.0).initial(f64::NAN),
    ];

    for config in configs {
        assert!(
            matches!(config.validate(), Err(GateError::InvalidConfiguration(_))),
            "{:?} should be rejected",
            config
        );
    }
}

#[test]
fn test_maximum_equal_to_floor_is_valid() {
    assert!(GateConfig::new(0.0).validate().is_ok());
    assert!(GateConfig::new(-5.0).floor(-5.0).validate().is_ok());
}
