//! Config Validation Tests
//!
//! Exercises the shipped example config, typo detection and range checks
//! through the public config API, independently from the control loop.

use thermowatch::config::validation::validate_unknown_keys;
use thermowatch::config::{ConfigError, MonitorConfig, SensorKind};

const EXAMPLE: &str = include_str!("../thermowatch.toml.example");

#[test]
fn example_config_loads_without_warnings() {
    assert!(validate_unknown_keys(EXAMPLE).is_empty());

    let config = MonitorConfig::from_toml_str(EXAMPLE).unwrap();
    assert_eq!(config.sensor.kind, SensorKind::Process);
    assert_eq!(config.sensor.command, ["python3", "read_amg8833.py"]);
    assert_eq!(config.control.threshold_c, 35.0);
    assert_eq!(config.schedule.cycles_per_hour, 6);
    assert_eq!(config.retention.max_age_days, 30);
}

#[test]
fn typo_in_schedule_warns_with_suggestion() {
    let toml_str = r#"
[schedule]
windw_secs = 300
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("windw_secs"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("schedule.window_secs"));

    // The misspelt key falls back to its default rather than failing
    let config = MonitorConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.schedule.window_secs, 600);
}

#[test]
fn zero_durations_rejected_together() {
    let toml_str = r#"
[schedule]
tick_ms = 0
cycle_secs = 0

[retention]
max_age_days = 0
"#;
    match MonitorConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 3, "{errors:?}");
            assert!(errors.iter().any(|e| e.contains("schedule.tick_ms")));
            assert!(errors.iter().any(|e| e.contains("retention.max_age_days")));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn wrong_value_type_is_parse_error() {
    let toml_str = r#"
[control]
threshold_c = "hot"
"#;
    assert!(matches!(
        MonitorConfig::from_toml_str(toml_str),
        Err(ConfigError::Parse(..))
    ));
}
