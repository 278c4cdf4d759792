//! Config validation: unknown-key detection with edit-distance suggestions.
//!
//! The raw TOML is walked as a `toml::Value` tree before serde sees it, so a
//! misspelt key (which serde would silently replace with its default) is
//! reported with a "did you mean" hint. Warnings never reject a config.

use std::collections::HashSet;

/// A non-fatal config warning.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

/// Every valid dotted key path of `MonitorConfig`.
///
/// Kept by hand in step with monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "sensor",
        "sensor.kind",
        "sensor.command",
        "sensor.read_timeout_ms",
        "sensor.sim_seed",
        "sensor.sim_base_temp_c",
        "actuator",
        "actuator.endpoint",
        "actuator.activate_command",
        "actuator.deactivate_command",
        "actuator.settle_ms",
        "actuator.write_timeout_ms",
        "actuator.response_timeout_ms",
        "actuator.connect_timeout_secs",
        "control",
        "control.threshold_c",
        "schedule",
        "schedule.tick_ms",
        "schedule.window_secs",
        "schedule.cycle_secs",
        "schedule.cycles_per_hour",
        "schedule.hour_secs",
        "forecast",
        "forecast.horizon",
        "storage",
        "storage.log_path",
        "storage.data_dir",
        "history",
        "history.max_records",
        "history.resume_from_log",
        "retention",
        "retention.enabled",
        "retention.max_age_days",
        "retention.interval_secs",
        "logging",
        "logging.level",
        "logging.json",
        "logging.file",
        "server",
        "server.addr",
        "server.portal_url",
    ];
    keys.iter().copied().collect()
}

/// Collect every dotted key path in a TOML tree.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest known key within edit distance 3, ties broken alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut candidates: Vec<(usize, &str)> = known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(d, _)| *d <= 3)
        .collect();
    candidates.sort_unstable();
    candidates.first().map(|(_, k)| (*k).to_string())
}

/// Warn about every key in `raw_toml` that `MonitorConfig` does not define.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        // parse errors are reported by serde afterwards
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("window", "window"), 0);
        assert_eq!(levenshtein("windw", "window"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys("[control]\nthreshhold_c = 36.0\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "control.threshhold_c");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("control.threshold_c"));
    }

    #[test]
    fn test_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[sensor]
kind = "simulated"
sim_seed = 7

[schedule]
tick_ms = 1000
window_secs = 600

[server]
addr = "127.0.0.1:5000"
"#;
        assert!(validate_unknown_keys(toml_str).is_empty());
    }

    #[test]
    fn test_unknown_section_without_close_match() {
        let warnings = validate_unknown_keys("[fleet]\nhub = \"x\"\n");
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.field == "fleet"));
        assert!(warnings.iter().any(|w| w.field == "fleet.hub"));
    }

    #[test]
    fn test_known_keys_cover_default_config() {
        let config = super::super::MonitorConfig::default();
        let text = toml::to_string(&config).expect("serialize defaults");
        let value: toml::Value = text.parse().expect("reparse");
        let known = known_config_keys();
        for key in walk_toml_keys(&value, "") {
            assert!(known.contains(key.as_str()), "missing known key: {key}");
        }
    }
}
