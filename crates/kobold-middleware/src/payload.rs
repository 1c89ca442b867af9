//! Lenient field access shared by both dialect parsers.
//!
//! Vendors rename fields between firmware releases (`serial` / `serialNo`,
//! `name` / `nickname`), so every lookup accepts a list of candidate keys and
//! takes the first one present.

use kobold_types::{RobotSnapshot, StatusReport, Zone};
use serde_json::Value;

/// First string value found under any of `keys`.
pub(crate) fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// Like [`str_field`] but also accepts numeric identifiers.
pub(crate) fn id_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn bool_field(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

/// Battery level clamped to `0..=100`.
pub(crate) fn percent_field(value: &Value, key: &str) -> Option<u8> {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map(|v| v.clamp(0.0, 100.0).round() as u8)
}

/// Zones listed under `key`; entries without an id or name are skipped.
pub(crate) fn zones_field(value: &Value, key: &str) -> Vec<Zone> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|z| {
                    Some(Zone {
                        id: id_field(z, &["uuid", "id"])?,
                        name: str_field(z, &["name"])?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Fresh snapshot for a just-discovered robot: vendor-reported fields where
/// present, defaults everywhere else.
pub(crate) fn initial_snapshot(report: StatusReport) -> RobotSnapshot {
    let defaults = RobotSnapshot::default();
    RobotSnapshot {
        state: report.state.unwrap_or(defaults.state),
        battery_percent: report.battery_percent.unwrap_or(defaults.battery_percent),
        is_docked: report.is_docked.unwrap_or(defaults.is_docked),
        is_charging: report.is_charging.unwrap_or(defaults.is_charging),
        schedule_enabled: report.schedule_enabled.unwrap_or(defaults.schedule_enabled),
        ..defaults
    }
}
