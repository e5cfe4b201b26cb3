use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::metrics::{HistoricalRollup, TechnicianMetrics};

pub fn normalize_ratio(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Builds one metrics value from the latest daily snapshot and the
/// technician's historical rollup. Either record may be missing or carry
/// junk in any field; such fields come out absent.
pub fn normalize(daily: Option<&Value>, fallback: Option<&Value>) -> TechnicianMetrics {
    let mut metrics = normalize_raw(daily, fallback);
    derive_ratios(&mut metrics);
    metrics
}

/// Same as [`normalize`] but without deriving ratios, so later stages can
/// still change the minute fields.
pub fn normalize_raw(daily: Option<&Value>, fallback: Option<&Value>) -> TechnicianMetrics {
    let rollup = fallback.map(|stats| HistoricalRollup {
        jobs_completed_total: count_field(stats, &["jobsCompleted"]),
        avg_duration_ms: count_field(stats, &["avgDurationMs"]),
        total_duration_ms: count_field(stats, &["totalDurationMs"]),
    });

    let avg_rating = daily
        .and_then(|d| number_field(d, &["avgRating"]))
        .or_else(|| fallback.and_then(|f| number_field(f, &["avgRating", "rating"])));

    TechnicianMetrics {
        available_minutes: daily.and_then(|d| count_field(d, &["availableMinutes"])),
        actual_minutes: daily.and_then(|d| count_field(d, &["actualMinutes"])),
        billed_minutes: daily.and_then(|d| count_field(d, &["billedMinutes"])),
        efficiency: daily.and_then(|d| number_field(d, &["efficiency"])),
        productivity: daily.and_then(|d| number_field(d, &["productivity"])),
        proficiency: daily.and_then(|d| number_field(d, &["proficiency"])),
        avg_rating,
        jobs_completed: daily.and_then(|d| count_field(d, &["jobsCompleted"])),
        rollup: rollup.filter(|r| !r.is_empty()),
    }
}

/// Fills the ratios that are still absent from the minute fields. Ratios
/// already present are left untouched.
pub fn derive_ratios(metrics: &mut TechnicianMetrics) {
    if metrics.productivity.is_none() {
        metrics.productivity = ratio(metrics.actual_minutes, metrics.available_minutes);
    }
    if metrics.efficiency.is_none() {
        metrics.efficiency = ratio(metrics.billed_minutes, metrics.actual_minutes);
    }
    if metrics.proficiency.is_none() {
        metrics.proficiency = ratio(metrics.billed_minutes, metrics.available_minutes);
    }
}

fn ratio(numerator: Option<u64>, denominator: Option<u64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if n > 0 && d > 0 => Some(normalize_ratio(n as f64 / d as f64)),
        _ => None,
    }
}

pub fn number_from_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Rounds to the nearest whole unit; negative values are treated as junk.
pub fn count_from_value(value: &Value) -> Option<u64> {
    let number = number_from_value(value)?;
    if number < 0.0 {
        return None;
    }
    Some(number.round() as u64)
}

/// Epoch milliseconds (number or numeric string) or an RFC 3339 string.
pub fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(millis) = number_from_value(value) {
        return Utc.timestamp_millis_opt(millis.round() as i64).single();
    }
    let raw = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn number_field(record: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(number_from_value))
}

pub fn count_field(record: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(count_from_value))
}

pub fn timestamp_field(record: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(timestamp_from_value))
}

/// First non-blank string among `keys`.
pub fn string_field(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        record
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::metrics::normalize::{
        count_from_value, normalize, normalize_raw, timestamp_from_value,
    };

    #[test]
    fn derives_all_three_ratios_from_minutes() {
        let daily = json!({
            "actualMinutes": 100,
            "availableMinutes": 200,
            "billedMinutes": 50
        });
        let metrics = normalize(Some(&daily), None);
        assert_eq!(metrics.productivity, Some(0.5));
        assert_eq!(metrics.efficiency, Some(0.5));
        assert_eq!(metrics.proficiency, Some(0.25));
    }

    #[test]
    fn raw_pass_leaves_ratios_underived() {
        let daily = json!({ "actualMinutes": 100, "availableMinutes": 200, "efficiency": 0.7 });
        let metrics = normalize_raw(Some(&daily), None);
        assert_eq!(metrics.actual_minutes, Some(100));
        assert_eq!(metrics.efficiency, Some(0.7));
        assert!(metrics.productivity.is_none());
    }

    #[test]
    fn skips_division_when_an_operand_is_not_positive() {
        let daily = json!({ "availableMinutes": 0, "actualMinutes": 50 });
        let metrics = normalize(Some(&daily), None);
        assert_eq!(metrics.available_minutes, Some(0));
        assert!(metrics.productivity.is_none());
        assert!(metrics.efficiency.is_none());
        assert!(metrics.proficiency.is_none());
    }

    #[test]
    fn precomputed_ratios_are_used_as_is() {
        let daily = json!({
            "actualMinutes": 100,
            "availableMinutes": 200,
            "productivity": 0.73
        });
        let metrics = normalize(Some(&daily), None);
        assert_eq!(metrics.productivity, Some(0.73));
    }

    #[test]
    fn derived_ratios_are_clamped_to_one() {
        let daily = json!({ "actualMinutes": 300, "availableMinutes": 200, "billedMinutes": 500 });
        let metrics = normalize(Some(&daily), None);
        assert_eq!(metrics.productivity, Some(1.0));
        assert_eq!(metrics.efficiency, Some(1.0));
        assert_eq!(metrics.proficiency, Some(1.0));
    }

    #[test]
    fn junk_fields_become_absent_not_zero() {
        let daily = json!({
            "availableMinutes": "lots",
            "actualMinutes": null,
            "billedMinutes": [1, 2],
            "avgRating": { "value": 4 },
            "jobsCompleted": true
        });
        let metrics = normalize(Some(&daily), None);
        assert!(!metrics.has_any_value());
    }

    #[test]
    fn minutes_are_rounded_and_numeric_strings_accepted() {
        let daily = json!({ "availableMinutes": "419.6", "actualMinutes": 100.4 });
        let metrics = normalize(Some(&daily), None);
        assert_eq!(metrics.available_minutes, Some(420));
        assert_eq!(metrics.actual_minutes, Some(100));
        assert_eq!(count_from_value(&json!(-3)), None);
    }

    #[test]
    fn rating_falls_back_to_rollup_but_jobs_do_not() {
        let fallback = json!({ "rating": 3.8, "jobsCompleted": 40, "avgDurationMs": 3600000 });
        let metrics = normalize(None, Some(&fallback));
        assert_eq!(metrics.avg_rating, Some(3.8));
        assert!(metrics.jobs_completed.is_none());
        let rollup = metrics.rollup.expect("missing rollup");
        assert_eq!(rollup.jobs_completed_total, Some(40));
        assert_eq!(rollup.avg_duration_ms, Some(3_600_000));
    }

    #[test]
    fn both_records_missing_yields_empty_metrics() {
        let metrics = normalize(None, None);
        assert!(!metrics.has_any_value());
        assert!(metrics.rollup.is_none());
    }

    #[test]
    fn parses_millis_and_rfc3339_timestamps() {
        let from_millis = timestamp_from_value(&json!(1_700_000_000_000i64)).expect("millis");
        let from_text =
            timestamp_from_value(&json!("2023-11-14T22:13:20Z")).expect("rfc3339");
        assert_eq!(from_millis, from_text);
        assert!(timestamp_from_value(&json!("yesterday")).is_none());
    }
}
