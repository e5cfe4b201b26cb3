pub mod collector;
pub mod normalize;
pub mod sessions;

use serde::{Deserialize, Serialize};

/// Raw time and quality figures for one technician over one evaluation
/// period. Every field is independently optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianMetrics {
    pub available_minutes: Option<u64>,
    pub actual_minutes: Option<u64>,
    pub billed_minutes: Option<u64>,
    pub efficiency: Option<f64>,
    pub productivity: Option<f64>,
    pub proficiency: Option<f64>,
    pub avg_rating: Option<f64>,
    pub jobs_completed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup: Option<HistoricalRollup>,
}

/// Lifetime totals from the technician's stats rollup. Display only; the
/// scoring rules never read these.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRollup {
    pub jobs_completed_total: Option<u64>,
    pub avg_duration_ms: Option<u64>,
    pub total_duration_ms: Option<u64>,
}

impl HistoricalRollup {
    pub fn is_empty(&self) -> bool {
        self.jobs_completed_total.is_none()
            && self.avg_duration_ms.is_none()
            && self.total_duration_ms.is_none()
    }
}

impl TechnicianMetrics {
    pub fn sample() -> Self {
        Self {
            available_minutes: Some(480),
            actual_minutes: Some(440),
            billed_minutes: Some(396),
            efficiency: Some(0.9),
            productivity: Some(0.917),
            proficiency: Some(0.825),
            avg_rating: Some(4.5),
            jobs_completed: Some(5),
            rollup: None,
        }
    }

    /// Jobs figure shown on the scorecard: the period count when known,
    /// otherwise the lifetime total.
    pub fn jobs_for_display(&self) -> Option<u64> {
        self.jobs_completed.or_else(|| {
            self.rollup
                .as_ref()
                .and_then(|rollup| rollup.jobs_completed_total)
        })
    }

    pub fn has_any_value(&self) -> bool {
        self.available_minutes.is_some()
            || self.actual_minutes.is_some()
            || self.billed_minutes.is_some()
            || self.efficiency.is_some()
            || self.productivity.is_some()
            || self.proficiency.is_some()
            || self.avg_rating.is_some()
            || self.jobs_completed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{HistoricalRollup, TechnicianMetrics};

    #[test]
    fn deserializes_camel_case_with_missing_fields() {
        let metrics: TechnicianMetrics = serde_json::from_value(serde_json::json!({
            "availableMinutes": 450,
            "efficiency": 0.9
        }))
        .expect("failed to parse metrics");
        assert_eq!(metrics.available_minutes, Some(450));
        assert_eq!(metrics.efficiency, Some(0.9));
        assert!(metrics.jobs_completed.is_none());
        assert!(metrics.rollup.is_none());
    }

    #[test]
    fn display_jobs_fall_back_to_rollup_total() {
        let metrics = TechnicianMetrics {
            rollup: Some(HistoricalRollup {
                jobs_completed_total: Some(112),
                ..HistoricalRollup::default()
            }),
            ..TechnicianMetrics::default()
        };
        assert_eq!(metrics.jobs_for_display(), Some(112));
        assert!(!metrics.has_any_value());
    }
}
