use serde::{Deserialize, Serialize};

use crate::evaluation::ThresholdConfig;
use crate::metrics::TechnicianMetrics;

const RATIO_WARN_MARGIN: f64 = 0.05;
const RATING_WARN_MARGIN: f64 = 0.2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TileState {
    Good,
    Warn,
    Bad,
}

impl TileState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warn => "warn",
            Self::Bad => "bad",
        }
    }
}

pub fn grade_ratio(value: Option<f64>, min: f64) -> Option<TileState> {
    grade(value, min, RATIO_WARN_MARGIN)
}

pub fn grade_rating(value: Option<f64>, min: f64) -> Option<TileState> {
    grade(value, min, RATING_WARN_MARGIN)
}

fn grade(value: Option<f64>, min: f64, margin: f64) -> Option<TileState> {
    let value = value?;
    Some(if value >= min {
        TileState::Good
    } else if value >= min - margin {
        TileState::Warn
    } else {
        TileState::Bad
    })
}

/// Three decimals, rounded half away from zero at the third place.
pub fn format_ratio(value: f64) -> String {
    format!("{:.3}", (value * 1000.0).round() / 1000.0)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricTile {
    pub label: &'static str,
    pub value: String,
    pub state: Option<TileState>,
}

/// Scorecard tiles in display order. Absent values render as `-` with no
/// grade.
pub fn scorecard_tiles(metrics: &TechnicianMetrics, thresholds: &ThresholdConfig) -> Vec<MetricTile> {
    let ratio_tile = |label, value: Option<f64>, min| MetricTile {
        label,
        value: value.map(format_ratio).unwrap_or_else(|| "-".to_string()),
        state: grade_ratio(value, min),
    };
    vec![
        ratio_tile("Efficiency", metrics.efficiency, thresholds.efficiency),
        ratio_tile("Productivity", metrics.productivity, thresholds.productivity),
        ratio_tile("Proficiency", metrics.proficiency, thresholds.proficiency),
        MetricTile {
            label: "Avg Rating",
            value: metrics
                .avg_rating
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| "-".to_string()),
            state: grade_rating(metrics.avg_rating, thresholds.rating),
        },
        MetricTile {
            label: "Jobs Completed",
            value: metrics
                .jobs_for_display()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            state: None,
        },
    ]
}
