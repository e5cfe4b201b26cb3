use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::normalize::{derive_ratios, normalize_raw};
use crate::metrics::sessions::SessionInference;
use crate::metrics::TechnicianMetrics;
use crate::source::{DailySnapshot, DashboardSource};

/// Field values supplied by hand (CLI flags, request bodies) that win over
/// whatever the data source reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricOverrides {
    pub available_minutes: Option<u64>,
    pub actual_minutes: Option<u64>,
    pub billed_minutes: Option<u64>,
    pub efficiency: Option<f64>,
    pub productivity: Option<f64>,
    pub proficiency: Option<f64>,
    pub avg_rating: Option<f64>,
    pub jobs_completed: Option<u64>,
}

impl MetricOverrides {
    pub fn is_empty(&self) -> bool {
        self.available_minutes.is_none()
            && self.actual_minutes.is_none()
            && self.billed_minutes.is_none()
            && self.efficiency.is_none()
            && self.productivity.is_none()
            && self.proficiency.is_none()
            && self.avg_rating.is_none()
            && self.jobs_completed.is_none()
    }
}

/// Snapshot fields first, then overrides, then session inference for the
/// snapshot's day. Ratios are derived last so they always agree with the
/// final minute fields.
pub async fn collect_technician_metrics(
    source: &dyn DashboardSource,
    technician_uid: &str,
    inference: Option<&SessionInference>,
    overrides: &MetricOverrides,
) -> Result<TechnicianMetrics> {
    let daily = source
        .latest_daily(technician_uid)
        .await
        .with_context(|| format!("failed reading daily snapshot for {technician_uid}"))?;
    let stats = source
        .technician_stats(technician_uid)
        .await
        .with_context(|| format!("failed reading stats rollup for {technician_uid}"))?;

    let mut metrics = normalize_raw(daily.as_ref().map(|d| &d.record), stats.as_ref());
    override_fields(&mut metrics, overrides);
    if let Some(inference) = inference {
        let sessions = source
            .sessions(technician_uid)
            .await
            .with_context(|| format!("failed reading sessions for {technician_uid}"))?;
        let day = daily.as_ref().and_then(DailySnapshot::day);
        debug!(
            technician = technician_uid,
            sessions = sessions.len(),
            day = ?day,
            "inferring metrics from sessions"
        );
        metrics = inference.apply(metrics, &sessions, day);
    }
    derive_ratios(&mut metrics);
    Ok(metrics)
}

/// Overrides replace fields outright; ratios that are still missing
/// afterwards are derived from the (possibly overridden) minutes.
pub fn apply_overrides(metrics: &mut TechnicianMetrics, overrides: &MetricOverrides) {
    override_fields(metrics, overrides);
    derive_ratios(metrics);
}

fn override_fields(metrics: &mut TechnicianMetrics, overrides: &MetricOverrides) {
    if let Some(v) = overrides.available_minutes {
        metrics.available_minutes = Some(v);
    }
    if let Some(v) = overrides.actual_minutes {
        metrics.actual_minutes = Some(v);
    }
    if let Some(v) = overrides.billed_minutes {
        metrics.billed_minutes = Some(v);
    }
    if let Some(v) = overrides.efficiency.filter(|v| v.is_finite()) {
        metrics.efficiency = Some(v);
    }
    if let Some(v) = overrides.productivity.filter(|v| v.is_finite()) {
        metrics.productivity = Some(v);
    }
    if let Some(v) = overrides.proficiency.filter(|v| v.is_finite()) {
        metrics.proficiency = Some(v);
    }
    if let Some(v) = overrides.avg_rating.filter(|v| v.is_finite()) {
        metrics.avg_rating = Some(v);
    }
    if let Some(v) = overrides.jobs_completed {
        metrics.jobs_completed = Some(v);
    }
}
