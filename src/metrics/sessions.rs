use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jobs::is_completed_status;
use crate::metrics::normalize::{derive_ratios, number_field, string_field, timestamp_field};
use crate::metrics::TechnicianMetrics;

/// One clocked work session from the `jobSessions` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub technician: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub billed_minutes: Option<f64>,
    pub completed: bool,
}

impl SessionRecord {
    pub fn from_value(id: impl Into<String>, value: &Value) -> Self {
        let ended_at = timestamp_field(value, &["endedAt", "endTime", "completedAt"]);
        let completed = match string_field(value, &["status"]) {
            Some(status) => is_completed_status(&status),
            None => ended_at.is_some(),
        };
        Self {
            id: id.into(),
            technician: string_field(value, &["technicianId", "assignedTo", "techId"]),
            started_at: timestamp_field(value, &["startedAt", "startTime"]),
            ended_at,
            billed_minutes: number_field(value, &["billedMinutes", "estimatedDurationMinutes"])
                .filter(|m| *m >= 0.0),
            completed,
        }
    }

    pub fn duration_minutes(&self) -> Option<f64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        if end < start {
            return None;
        }
        Some((end - start).num_milliseconds() as f64 / 60_000.0)
    }

    /// A session belongs to the UTC day it started on, or ended on when
    /// the start is unknown.
    pub fn day(&self) -> Option<NaiveDate> {
        self.started_at.or(self.ended_at).map(|at| at.date_naive())
    }
}

pub fn sessions_for<'a>(
    sessions: &'a [SessionRecord],
    technician: &'a str,
) -> impl Iterator<Item = &'a SessionRecord> + 'a {
    sessions
        .iter()
        .filter(move |s| s.technician.as_deref() == Some(technician))
}

/// Pre-processing stage that fills minute and job fields the snapshot left
/// out, using the technician's raw sessions for the same day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInference {
    /// Scheduled minutes per day. When unset the span between the first
    /// session start and the last session end of that day is used.
    pub shift_minutes: Option<u64>,
}

impl SessionInference {
    pub fn new(shift_minutes: Option<u64>) -> Self {
        Self { shift_minutes }
    }

    /// Only sessions on `day` count. Without a day, the day of the most
    /// recent session is used.
    pub fn apply(
        &self,
        mut metrics: TechnicianMetrics,
        sessions: &[SessionRecord],
        day: Option<NaiveDate>,
    ) -> TechnicianMetrics {
        let Some(day) = day.or_else(|| latest_day(sessions)) else {
            return metrics;
        };
        let sessions: Vec<&SessionRecord> =
            sessions.iter().filter(|s| s.day() == Some(day)).collect();
        if sessions.is_empty() {
            return metrics;
        }

        if metrics.actual_minutes.is_none() {
            let durations: Vec<f64> = sessions
                .iter()
                .filter_map(|s| s.duration_minutes())
                .collect();
            if !durations.is_empty() {
                metrics.actual_minutes = Some(durations.iter().sum::<f64>().round() as u64);
            }
        }

        if metrics.billed_minutes.is_none() {
            let billed: Vec<f64> = sessions
                .iter()
                .filter(|s| s.completed)
                .filter_map(|s| s.billed_minutes)
                .collect();
            if !billed.is_empty() {
                metrics.billed_minutes = Some(billed.iter().sum::<f64>().round() as u64);
            }
        }

        if metrics.available_minutes.is_none() {
            metrics.available_minutes = self.shift_minutes.or_else(|| working_span(&sessions));
        }

        if metrics.jobs_completed.is_none() {
            metrics.jobs_completed = Some(sessions.iter().filter(|s| s.completed).count() as u64);
        }

        derive_ratios(&mut metrics);
        metrics
    }
}

fn latest_day(sessions: &[SessionRecord]) -> Option<NaiveDate> {
    sessions.iter().filter_map(SessionRecord::day).max()
}

fn working_span(sessions: &[&SessionRecord]) -> Option<u64> {
    let first = sessions.iter().filter_map(|s| s.started_at).min()?;
    let last = sessions.iter().filter_map(|s| s.ended_at).max()?;
    if last <= first {
        return None;
    }
    Some(((last - first).num_milliseconds() as f64 / 60_000.0).round() as u64)
}
