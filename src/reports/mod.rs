pub mod snapshot;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::jobs::JobRecord;

/// Narrowing applied to the job list before KPIs are computed. Date bounds
/// are whole UTC days, both inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportFilter {
    pub technician: Option<String>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportFilter {
    fn from_ms(&self) -> Option<i64> {
        self.from.and_then(|d| {
            d.and_hms_milli_opt(0, 0, 0, 0)
                .map(|start| start.and_utc().timestamp_millis())
        })
    }

    fn to_ms(&self) -> Option<i64> {
        self.to.and_then(|d| {
            d.and_hms_milli_opt(23, 59, 59, 999)
                .map(|end| end.and_utc().timestamp_millis())
        })
    }

    /// Jobs without a creation time always pass the date bounds.
    pub fn matches(&self, job: &JobRecord) -> bool {
        if let Some(tech) = self.technician.as_deref() {
            if job.assigned_to.as_deref() != Some(tech) {
                return false;
            }
        }
        if let Some(status) = self.status.as_deref() {
            if job.status != status.trim().to_lowercase() {
                return false;
            }
        }
        let Some(created) = job.created_at.map(|t| t.timestamp_millis()) else {
            return true;
        };
        if self.from_ms().is_some_and(|from| created < from) {
            return false;
        }
        if self.to_ms().is_some_and(|to| created > to) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(flatten)]
    pub job: JobRecord,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub avg_duration_ms: Option<i64>,
    /// Completed share of all rows, whole percent.
    pub completion_pct: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub filter: ReportFilter,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
    pub status_counts: BTreeMap<String, usize>,
}

pub fn build_report(jobs: &[JobRecord], filter: &ReportFilter) -> JobReport {
    let mut rows: Vec<ReportRow> = jobs
        .iter()
        .filter(|job| filter.matches(job))
        .map(|job| ReportRow {
            job: job.clone(),
            duration_ms: job.duration_ms(),
        })
        .collect();
    rows.sort_by_key(|row| {
        std::cmp::Reverse(row.job.created_at.map(|t| t.timestamp_millis()).unwrap_or(0))
    });

    let total = rows.len();
    let completed = rows.iter().filter(|row| row.job.is_completed()).count();
    let completion_pct =
        (total > 0).then(|| ((completed as f64 / total as f64) * 100.0).round() as u32);

    let mut status_counts = BTreeMap::new();
    for row in &rows {
        *status_counts.entry(row.job.status.clone()).or_insert(0) += 1;
    }

    JobReport {
        filter: filter.clone(),
        summary: ReportSummary {
            total,
            completed,
            pending: total - completed,
            avg_duration_ms: average_duration(&rows),
            completion_pct,
        },
        rows,
        status_counts,
    }
}

pub fn average_duration<'a>(rows: impl IntoIterator<Item = &'a ReportRow>) -> Option<i64> {
    let durations: Vec<i64> = rows.into_iter().filter_map(|row| row.duration_ms).collect();
    if durations.is_empty() {
        return None;
    }
    let sum: i64 = durations.iter().sum();
    Some((sum as f64 / durations.len() as f64).round() as i64)
}

/// `"{h}h {m}m"`, or `"{m}m"` under an hour. Missing and non-positive
/// durations render as `-`.
pub fn format_duration(ms: Option<i64>) -> String {
    let Some(ms) = ms.filter(|ms| *ms > 0) else {
        return "-".to_string();
    };
    let hours = ms / 3_600_000;
    let minutes = ((ms % 3_600_000) as f64 / 60_000.0).round() as i64;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
