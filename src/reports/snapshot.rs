use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::normalize::{number_field, string_field};
use crate::reports::{average_duration, JobReport};
use crate::roster::display_name;
use crate::source::DashboardSource;

/// Per-technician panel shown beside a job report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianSnapshot {
    pub uid: Option<String>,
    pub name: String,
    pub jobs: usize,
    pub avg_duration_ms: Option<i64>,
    /// One decimal place, from the stats rollup.
    pub rating: Option<String>,
    pub training: Option<String>,
}

impl TechnicianSnapshot {
    pub fn all(report: &JobReport) -> Self {
        Self {
            uid: None,
            name: "All technicians".to_string(),
            jobs: report.rows.len(),
            avg_duration_ms: report.summary.avg_duration_ms,
            rating: None,
            training: None,
        }
    }
}

pub fn technician_snapshot(
    uid: &str,
    name: &str,
    report: &JobReport,
    stats: Option<&Value>,
) -> TechnicianSnapshot {
    let own: Vec<_> = report
        .rows
        .iter()
        .filter(|row| row.job.assigned_to.as_deref() == Some(uid))
        .collect();

    TechnicianSnapshot {
        uid: Some(uid.to_string()),
        name: name.to_string(),
        jobs: own.len(),
        avg_duration_ms: average_duration(own.iter().copied()),
        rating: stats
            .and_then(|s| number_field(s, &["rating"]))
            .map(|r| format!("{r:.1}")),
        training: stats.and_then(suggested_training),
    }
}

/// Panel for the report's technician filter, or the shop-wide panel when
/// the report is unfiltered.
pub async fn snapshot_for(
    source: &dyn DashboardSource,
    report: &JobReport,
) -> Result<TechnicianSnapshot> {
    let Some(uid) = report.filter.technician.as_deref() else {
        return Ok(TechnicianSnapshot::all(report));
    };
    let name = source
        .user_profile(uid)
        .await
        .with_context(|| format!("failed reading profile for {uid}"))?
        .map(|profile| display_name(&profile, uid))
        .unwrap_or_else(|| uid.to_string());
    let stats = source
        .technician_stats(uid)
        .await
        .with_context(|| format!("failed reading stats rollup for {uid}"))?;
    Ok(technician_snapshot(uid, &name, report, stats.as_ref()))
}

fn suggested_training(stats: &Value) -> Option<String> {
    let listed: Vec<&str> = stats
        .get("suggestedTrainings")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !listed.is_empty() {
        return Some(listed.join(", "));
    }
    string_field(stats, &["topTraining"])
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::jobs::JobRecord;
    use crate::reports::snapshot::{snapshot_for, technician_snapshot, TechnicianSnapshot};
    use crate::reports::{build_report, ReportFilter};
    use crate::source::export::ExportSource;

    fn report() -> crate::reports::JobReport {
        let jobs = vec![
            JobRecord::from_value(
                "j1",
                &json!({ "assignedTo": "t1", "createdAt": 0, "completedAt": 600_000 }),
            ),
            JobRecord::from_value(
                "j2",
                &json!({ "assignedTo": "t2", "createdAt": 0, "completedAt": 1_200_000 }),
            ),
        ];
        build_report(&jobs, &ReportFilter::default())
    }

    #[test]
    fn snapshot_uses_own_rows_and_stats() {
        let stats = json!({
            "rating": 4.26,
            "suggestedTrainings": ["Core Diagnostics 101", "Customer Service Basics"]
        });
        let snap = technician_snapshot("t1", "Ana", &report(), Some(&stats));
        assert_eq!(snap.jobs, 1);
        assert_eq!(snap.avg_duration_ms, Some(600_000));
        assert_eq!(snap.rating.as_deref(), Some("4.3"));
        assert_eq!(
            snap.training.as_deref(),
            Some("Core Diagnostics 101, Customer Service Basics")
        );
    }

    #[test]
    fn falls_back_to_top_training() {
        let stats = json!({ "suggestedTrainings": [], "topTraining": "Core Diagnostics 101" });
        let snap = technician_snapshot("t2", "Ben", &report(), Some(&stats));
        assert_eq!(snap.training.as_deref(), Some("Core Diagnostics 101"));
        assert!(snap.rating.is_none());

        let bare = technician_snapshot("t3", "Cy", &report(), None);
        assert_eq!(bare.jobs, 0);
        assert!(bare.avg_duration_ms.is_none());
    }

    #[test]
    fn all_technicians_snapshot_uses_report_totals() {
        let snap = TechnicianSnapshot::all(&report());
        assert_eq!(snap.jobs, 2);
        assert_eq!(snap.avg_duration_ms, Some(900_000));
    }

    #[test]
    fn snapshot_for_filtered_report_reads_profile_and_stats() {
        let source = ExportSource::from_value(json!({
            "users": { "t1": { "displayName": "Ana P." } },
            "technicianStats": { "t1": { "rating": 3.96, "topTraining": "Customer Service Basics" } }
        }));
        let jobs = vec![JobRecord::from_value(
            "j1",
            &json!({ "assignedTo": "t1", "createdAt": 0, "completedAt": 60_000 }),
        )];
        let filter = ReportFilter {
            technician: Some("t1".to_string()),
            ..ReportFilter::default()
        };
        let report = build_report(&jobs, &filter);
        let snap = tokio_test::block_on(snapshot_for(&source, &report)).expect("snapshot");
        assert_eq!(snap.name, "Ana P.");
        assert_eq!(snap.jobs, 1);
        assert_eq!(snap.rating.as_deref(), Some("4.0"));
        assert_eq!(snap.training.as_deref(), Some("Customer Service Basics"));

        let unfiltered = build_report(&jobs, &ReportFilter::default());
        let all = tokio_test::block_on(snapshot_for(&source, &unfiltered)).expect("snapshot");
        assert_eq!(all.name, "All technicians");
    }
}
