pub mod assign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::normalize::{string_field, timestamp_field};

pub const DEFAULT_STATUS: &str = "created";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub title: Option<String>,
    pub assigned_to: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn from_value(id: impl Into<String>, value: &Value) -> Self {
        Self {
            id: id.into(),
            title: string_field(value, &["title", "jobTitle"]),
            assigned_to: string_field(value, &["assignedTo", "technicianId", "techId"]),
            status: string_field(value, &["status"])
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            created_at: timestamp_field(value, &["createdAt", "created_at", "created"]),
            started_at: timestamp_field(value, &["startedAt", "startTime"]),
            completed_at: timestamp_field(value, &["completedAt", "endTime"]),
        }
    }

    /// Completion minus start, or minus creation when the job never
    /// recorded a start.
    pub fn duration_ms(&self) -> Option<i64> {
        let completed = self.completed_at?;
        let from = self.started_at.or(self.created_at)?;
        Some((completed - from).num_milliseconds())
    }

    pub fn is_completed(&self) -> bool {
        is_completed_status(&self.status)
    }

    pub fn is_open(&self) -> bool {
        is_open_status(&self.status)
    }
}

pub fn is_completed_status(status: &str) -> bool {
    matches!(
        status.trim().to_lowercase().as_str(),
        "completed" | "resolved"
    )
}

pub fn is_open_status(status: &str) -> bool {
    matches!(
        status.trim().to_lowercase().as_str(),
        "pending" | "open" | "in progress" | "in_progress"
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::jobs::{is_completed_status, is_open_status, JobRecord};

    #[test]
    fn reads_alternate_field_names() {
        let job = JobRecord::from_value(
            "j1",
            &json!({
                "jobTitle": "Brake pads",
                "techId": "tech-9",
                "created_at": 1_000,
                "startTime": 61_000,
                "endTime": 181_000
            }),
        );
        assert_eq!(job.title.as_deref(), Some("Brake pads"));
        assert_eq!(job.assigned_to.as_deref(), Some("tech-9"));
        assert_eq!(job.status, "created");
        assert_eq!(job.duration_ms(), Some(120_000));
    }

    #[test]
    fn duration_falls_back_to_creation_time() {
        let job = JobRecord::from_value(
            "j2",
            &json!({ "createdAt": 0, "completedAt": 3_600_000, "status": "Resolved" }),
        );
        assert_eq!(job.duration_ms(), Some(3_600_000));
        assert!(job.is_completed());
        let open = JobRecord::from_value("j3", &json!({ "createdAt": 0 }));
        assert!(open.duration_ms().is_none());
    }

    #[test]
    fn classifies_statuses() {
        assert!(is_open_status("In Progress"));
        assert!(is_open_status("in_progress"));
        assert!(!is_open_status("completed"));
        assert!(is_completed_status("completed"));
        assert!(!is_completed_status("pending"));
    }
}
