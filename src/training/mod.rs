use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::evaluation::{Recommendation, TrainingModule};
use crate::storage::ScorecardStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl TrainingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for TrainingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown training status: {0}")]
pub struct TrainingStatusParseError(pub String);

impl FromStr for TrainingStatus {
    type Err = TrainingStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "completed" | "done" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(TrainingStatusParseError(s.to_string())),
        }
    }
}

/// A confirmed recommendation, stored as a task on the technician.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrainingAssignment {
    pub id: i64,
    pub technician_uid: String,
    pub assigned_by: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub module: TrainingModule,
    pub status: TrainingStatus,
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("no training is recommended for this technician")]
    NotNeeded,
    #[error("an assigning operator uid is required")]
    MissingAssigner,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub fn assign_training(
    store: &ScorecardStore,
    technician_uid: &str,
    assigned_by: &str,
    recommendation: &Recommendation,
) -> Result<TrainingAssignment, TrainingError> {
    let module = match (recommendation.needed, recommendation.module) {
        (true, Some(module)) => module,
        _ => return Err(TrainingError::NotNeeded),
    };
    let assigned_by = assigned_by.trim();
    if assigned_by.is_empty() {
        return Err(TrainingError::MissingAssigner);
    }

    let assignment = store.insert_training(technician_uid, assigned_by, module, Utc::now())?;
    info!(
        technician = technician_uid,
        module = %module,
        assigned_by,
        id = assignment.id,
        "training assigned"
    );
    Ok(assignment)
}

pub fn list_trainings(
    store: &ScorecardStore,
    technician_uid: &str,
) -> anyhow::Result<Vec<TrainingAssignment>> {
    store.list_trainings(technician_uid)
}

pub fn update_status(
    store: &ScorecardStore,
    id: i64,
    status: TrainingStatus,
) -> anyhow::Result<bool> {
    let updated = store.update_training_status(id, status)?;
    if updated {
        info!(id, status = %status, "training status updated");
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use crate::evaluation::{Recommendation, TrainingModule};
    use crate::storage::ScorecardStore;
    use crate::training::{
        assign_training, list_trainings, update_status, TrainingError, TrainingStatus,
    };

    fn needed() -> Recommendation {
        Recommendation {
            needed: true,
            module: Some(TrainingModule::CoreDiagnostics),
            reasons: vec!["Proficiency low (0.500)".to_string()],
        }
    }

    #[test]
    fn refuses_when_training_is_not_needed() {
        let store = ScorecardStore::open_in_memory().expect("open store");
        let err = assign_training(&store, "t1", "mgr", &Recommendation::none())
            .expect_err("should refuse");
        assert!(matches!(err, TrainingError::NotNeeded));
        assert!(list_trainings(&store, "t1").expect("list").is_empty());
    }

    #[test]
    fn refuses_without_an_assigner() {
        let store = ScorecardStore::open_in_memory().expect("open store");
        let err = assign_training(&store, "t1", "  ", &needed()).expect_err("should refuse");
        assert!(matches!(err, TrainingError::MissingAssigner));
    }

    #[test]
    fn stores_scheduled_assignment_and_updates_status() {
        let store = ScorecardStore::open_in_memory().expect("open store");
        let assignment = assign_training(&store, "t1", "mgr", &needed()).expect("assign");
        assert_eq!(assignment.module, TrainingModule::CoreDiagnostics);
        assert_eq!(assignment.status, TrainingStatus::Scheduled);
        assert_eq!(assignment.assigned_by, "mgr");

        let listed = list_trainings(&store, "t1").expect("list");
        assert_eq!(listed, vec![assignment.clone()]);

        assert!(update_status(&store, assignment.id, TrainingStatus::Cancelled).expect("update"));
        let listed = list_trainings(&store, "t1").expect("list");
        assert_eq!(listed[0].status, TrainingStatus::Cancelled);
    }

    #[test]
    fn serializes_like_the_dashboard_task_record() {
        let store = ScorecardStore::open_in_memory().expect("open store");
        let assignment = assign_training(&store, "t1", "mgr", &needed()).expect("assign");
        let value = serde_json::to_value(&assignment).expect("encode");
        assert_eq!(value["assignedBy"], "mgr");
        assert_eq!(value["module"], "Core Diagnostics 101");
        assert_eq!(value["status"], "scheduled");
        assert!(value["createdAt"].is_i64());
        assert_eq!("Canceled".parse::<TrainingStatus>().expect("parse"), TrainingStatus::Cancelled);
    }
}
