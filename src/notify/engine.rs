use serde::{Deserialize, Serialize};

use crate::config::NotificationRulesConfig;
use crate::evaluation::Recommendation;
use crate::notify::rules::NotificationKind;
use crate::training::TrainingAssignment;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

/// At most one event: only recommendations that call for training notify.
pub fn events_for_recommendation(
    technician: &str,
    recommendation: &Recommendation,
    rules: &NotificationRulesConfig,
) -> Vec<NotificationEvent> {
    let kind = NotificationKind::TrainingRecommended;
    if !recommendation.needed || !kind.enabled(rules) {
        return Vec::new();
    }
    let module = recommendation
        .module
        .map(|m| m.to_string())
        .unwrap_or_else(|| "-".to_string());
    vec![NotificationEvent {
        kind,
        title: format!("Training recommended for {technician}: {module}"),
        body: recommendation.reasons.join("; "),
    }]
}

pub fn event_for_assignment(
    technician: &str,
    assignment: &TrainingAssignment,
    rules: &NotificationRulesConfig,
) -> Option<NotificationEvent> {
    let kind = NotificationKind::TrainingAssigned;
    kind.enabled(rules).then(|| NotificationEvent {
        kind,
        title: format!("{} assigned to {technician}", assignment.module),
        body: format!(
            "Scheduled by {} at {}",
            assignment.assigned_by,
            assignment.created_at.to_rfc3339()
        ),
    })
}
