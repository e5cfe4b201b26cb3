use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::config::NotificationRulesConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TrainingRecommended,
    TrainingAssigned,
}

impl NotificationKind {
    pub fn enabled(&self, rules: &NotificationRulesConfig) -> bool {
        match self {
            Self::TrainingRecommended => rules.training_recommended,
            Self::TrainingAssigned => rules.training_assigned,
        }
    }
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrainingRecommended => write!(f, "training_recommended"),
            Self::TrainingAssigned => write!(f, "training_assigned"),
        }
    }
}
