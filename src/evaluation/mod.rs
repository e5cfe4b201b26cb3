pub mod evaluator;
pub mod grade;
pub mod history;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evaluation::evaluator::{evaluate, rank_modules};
use crate::evaluation::grade::{scorecard_tiles, MetricTile};
use crate::metrics::collector::{collect_technician_metrics, MetricOverrides};
use crate::metrics::sessions::SessionInference;
use crate::metrics::TechnicianMetrics;
use crate::roster::display_name;
use crate::source::DashboardSource;

/// Remedial training catalog. Declaration order breaks ties when two
/// modules show the same deficit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrainingModule {
    #[serde(rename = "Time Management & Workflow")]
    TimeManagement,
    #[serde(rename = "Billing Accuracy & Estimation")]
    BillingAccuracy,
    #[serde(rename = "Core Diagnostics 101")]
    CoreDiagnostics,
    #[serde(rename = "Customer Service Basics")]
    CustomerService,
}

impl TrainingModule {
    pub const ALL: [TrainingModule; 4] = [
        TrainingModule::TimeManagement,
        TrainingModule::BillingAccuracy,
        TrainingModule::CoreDiagnostics,
        TrainingModule::CustomerService,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TimeManagement => "Time Management & Workflow",
            Self::BillingAccuracy => "Billing Accuracy & Estimation",
            Self::CoreDiagnostics => "Core Diagnostics 101",
            Self::CustomerService => "Customer Service Basics",
        }
    }

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::TimeManagement => "time-management",
            Self::BillingAccuracy => "billing-accuracy",
            Self::CoreDiagnostics => "core-diagnostics",
            Self::CustomerService => "customer-service",
        }
    }

    /// Metric whose shortfall this module addresses.
    pub fn metric(&self) -> &'static str {
        match self {
            Self::TimeManagement => "efficiency",
            Self::BillingAccuracy => "productivity",
            Self::CoreDiagnostics => "proficiency",
            Self::CustomerService => "avgRating",
        }
    }
}

impl Display for TrainingModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Error)]
#[error("unknown training module: {0}")]
pub struct TrainingModuleParseError(pub String);

impl FromStr for TrainingModule {
    type Err = TrainingModuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.name().to_ascii_lowercase() == normalized || m.as_slug() == normalized)
            .ok_or_else(|| TrainingModuleParseError(s.to_string()))
    }
}

/// How the full-day job-count rule treats a period with no job count.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingJobsPolicy {
    /// No count, no finding.
    #[default]
    Exempt,
    /// A missing count is a count of zero.
    Zero,
}

#[derive(Debug, Error)]
#[error("unknown missing-jobs policy: {0} (expected exempt or zero)")]
pub struct MissingJobsPolicyParseError(pub String);

impl FromStr for MissingJobsPolicy {
    type Err = MissingJobsPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exempt" | "skip" => Ok(Self::Exempt),
            "zero" | "0" => Ok(Self::Zero),
            _ => Err(MissingJobsPolicyParseError(s.to_string())),
        }
    }
}

impl Display for MissingJobsPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exempt => write!(f, "exempt"),
            Self::Zero => write!(f, "zero"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdConfig {
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
    #[serde(default = "default_productivity")]
    pub productivity: f64,
    #[serde(default = "default_proficiency")]
    pub proficiency: f64,
    #[serde(default = "default_rating")]
    pub rating: f64,
    #[serde(default = "default_min_jobs", alias = "minJobsIfFullDay")]
    pub min_jobs_if_full_day: u64,
    #[serde(default = "default_full_day_minutes", alias = "fullDayMinutes")]
    pub full_day_minutes: u64,
    #[serde(default, alias = "missingJobs")]
    pub missing_jobs: MissingJobsPolicy,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            efficiency: default_efficiency(),
            productivity: default_productivity(),
            proficiency: default_proficiency(),
            rating: default_rating(),
            min_jobs_if_full_day: default_min_jobs(),
            full_day_minutes: default_full_day_minutes(),
            missing_jobs: MissingJobsPolicy::default(),
        }
    }
}

fn default_efficiency() -> f64 {
    0.85
}

fn default_productivity() -> f64 {
    0.80
}

fn default_proficiency() -> f64 {
    0.80
}

fn default_rating() -> f64 {
    4.0
}

fn default_min_jobs() -> u64 {
    3
}

fn default_full_day_minutes() -> u64 {
    420
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub needed: bool,
    pub module: Option<TrainingModule>,
    pub reasons: Vec<String>,
}

impl Recommendation {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModuleDeficit {
    pub module: TrainingModule,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub technician_uid: String,
    pub evaluated_at: DateTime<Utc>,
    pub needed: bool,
    pub module: Option<TrainingModule>,
    pub reasons: Vec<String>,
}

/// Everything the scorecard view shows for one technician.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    pub technician_uid: Option<String>,
    pub name: Option<String>,
    pub metrics: TechnicianMetrics,
    pub tiles: Vec<MetricTile>,
    pub recommendation: Recommendation,
    pub ranking: Vec<ModuleDeficit>,
}

impl Scorecard {
    pub fn build(
        technician_uid: Option<String>,
        name: Option<String>,
        metrics: TechnicianMetrics,
        thresholds: &ThresholdConfig,
    ) -> Self {
        Self {
            technician_uid,
            name,
            tiles: scorecard_tiles(&metrics, thresholds),
            recommendation: evaluate(&metrics, thresholds),
            ranking: rank_modules(&metrics, thresholds),
            metrics,
        }
    }

    /// Reads the technician's figures from `source`, applies any hand-set
    /// overrides and scores the result.
    pub async fn collect(
        source: &dyn DashboardSource,
        technician_uid: &str,
        thresholds: &ThresholdConfig,
        inference: Option<&SessionInference>,
        overrides: &MetricOverrides,
    ) -> Result<Self> {
        let metrics =
            collect_technician_metrics(source, technician_uid, inference, overrides).await?;
        let name = source
            .user_profile(technician_uid)
            .await
            .with_context(|| format!("failed reading profile for {technician_uid}"))?
            .map(|profile| display_name(&profile, technician_uid));
        Ok(Self::build(
            Some(technician_uid.to_string()),
            name,
            metrics,
            thresholds,
        ))
    }

    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.technician_uid.as_deref())
            .unwrap_or("manual metrics")
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluation::{
        MissingJobsPolicy, Recommendation, Scorecard, ThresholdConfig, TrainingModule,
    };
    use crate::metrics::collector::MetricOverrides;
    use crate::metrics::TechnicianMetrics;
    use crate::source::export::ExportSource;

    #[test]
    fn module_names_round_trip_through_serde_and_parse() {
        let encoded = serde_json::to_string(&TrainingModule::BillingAccuracy).expect("encode");
        assert_eq!(encoded, "\"Billing Accuracy & Estimation\"");
        assert_eq!(
            "core diagnostics 101".parse::<TrainingModule>().expect("parse"),
            TrainingModule::CoreDiagnostics
        );
        assert_eq!(
            "customer-service".parse::<TrainingModule>().expect("parse"),
            TrainingModule::CustomerService
        );
        assert!("Welding".parse::<TrainingModule>().is_err());
    }

    #[test]
    fn thresholds_fill_defaults_and_accept_camel_case() {
        let thresholds: ThresholdConfig = serde_json::from_value(serde_json::json!({
            "efficiency": 0.9,
            "minJobsIfFullDay": 4,
            "missingJobs": "zero"
        }))
        .expect("parse thresholds");
        assert_eq!(thresholds.efficiency, 0.9);
        assert_eq!(thresholds.productivity, 0.80);
        assert_eq!(thresholds.min_jobs_if_full_day, 4);
        assert_eq!(thresholds.full_day_minutes, 420);
        assert_eq!(thresholds.missing_jobs, MissingJobsPolicy::Zero);
    }

    #[test]
    fn empty_recommendation_serializes_null_module() {
        let value = serde_json::to_value(Recommendation::none()).expect("encode");
        assert_eq!(
            value,
            serde_json::json!({ "needed": false, "module": null, "reasons": [] })
        );
    }

    #[test]
    fn scorecard_bundles_tiles_recommendation_and_ranking() {
        let metrics = TechnicianMetrics {
            avg_rating: Some(3.0),
            ..TechnicianMetrics::sample()
        };
        let card = Scorecard::build(
            Some("t1".to_string()),
            None,
            metrics,
            &ThresholdConfig::default(),
        );
        assert_eq!(card.label(), "t1");
        assert!(card.recommendation.needed);
        assert_eq!(card.recommendation.module, Some(TrainingModule::CustomerService));
        assert_eq!(card.ranking.len(), 4);
        assert_eq!(card.tiles[3].value, "3.00");
    }

    #[test]
    fn collects_scorecard_from_source_with_overrides() {
        let source = ExportSource::from_value(serde_json::json!({
            "users": { "t1": { "name": "Ana", "role": "technician" } },
            "performance": {
                "t1": {
                    "2024-05-01": {
                        "availableMinutes": 480,
                        "actualMinutes": 400,
                        "billedMinutes": 200,
                        "avgRating": 4.4,
                        "jobsCompleted": 4
                    }
                }
            }
        }));
        let card = tokio_test::block_on(Scorecard::collect(
            &source,
            "t1",
            &ThresholdConfig::default(),
            None,
            &MetricOverrides {
                avg_rating: Some(4.8),
                ..MetricOverrides::default()
            },
        ))
        .expect("collect scorecard");
        assert_eq!(card.label(), "Ana");
        assert_eq!(card.metrics.avg_rating, Some(4.8));
        assert_eq!(card.metrics.efficiency, Some(0.5));
        assert!(card.recommendation.needed);
        assert_eq!(
            card.recommendation.reasons,
            vec![
                "Efficiency low (0.500)".to_string(),
                "Proficiency low (0.417)".to_string(),
            ]
        );
        assert_eq!(card.recommendation.module, Some(TrainingModule::CoreDiagnostics));
    }
}
