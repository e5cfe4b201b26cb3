use crate::evaluation::grade::format_ratio;
use crate::evaluation::{
    MissingJobsPolicy, ModuleDeficit, Recommendation, ThresholdConfig, TrainingModule,
};
use crate::metrics::TechnicianMetrics;

/// Checks the five rules in fixed order and, when any fails, picks the
/// module with the largest deficit. Total over any mix of absent fields.
pub fn evaluate(metrics: &TechnicianMetrics, thresholds: &ThresholdConfig) -> Recommendation {
    let mut reasons = Vec::new();

    if let Some(v) = metrics.efficiency.filter(|v| *v < thresholds.efficiency) {
        reasons.push(format!("Efficiency low ({})", format_ratio(v)));
    }
    if let Some(v) = metrics.productivity.filter(|v| *v < thresholds.productivity) {
        reasons.push(format!("Productivity low ({})", format_ratio(v)));
    }
    if let Some(v) = metrics.proficiency.filter(|v| *v < thresholds.proficiency) {
        reasons.push(format!("Proficiency low ({})", format_ratio(v)));
    }
    if let Some(v) = metrics.avg_rating.filter(|v| *v < thresholds.rating) {
        reasons.push(format!("Avg rating below {} ({v})", thresholds.rating));
    }
    if let Some(jobs) = short_full_day(metrics, thresholds) {
        reasons.push(format!("Few jobs for a full day ({jobs})"));
    }

    if reasons.is_empty() {
        return Recommendation::none();
    }

    Recommendation {
        needed: true,
        module: choose_module(metrics, thresholds),
        reasons,
    }
}

fn short_full_day(metrics: &TechnicianMetrics, thresholds: &ThresholdConfig) -> Option<u64> {
    let available = metrics.available_minutes?;
    if available < thresholds.full_day_minutes {
        return None;
    }
    let jobs = match (metrics.jobs_completed, thresholds.missing_jobs) {
        (Some(jobs), _) => jobs,
        (None, MissingJobsPolicy::Zero) => 0,
        (None, MissingJobsPolicy::Exempt) => return None,
    };
    (jobs < thresholds.min_jobs_if_full_day).then_some(jobs)
}

/// All four modules, largest deficit first. Equal deficits keep catalog
/// order. An absent metric counts as zero, so it ranks as fully deficient.
pub fn rank_modules(metrics: &TechnicianMetrics, thresholds: &ThresholdConfig) -> Vec<ModuleDeficit> {
    let mut ranked: Vec<ModuleDeficit> = TrainingModule::ALL
        .into_iter()
        .map(|module| ModuleDeficit {
            module,
            delta: deficit(module, metrics, thresholds),
        })
        .collect();
    ranked.sort_by(|a, b| b.delta.total_cmp(&a.delta));
    ranked
}

pub fn choose_module(
    metrics: &TechnicianMetrics,
    thresholds: &ThresholdConfig,
) -> Option<TrainingModule> {
    rank_modules(metrics, thresholds)
        .first()
        .map(|deficit| deficit.module)
}

fn deficit(module: TrainingModule, metrics: &TechnicianMetrics, thresholds: &ThresholdConfig) -> f64 {
    let gap = |threshold: f64, value: Option<f64>, upper: f64| {
        let delta = (threshold - value.unwrap_or(0.0)).clamp(0.0, upper);
        if delta.is_nan() {
            0.0
        } else {
            delta
        }
    };
    match module {
        TrainingModule::TimeManagement => gap(thresholds.efficiency, metrics.efficiency, 1.0),
        TrainingModule::BillingAccuracy => gap(thresholds.productivity, metrics.productivity, 1.0),
        TrainingModule::CoreDiagnostics => gap(thresholds.proficiency, metrics.proficiency, 1.0),
        TrainingModule::CustomerService => gap(thresholds.rating, metrics.avg_rating, 5.0) / 5.0,
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluation::evaluator::{evaluate, rank_modules};
    use crate::evaluation::{MissingJobsPolicy, ThresholdConfig, TrainingModule};
    use crate::metrics::TechnicianMetrics;

    fn passing() -> TechnicianMetrics {
        TechnicianMetrics {
            efficiency: Some(0.9),
            productivity: Some(0.9),
            proficiency: Some(0.9),
            avg_rating: Some(4.5),
            available_minutes: Some(480),
            jobs_completed: Some(5),
            ..TechnicianMetrics::default()
        }
    }

    #[test]
    fn all_passing_needs_no_training() {
        let rec = evaluate(&passing(), &ThresholdConfig::default());
        assert!(!rec.needed);
        assert!(rec.module.is_none());
        assert!(rec.reasons.is_empty());
    }

    #[test]
    fn low_efficiency_points_at_time_management() {
        let metrics = TechnicianMetrics {
            efficiency: Some(0.5),
            ..passing()
        };
        let rec = evaluate(&metrics, &ThresholdConfig::default());
        assert!(rec.needed);
        assert_eq!(rec.reasons, vec!["Efficiency low (0.500)".to_string()]);
        assert_eq!(rec.module, Some(TrainingModule::TimeManagement));
    }

    #[test]
    fn few_jobs_on_a_full_day_is_flagged() {
        let metrics = TechnicianMetrics {
            available_minutes: Some(450),
            jobs_completed: Some(1),
            ..passing()
        };
        let rec = evaluate(&metrics, &ThresholdConfig::default());
        assert!(rec.needed);
        assert_eq!(rec.reasons, vec!["Few jobs for a full day (1)".to_string()]);
        // no ratio deficit anywhere, so catalog order decides
        assert_eq!(rec.module, Some(TrainingModule::TimeManagement));
    }

    #[test]
    fn each_failing_metric_adds_one_reason_in_rule_order() {
        let thresholds = ThresholdConfig::default();
        let cases = [
            (
                TechnicianMetrics { productivity: Some(0.7), ..passing() },
                "Productivity low (0.700)",
                TrainingModule::BillingAccuracy,
            ),
            (
                TechnicianMetrics { proficiency: Some(0.1234), ..passing() },
                "Proficiency low (0.123)",
                TrainingModule::CoreDiagnostics,
            ),
            (
                TechnicianMetrics { avg_rating: Some(3.5), ..passing() },
                "Avg rating below 4 (3.5)",
                TrainingModule::CustomerService,
            ),
        ];
        for (metrics, reason, module) in cases {
            let rec = evaluate(&metrics, &thresholds);
            assert_eq!(rec.reasons, vec![reason.to_string()]);
            assert_eq!(rec.module, Some(module));
        }

        let all_low = TechnicianMetrics {
            efficiency: Some(0.2),
            productivity: Some(0.3),
            proficiency: Some(0.4),
            avg_rating: Some(2.0),
            jobs_completed: Some(0),
            ..passing()
        };
        let rec = evaluate(&all_low, &thresholds);
        assert_eq!(rec.reasons.len(), 5);
        assert!(rec.reasons[0].starts_with("Efficiency"));
        assert!(rec.reasons[3].starts_with("Avg rating"));
        assert!(rec.reasons[4].starts_with("Few jobs"));
    }

    #[test]
    fn absent_metrics_add_no_reasons_but_rank_as_deficient() {
        let metrics = TechnicianMetrics {
            avg_rating: Some(3.0),
            ..TechnicianMetrics::default()
        };
        let rec = evaluate(&metrics, &ThresholdConfig::default());
        assert_eq!(rec.reasons, vec!["Avg rating below 4 (3)".to_string()]);
        // efficiency absent: delta 0.85 beats the rating's 0.2
        assert_eq!(rec.module, Some(TrainingModule::TimeManagement));

        let ranked = rank_modules(&metrics, &ThresholdConfig::default());
        let order: Vec<TrainingModule> = ranked.iter().map(|d| d.module).collect();
        assert_eq!(
            order,
            vec![
                TrainingModule::TimeManagement,
                TrainingModule::BillingAccuracy,
                TrainingModule::CoreDiagnostics,
                TrainingModule::CustomerService,
            ]
        );
        assert!((ranked[3].delta - 0.2).abs() < 1e-9);
    }

    #[test]
    fn missing_job_count_follows_policy() {
        let metrics = TechnicianMetrics {
            jobs_completed: None,
            ..passing()
        };
        let exempt = evaluate(&metrics, &ThresholdConfig::default());
        assert!(!exempt.needed);

        let zero = ThresholdConfig {
            missing_jobs: MissingJobsPolicy::Zero,
            ..ThresholdConfig::default()
        };
        let rec = evaluate(&metrics, &zero);
        assert_eq!(rec.reasons, vec!["Few jobs for a full day (0)".to_string()]);
    }

    #[test]
    fn short_day_skips_job_rule() {
        let metrics = TechnicianMetrics {
            available_minutes: Some(419),
            jobs_completed: Some(0),
            ..passing()
        };
        assert!(!evaluate(&metrics, &ThresholdConfig::default()).needed);
        let no_minutes = TechnicianMetrics {
            available_minutes: None,
            jobs_completed: Some(0),
            ..passing()
        };
        assert!(!evaluate(&no_minutes, &ThresholdConfig::default()).needed);
    }

    #[test]
    fn evaluation_is_deterministic_and_total() {
        let thresholds = ThresholdConfig::default();
        let empty = TechnicianMetrics::default();
        let first = evaluate(&empty, &thresholds);
        assert_eq!(first, evaluate(&empty, &thresholds));
        assert!(!first.needed);

        let metrics = TechnicianMetrics {
            efficiency: Some(0.6),
            productivity: Some(0.6),
            ..passing()
        };
        let a = evaluate(&metrics, &thresholds);
        let b = evaluate(&metrics, &thresholds);
        assert_eq!(a, b);
        // efficiency gap 0.25 beats productivity gap 0.20
        assert_eq!(a.module, Some(TrainingModule::TimeManagement));
    }

    #[test]
    fn equal_deficits_keep_catalog_order() {
        let thresholds = ThresholdConfig {
            efficiency: 0.5,
            productivity: 0.5,
            ..ThresholdConfig::default()
        };
        let metrics = TechnicianMetrics {
            efficiency: Some(0.25),
            productivity: Some(0.25),
            ..passing()
        };
        let ranked = rank_modules(&metrics, &thresholds);
        assert_eq!(ranked[0].delta, ranked[1].delta);
        assert_eq!(ranked[0].module, TrainingModule::TimeManagement);
        assert_eq!(ranked[1].module, TrainingModule::BillingAccuracy);
    }
}
