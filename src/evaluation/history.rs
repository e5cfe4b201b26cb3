use chrono::Utc;

use crate::evaluation::{EvaluationRecord, Recommendation, TrainingModule};

pub fn record_from_recommendation(
    technician_uid: impl Into<String>,
    recommendation: &Recommendation,
) -> EvaluationRecord {
    EvaluationRecord {
        technician_uid: technician_uid.into(),
        evaluated_at: Utc::now(),
        needed: recommendation.needed,
        module: recommendation.module,
        reasons: recommendation.reasons.clone(),
    }
}

pub fn summarize_timeline(records: &[EvaluationRecord], module: Option<TrainingModule>) -> String {
    if records.is_empty() {
        return "No evaluation history found.".to_string();
    }

    let mut needed_count = 0usize;
    let mut total = 0usize;
    for rec in records {
        if let Some(module) = module {
            if rec.needed && rec.module != Some(module) {
                continue;
            }
        }
        total += 1;
        if rec.needed {
            needed_count += 1;
        }
    }

    if total == 0 {
        return "No matching evaluations for selected module.".to_string();
    }

    format!(
        "Training needed in {needed_count}/{total} evaluations ({:.1}%)",
        (needed_count as f64 / total as f64) * 100.0
    )
}
