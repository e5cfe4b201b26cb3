use std::collections::BTreeMap;

use serde::Serialize;

use crate::jobs::JobRecord;
use crate::roster::Technician;

pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Estimated minutes for a service type when the operator picks "auto".
pub fn suggest_duration_minutes(service_type: &str) -> u32 {
    match service_type.trim().to_lowercase().as_str() {
        "oil change" => 30,
        "tire rotation" => 45,
        "brake inspection" => 60,
        "diagnostic" => 60,
        "full service" => 120,
        "battery replacement" => 30,
        "engine check" => 90,
        _ => DEFAULT_DURATION_MINUTES,
    }
}

/// Open-job count per technician; technicians with nothing open map to 0.
pub fn open_workload(technicians: &[Technician], jobs: &[JobRecord]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> =
        technicians.iter().map(|t| (t.uid.clone(), 0)).collect();
    for job in jobs.iter().filter(|j| j.is_open()) {
        if let Some(count) = job
            .assigned_to
            .as_ref()
            .and_then(|uid| counts.get_mut(uid))
        {
            *count += 1;
        }
    }
    counts
}

/// Technician with the fewest open jobs; ties go to the lowest uid.
pub fn pick_assignee(technicians: &[Technician], jobs: &[JobRecord]) -> Option<String> {
    open_workload(technicians, jobs)
        .into_iter()
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(uid, _)| uid)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeSuggestion {
    pub technician_uid: Option<String>,
    pub name: Option<String>,
    pub open_jobs: usize,
    pub service_type: Option<String>,
    pub duration_minutes: u32,
}

/// Defaults for a new job: who should take it and how long to book.
pub fn suggest_assignment(
    technicians: &[Technician],
    jobs: &[JobRecord],
    service_type: Option<&str>,
) -> AssigneeSuggestion {
    let workload = open_workload(technicians, jobs);
    let uid = pick_assignee(technicians, jobs);
    let name = uid.as_deref().and_then(|uid| {
        technicians
            .iter()
            .find(|t| t.uid == uid)
            .map(|t| t.display().to_string())
    });
    AssigneeSuggestion {
        open_jobs: uid
            .as_ref()
            .and_then(|uid| workload.get(uid).copied())
            .unwrap_or(0),
        technician_uid: uid,
        name,
        service_type: service_type.map(str::to_string),
        duration_minutes: service_type
            .map(suggest_duration_minutes)
            .unwrap_or(DEFAULT_DURATION_MINUTES),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::jobs::assign::{
        open_workload, pick_assignee, suggest_assignment, suggest_duration_minutes,
    };
    use crate::jobs::JobRecord;
    use crate::roster::Technician;

    fn job(id: &str, tech: &str, status: &str) -> JobRecord {
        JobRecord::from_value(id, &json!({ "assignedTo": tech, "status": status }))
    }

    #[test]
    fn suggests_durations_by_service() {
        assert_eq!(suggest_duration_minutes(" Full Service "), 120);
        assert_eq!(suggest_duration_minutes("oil change"), 30);
        assert_eq!(suggest_duration_minutes("paint job"), 60);
    }

    #[test]
    fn picks_least_loaded_technician() {
        let techs = vec![Technician::new("b"), Technician::new("a"), Technician::new("c")];
        let jobs = vec![
            job("1", "a", "pending"),
            job("2", "a", "in progress"),
            job("3", "b", "open"),
            job("4", "c", "completed"),
            job("5", "c", "open"),
            job("6", "ghost", "open"),
        ];
        let workload = open_workload(&techs, &jobs);
        assert_eq!(workload["a"], 2);
        assert_eq!(workload["c"], 1);
        assert!(!workload.contains_key("ghost"));
        // b and c tie on one open job; b sorts first
        assert_eq!(pick_assignee(&techs, &jobs).as_deref(), Some("b"));
    }

    #[test]
    fn no_technicians_means_no_assignee() {
        assert!(pick_assignee(&[], &[]).is_none());
    }

    #[test]
    fn suggestion_names_the_assignee_and_books_service_time() {
        let mut ana = Technician::new("a");
        ana.name = "Ana".to_string();
        let techs = vec![ana, Technician::new("b")];
        let jobs = vec![job("1", "b", "open")];
        let suggestion = suggest_assignment(&techs, &jobs, Some("Engine Check"));
        assert_eq!(suggestion.technician_uid.as_deref(), Some("a"));
        assert_eq!(suggestion.name.as_deref(), Some("Ana"));
        assert_eq!(suggestion.open_jobs, 0);
        assert_eq!(suggestion.duration_minutes, 90);

        let empty = suggest_assignment(&[], &[], None);
        assert!(empty.technician_uid.is_none());
        assert_eq!(empty.duration_minutes, 60);
    }
}
