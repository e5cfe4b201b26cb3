use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::evaluation::grade::{format_ratio, TileState};
use crate::evaluation::{EvaluationRecord, ModuleDeficit, Scorecard};
use crate::jobs::assign::AssigneeSuggestion;
use crate::metrics::TechnicianMetrics;
use crate::reports::snapshot::TechnicianSnapshot;
use crate::reports::{format_duration, JobReport};
use crate::roster::{validate_profile, Technician};
use crate::training::{TrainingAssignment, TrainingStatus};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn dash<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn state_cell(state: Option<TileState>) -> Cell {
    match state {
        Some(TileState::Good) => Cell::new("GOOD").fg(Color::Green),
        Some(TileState::Warn) => Cell::new("WARN").fg(Color::Yellow),
        Some(TileState::Bad) => Cell::new("BAD").fg(Color::Red),
        None => Cell::new("-"),
    }
}

pub fn render_metrics_table(metrics: &TechnicianMetrics) -> String {
    let mut table = new_table();
    table.set_header(vec!["Field", "Value"]);
    let rows = [
        ("availableMinutes", dash(metrics.available_minutes)),
        ("actualMinutes", dash(metrics.actual_minutes)),
        ("billedMinutes", dash(metrics.billed_minutes)),
        ("efficiency", dash(metrics.efficiency.map(format_ratio))),
        ("productivity", dash(metrics.productivity.map(format_ratio))),
        ("proficiency", dash(metrics.proficiency.map(format_ratio))),
        ("avgRating", dash(metrics.avg_rating)),
        ("jobsCompleted", dash(metrics.jobs_completed)),
    ];
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value]);
    }
    if let Some(rollup) = &metrics.rollup {
        table.add_row(vec![
            "rollup.jobsCompletedTotal".to_string(),
            dash(rollup.jobs_completed_total),
        ]);
        table.add_row(vec![
            "rollup.avgDuration".to_string(),
            format_duration(rollup.avg_duration_ms.map(|v| v as i64)),
        ]);
    }
    table.to_string()
}

pub fn render_scorecard_table(card: &Scorecard) -> String {
    let mut table = new_table();
    table.set_header(vec!["Metric", "Value", "State"]);
    for tile in &card.tiles {
        table.add_row(Row::from(vec![
            Cell::new(tile.label),
            Cell::new(&tile.value),
            state_cell(tile.state),
        ]));
    }

    let rec = &card.recommendation;
    let mut out = format!("Scorecard: {}\n", card.label());
    out.push_str(&table.to_string());
    out.push_str(&format!(
        "\nTraining needed: {}",
        if rec.needed { "YES" } else { "NO" }
    ));
    if let Some(module) = rec.module {
        out.push_str(&format!("\nRecommended module: {module}"));
    }
    for reason in &rec.reasons {
        out.push_str(&format!("\n  - {reason}"));
    }
    out
}

pub fn render_ranking_table(ranking: &[ModuleDeficit]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Rank", "Module", "Metric", "Deficit"]);
    for (idx, item) in ranking.iter().enumerate() {
        table.add_row(vec![
            (idx + 1).to_string(),
            item.module.to_string(),
            item.module.metric().to_string(),
            format!("{:.3}", item.delta),
        ]);
    }
    table.to_string()
}

pub fn render_roster_table(technicians: &[Technician]) -> String {
    let mut table = new_table();
    table.set_header(vec!["UID", "Name", "Email", "Phone", "Source", "Profile"]);
    for tech in technicians {
        let profile = match validate_profile(&tech.profile()) {
            Ok(()) => Cell::new("ok").fg(Color::Green),
            Err(err) => Cell::new(err.to_string()).fg(Color::Yellow),
        };
        table.add_row(Row::from(vec![
            Cell::new(&tech.uid),
            Cell::new(tech.display()),
            Cell::new(dash(Some(&tech.email).filter(|e| !e.is_empty()))),
            Cell::new(dash(Some(&tech.phone).filter(|p| !p.is_empty()))),
            Cell::new(&tech.source_node),
            profile,
        ]));
    }
    table.to_string()
}

pub fn render_report_table(report: &JobReport, snapshot: Option<&TechnicianSnapshot>) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Job ID",
        "Title",
        "Technician",
        "Status",
        "Created",
        "Started",
        "Completed",
        "Duration",
    ]);
    for row in &report.rows {
        let job = &row.job;
        table.add_row(vec![
            job.id.clone(),
            dash(job.title.as_deref()),
            dash(job.assigned_to.as_deref()),
            job.status.clone(),
            dash(job.created_at.map(|t| t.format("%Y-%m-%d %H:%M"))),
            dash(job.started_at.map(|t| t.format("%Y-%m-%d %H:%M"))),
            dash(job.completed_at.map(|t| t.format("%Y-%m-%d %H:%M"))),
            format_duration(row.duration_ms),
        ]);
    }

    let summary = &report.summary;
    let mut out = table.to_string();
    out.push_str(&format!(
        "\nTotal: {}  Completed: {}  Pending: {}  Avg time: {}  Completion: {}",
        summary.total,
        summary.completed,
        summary.pending,
        format_duration(summary.avg_duration_ms),
        summary
            .completion_pct
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| "-".to_string()),
    ));
    if !report.status_counts.is_empty() {
        let counts = report
            .status_counts
            .iter()
            .map(|(status, count)| format!("{status}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("\nBy status: {counts}"));
    }
    if let Some(snap) = snapshot {
        out.push_str(&format!(
            "\n{}: {} jobs, avg {}, rating {}, training {}",
            snap.name,
            snap.jobs,
            format_duration(snap.avg_duration_ms),
            dash(snap.rating.as_deref()),
            dash(snap.training.as_deref()),
        ));
    }
    out
}

pub fn render_trainings_table(items: &[TrainingAssignment]) -> String {
    let mut table = new_table();
    table.set_header(vec!["ID", "Module", "Status", "Assigned By", "Created At"]);
    for item in items {
        let status = match item.status {
            TrainingStatus::Scheduled => Cell::new(item.status).fg(Color::Yellow),
            TrainingStatus::Completed => Cell::new(item.status).fg(Color::Green),
            TrainingStatus::Cancelled => Cell::new(item.status),
        };
        table.add_row(Row::from(vec![
            Cell::new(item.id),
            Cell::new(item.module),
            status,
            Cell::new(&item.assigned_by),
            Cell::new(item.created_at.to_rfc3339()),
        ]));
    }
    table.to_string()
}

pub fn render_history_table(records: &[EvaluationRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Evaluated At", "Needed", "Module", "Reasons"]);
    for rec in records {
        table.add_row(vec![
            rec.evaluated_at.to_rfc3339(),
            rec.needed.to_string(),
            dash(rec.module),
            rec.reasons.join("; "),
        ]);
    }
    table.to_string()
}

pub fn render_suggestion_table(suggestion: &AssigneeSuggestion) -> String {
    let mut table = new_table();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![
        "Assignee".to_string(),
        dash(suggestion.name.as_deref().or(suggestion.technician_uid.as_deref())),
    ]);
    table.add_row(vec!["Open jobs".to_string(), suggestion.open_jobs.to_string()]);
    table.add_row(vec![
        "Service".to_string(),
        dash(suggestion.service_type.as_deref()),
    ]);
    table.add_row(vec![
        "Duration".to_string(),
        format!("{} min", suggestion.duration_minutes),
    ]);
    table.to_string()
}
