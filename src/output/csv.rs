use anyhow::Result;

use crate::evaluation::{EvaluationRecord, ModuleDeficit, Scorecard};
use crate::reports::{format_duration, JobReport};
use crate::roster::Technician;
use crate::training::TrainingAssignment;

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn report_to_csv(report: &JobReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "job_id",
        "title",
        "technician",
        "status",
        "created_at",
        "started_at",
        "completed_at",
        "duration",
    ])?;
    for row in &report.rows {
        let job = &row.job;
        writer.write_record([
            job.id.clone(),
            opt(job.title.as_deref()),
            opt(job.assigned_to.as_deref()),
            job.status.clone(),
            opt(job.created_at.map(|t| t.to_rfc3339())),
            opt(job.started_at.map(|t| t.to_rfc3339())),
            opt(job.completed_at.map(|t| t.to_rfc3339())),
            format_duration(row.duration_ms),
        ])?;
    }
    finish(writer)
}

pub fn scorecard_to_csv(card: &Scorecard) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["metric", "value", "state"])?;
    for tile in &card.tiles {
        writer.write_record([
            tile.label.to_string(),
            tile.value.clone(),
            opt(tile.state.map(|s| s.label())),
        ])?;
    }
    finish(writer)
}

pub fn ranking_to_csv(ranking: &[ModuleDeficit]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["rank", "module", "metric", "deficit"])?;
    for (idx, item) in ranking.iter().enumerate() {
        writer.write_record([
            (idx + 1).to_string(),
            item.module.to_string(),
            item.module.metric().to_string(),
            format!("{:.3}", item.delta),
        ])?;
    }
    finish(writer)
}

pub fn roster_to_csv(technicians: &[Technician]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["uid", "name", "email", "phone", "address", "source"])?;
    for tech in technicians {
        writer.write_record([
            tech.uid.as_str(),
            tech.display(),
            tech.email.as_str(),
            tech.phone.as_str(),
            tech.address.as_str(),
            tech.source_node.as_str(),
        ])?;
    }
    finish(writer)
}

pub fn trainings_to_csv(items: &[TrainingAssignment]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "technician",
        "module",
        "status",
        "assigned_by",
        "created_at",
    ])?;
    for item in items {
        writer.write_record([
            item.id.to_string(),
            item.technician_uid.clone(),
            item.module.to_string(),
            item.status.to_string(),
            item.assigned_by.clone(),
            item.created_at.timestamp_millis().to_string(),
        ])?;
    }
    finish(writer)
}

pub fn history_to_csv(records: &[EvaluationRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["evaluated_at", "needed", "module", "reasons"])?;
    for rec in records {
        writer.write_record([
            rec.evaluated_at.to_rfc3339(),
            rec.needed.to_string(),
            opt(rec.module),
            rec.reasons.join("; "),
        ])?;
    }
    finish(writer)
}
