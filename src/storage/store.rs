use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

use crate::evaluation::{EvaluationRecord, TrainingModule};
use crate::storage::migrations::BASE_MIGRATION;
use crate::training::{TrainingAssignment, TrainingStatus};

pub struct ScorecardStore {
    conn: Connection,
}

impl ScorecardStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening database {}", path.display()))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn insert_training(
        &self,
        technician_uid: &str,
        assigned_by: &str,
        module: TrainingModule,
        created_at: DateTime<Utc>,
    ) -> Result<TrainingAssignment> {
        let status = TrainingStatus::Scheduled;
        // stored at millisecond precision; hand back what a reload would see
        let created_at = Utc
            .timestamp_millis_opt(created_at.timestamp_millis())
            .single()
            .unwrap_or(created_at);
        self.conn.execute(
            r#"
INSERT INTO training_assignments(technician_uid, assigned_by, module, status, created_at)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                technician_uid,
                assigned_by,
                module.name(),
                status.as_str(),
                created_at.timestamp_millis()
            ],
        )?;
        Ok(TrainingAssignment {
            id: self.conn.last_insert_rowid(),
            technician_uid: technician_uid.to_string(),
            assigned_by: assigned_by.to_string(),
            created_at,
            module,
            status,
        })
    }

    pub fn list_trainings(&self, technician_uid: &str) -> Result<Vec<TrainingAssignment>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, technician_uid, assigned_by, module, status, created_at
FROM training_assignments
WHERE technician_uid = ?1
ORDER BY created_at DESC, id DESC
"#,
        )?;
        let rows = stmt
            .query_map(params![technician_uid], row_to_training)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Returns false when no assignment has the given id.
    pub fn update_training_status(&self, id: i64, status: TrainingStatus) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE training_assignments SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO evaluation_history(technician_uid, evaluated_at, needed, module, reasons_json)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                record.technician_uid,
                record.evaluated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                if record.needed { 1 } else { 0 },
                record.module.map(|m| m.name()),
                serde_json::to_string(&record.reasons)?
            ],
        )?;
        Ok(())
    }

    pub fn load_evaluations(
        &self,
        technician_uid: &str,
        limit: usize,
    ) -> Result<Vec<EvaluationRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT technician_uid, evaluated_at, needed, module, reasons_json
FROM evaluation_history
WHERE technician_uid = ?1
ORDER BY evaluated_at DESC, id DESC
LIMIT ?2
"#,
        )?;
        let rows = stmt
            .query_map(params![technician_uid, limit as i64], row_to_evaluation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_module(idx: usize, raw: &str) -> rusqlite::Result<TrainingModule> {
    raw.parse::<TrainingModule>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_training(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrainingAssignment> {
    let module_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;
    let status = status_raw
        .parse::<TrainingStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let created_millis: i64 = row.get(5)?;
    Ok(TrainingAssignment {
        id: row.get(0)?,
        technician_uid: row.get(1)?,
        assigned_by: row.get(2)?,
        module: parse_module(3, &module_raw)?,
        status,
        created_at: Utc
            .timestamp_millis_opt(created_millis)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

fn row_to_evaluation(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvaluationRecord> {
    let evaluated_raw: String = row.get(1)?;
    let evaluated_at = DateTime::parse_from_rfc3339(&evaluated_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let module = row
        .get::<_, Option<String>>(3)?
        .map(|raw| parse_module(3, &raw))
        .transpose()?;
    let reasons_raw: String = row.get(4)?;
    let reasons = serde_json::from_str(&reasons_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(EvaluationRecord {
        technician_uid: row.get(0)?,
        evaluated_at,
        needed: row.get::<_, i64>(2)? != 0,
        module,
        reasons,
    })
}
