pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS training_assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    technician_uid TEXT NOT NULL,
    assigned_by TEXT NOT NULL,
    module TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_training_technician_created
    ON training_assignments(technician_uid, created_at DESC);

CREATE TABLE IF NOT EXISTS evaluation_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    technician_uid TEXT NOT NULL,
    evaluated_at TEXT NOT NULL,
    needed INTEGER NOT NULL,
    module TEXT,
    reasons_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_evaluation_technician_time
    ON evaluation_history(technician_uid, evaluated_at DESC);
"#;
