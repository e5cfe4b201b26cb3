use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::jobs::JobRecord;
use crate::metrics::sessions::SessionRecord;
use crate::roster::{load_technicians, Technician};
use crate::source::{DailySnapshot, DashboardSource};

pub const USERS_NODES: [&str; 2] = ["users", "Users"];
pub const PERFORMANCE_NODE: &str = "performance";
pub const STATS_NODE: &str = "technicianStats";
pub const SESSIONS_NODE: &str = "jobSessions";
pub const JOBS_NODE: &str = "Jobs";

/// A full JSON export of the realtime database, loaded once.
#[derive(Debug, Clone)]
pub struct ExportSource {
    root: Value,
}

impl ExportSource {
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading database export: {}", path.display()))?;
        let root: Value = serde_json::from_str(&data)
            .with_context(|| format!("invalid JSON in database export: {}", path.display()))?;
        Ok(Self::from_value(root))
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    fn node(&self, name: &str) -> Option<&Map<String, Value>> {
        self.root.get(name).and_then(Value::as_object)
    }

    fn child(&self, name: &str, key: &str) -> Option<&Value> {
        self.node(name)
            .and_then(|node| node.get(key))
            .filter(|v| !v.is_null())
    }
}

#[async_trait]
impl DashboardSource for ExportSource {
    fn name(&self) -> &str {
        "export"
    }

    async fn technicians(&self) -> Result<Vec<Technician>> {
        Ok(load_technicians(&self.root))
    }

    async fn user_profile(&self, uid: &str) -> Result<Option<Value>> {
        Ok(USERS_NODES
            .iter()
            .find_map(|node| self.child(node, uid))
            .cloned())
    }

    async fn latest_daily(&self, uid: &str) -> Result<Option<DailySnapshot>> {
        let Some(days) = self.child(PERFORMANCE_NODE, uid).and_then(Value::as_object) else {
            return Ok(None);
        };
        Ok(days
            .iter()
            .max_by(|a, b| a.0.cmp(b.0))
            .map(|(key, record)| DailySnapshot {
                key: key.clone(),
                record: record.clone(),
            }))
    }

    async fn technician_stats(&self, uid: &str) -> Result<Option<Value>> {
        Ok(self.child(STATS_NODE, uid).cloned())
    }

    async fn sessions(&self, uid: &str) -> Result<Vec<SessionRecord>> {
        let Some(node) = self.node(SESSIONS_NODE) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        // Sessions may be stored flat with a technician field, or grouped
        // under the technician's uid.
        for (key, value) in node {
            if key == uid {
                if let Some(grouped) = value.as_object() {
                    for (id, raw) in grouped {
                        let mut session = SessionRecord::from_value(id.clone(), raw);
                        session.technician.get_or_insert_with(|| uid.to_string());
                        out.push(session);
                    }
                }
                continue;
            }
            let session = SessionRecord::from_value(key.clone(), value);
            if session.technician.as_deref() == Some(uid) {
                out.push(session);
            }
        }
        Ok(out)
    }

    async fn jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self
            .node(JOBS_NODE)
            .map(|jobs| {
                jobs.iter()
                    .map(|(id, value)| JobRecord::from_value(id.clone(), value))
                    .collect()
            })
            .unwrap_or_default())
    }
}
