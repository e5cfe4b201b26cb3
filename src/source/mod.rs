pub mod export;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::jobs::JobRecord;
use crate::metrics::sessions::SessionRecord;
use crate::roster::Technician;

/// One entry under `performance/{uid}` together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySnapshot {
    pub key: String,
    pub record: Value,
}

impl DailySnapshot {
    /// The day the snapshot covers, when its key is a `YYYY-MM-DD` date.
    pub fn day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.key.trim(), "%Y-%m-%d").ok()
    }
}

/// Read side of the shop's realtime database. Implementations hand back
/// loosely-typed records; normalization happens in `metrics` and `jobs`.
#[async_trait]
pub trait DashboardSource: Send + Sync {
    fn name(&self) -> &str;
    async fn technicians(&self) -> Result<Vec<Technician>>;
    async fn user_profile(&self, uid: &str) -> Result<Option<Value>>;
    /// Most recent entry under `performance/{uid}`, by key order.
    async fn latest_daily(&self, uid: &str) -> Result<Option<DailySnapshot>>;
    async fn technician_stats(&self, uid: &str) -> Result<Option<Value>>;
    async fn sessions(&self, uid: &str) -> Result<Vec<SessionRecord>>;
    async fn jobs(&self) -> Result<Vec<JobRecord>>;
}
