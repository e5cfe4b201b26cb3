use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::evaluation::{MissingJobsPolicy, ThresholdConfig};
use crate::metrics::sessions::SessionInference;

pub const REDACTED: &str = "[redacted]";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub operator: OperatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationConfig {
    /// Overrides `thresholds.missing_jobs` when set.
    #[serde(default)]
    pub missing_jobs: Option<MissingJobsPolicy>,
    #[serde(default)]
    pub infer_from_sessions: bool,
    #[serde(default)]
    pub shift_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_export_path")]
    pub export_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperatorConfig {
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub rules: NotificationRulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRulesConfig {
    #[serde(default = "default_true")]
    pub training_recommended: bool,
    #[serde(default = "default_true")]
    pub training_assigned: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub export_path: Option<String>,
    pub db_path: Option<String>,
    pub operator_uid: Option<String>,
    pub missing_jobs: Option<MissingJobsPolicy>,
    pub infer_from_sessions: Option<bool>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/shop-scorecard/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::from_toml(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let mut parsed: Self = toml::from_str(data)?;
        if let Some(policy) = parsed.evaluation.missing_jobs {
            parsed.thresholds.missing_jobs = policy;
        }
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(export_path) = overrides.export_path {
            self.source.export_path = export_path;
        }
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(uid) = overrides.operator_uid {
            self.operator.uid = uid;
        }
        if let Some(policy) = overrides.missing_jobs {
            self.evaluation.missing_jobs = Some(policy);
            self.thresholds.missing_jobs = policy;
        }
        if let Some(infer) = overrides.infer_from_sessions {
            self.evaluation.infer_from_sessions = infer;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_export_path(&self) -> PathBuf {
        expand_tilde(&self.source.export_path)
    }

    /// Copy safe to hand to API clients: the webhook URL carries its token.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.notifications.webhook_url.is_empty() {
            config.notifications.webhook_url = REDACTED.to_string();
        }
        config
    }

    /// The session pre-processing stage, when enabled.
    pub fn session_inference(&self) -> Option<SessionInference> {
        self.evaluation
            .infer_from_sessions
            .then(|| SessionInference::new(self.evaluation.shift_minutes))
    }

    pub fn default_template() -> String {
        let template = r#"[thresholds]
efficiency = 0.85
productivity = 0.80
proficiency = 0.80
rating = 4.0
min_jobs_if_full_day = 3
full_day_minutes = 420

[evaluation]
# "exempt" skips the full-day job check when no job count was recorded;
# "zero" treats a missing count as zero jobs.
missing_jobs = "exempt"
infer_from_sessions = false
# shift_minutes = 480

[source]
export_path = "~/.local/share/shop-scorecard/export.json"

[storage]
db_path = "~/.local/share/shop-scorecard/scorecard.db"

[operator]
uid = ""

[server]
host = "127.0.0.1"
port = 8080

[notifications]
enable_stdout = true
webhook_url = ""

[notifications.rules]
training_recommended = true
training_assigned = true
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            export_path: default_export_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enable_stdout: default_enable_stdout(),
            webhook_url: String::new(),
            rules: NotificationRulesConfig::default(),
        }
    }
}

impl Default for NotificationRulesConfig {
    fn default() -> Self {
        Self {
            training_recommended: true,
            training_assigned: true,
        }
    }
}

fn default_export_path() -> String {
    "~/.local/share/shop-scorecard/export.json".to_string()
}

fn default_db_path() -> String {
    "~/.local/share/shop-scorecard/scorecard.db".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_enable_stdout() -> bool {
    true
}

fn default_true() -> bool {
    true
}
