use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use crate::config::NotificationsConfig;
use crate::notify::engine::NotificationEvent;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, event: &NotificationEvent) -> Result<()>;
}

pub struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        println!("[{}] {} - {}", event.kind, event.title, event.body);
        Ok(())
    }
}

pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("shop-scorecard/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn is_discord(&self) -> bool {
        self.url.contains("discord.com/api/webhooks")
            || self.url.contains("discordapp.com/api/webhooks")
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        let req = if self.is_discord() {
            let content = format!("[{}] {}\n{}", event.kind, event.title, event.body);
            self.client
                .post(&self.url)
                .json(&serde_json::json!({ "content": content }))
        } else {
            self.client.post(&self.url).json(event)
        };

        req.send()
            .await
            .with_context(|| format!("webhook request failed: {}", self.url))?
            .error_for_status()?;
        Ok(())
    }
}

pub fn build_sinks(config: &NotificationsConfig) -> Result<Vec<Box<dyn NotificationSink>>> {
    let mut sinks: Vec<Box<dyn NotificationSink>> = Vec::new();
    if config.enable_stdout {
        sinks.push(Box::new(StdoutSink));
    }
    if !config.webhook_url.trim().is_empty() {
        sinks.push(Box::new(WebhookSink::new(config.webhook_url.trim())?));
    }
    Ok(sinks)
}

/// Delivers every event to every sink. A failing sink is logged and does
/// not stop the others.
pub async fn dispatch(sinks: &[Box<dyn NotificationSink>], events: &[NotificationEvent]) {
    for event in events {
        for sink in sinks {
            if let Err(err) = sink.send(event).await {
                warn!(kind = %event.kind, error = %err, "notification delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::NotificationsConfig;
    use crate::notify::sink::{build_sinks, WebhookSink};

    #[test]
    fn builds_sinks_from_config() {
        let mut config = NotificationsConfig::default();
        assert_eq!(build_sinks(&config).expect("sinks").len(), 1);

        config.enable_stdout = false;
        assert!(build_sinks(&config).expect("sinks").is_empty());

        config.webhook_url = "https://discord.com/api/webhooks/1/abc".to_string();
        assert_eq!(build_sinks(&config).expect("sinks").len(), 1);
    }

    #[test]
    fn recognizes_discord_urls() {
        let sink = WebhookSink::new("https://discordapp.com/api/webhooks/1/x").expect("sink");
        assert!(sink.is_discord());
        let plain = WebhookSink::new("https://hooks.example.com/shop").expect("sink");
        assert!(!plain.is_discord());
    }
}
