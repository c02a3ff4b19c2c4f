//! Outbound alerting adapters for `domain::ports::NotifierPort`.

use crate::domain::ports::{Notification, NotifierPort};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

/// Default adapter: folds notifications into structured logs. Always
/// correct, never silently drops a critical alert even with no webhook
/// configured.
pub struct NullNotifier;

#[async_trait]
impl NotifierPort for NullNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        match notification.severity {
            crate::domain::ports::NotificationSeverity::Critical => {
                warn!(title = %notification.title, body = %notification.body, "critical notification");
            }
            _ => {
                info!(title = %notification.title, body = %notification.body, "notification");
            }
        }
        Ok(())
    }
}

/// Posts the notification as a JSON payload to a configured webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self { client: reqwest::Client::new(), url }
    }
}

#[async_trait]
impl NotifierPort for WebhookNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&notification)
            .send()
            .await
            .context("failed to deliver webhook notification")?
            .error_for_status()
            .context("webhook notifier received an error response")?;
        Ok(())
    }
}
