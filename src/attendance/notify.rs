//! Fire-and-forget punch notifications for the external notification service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PunchNotification {
    pub employee_name: String,
    pub branch_id: Option<u64>,
    pub status: String,
    pub photo: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub event_time: DateTime<Utc>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &PunchNotification) -> Result<()>;
}

/// Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &PunchNotification) -> Result<()> {
        info!(
            employee = %notification.employee_name,
            branch_id = ?notification.branch_id,
            status = %notification.status,
            event_time = %notification.event_time,
            "Punch notification"
        );
        Ok(())
    }
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build notification client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &PunchNotification) -> Result<()> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .with_context(|| format!("notification webhook {} unreachable", self.url))?
            .error_for_status()
            .context("notification webhook rejected payload")?;
        Ok(())
    }
}

pub fn notifier_for(webhook_url: Option<&str>) -> Result<Arc<dyn Notifier>> {
    match webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url.to_string())?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
