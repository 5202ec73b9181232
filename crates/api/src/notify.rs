//! Webhook-backed invitation notification delivery.

use anyhow::Context;
use async_trait::async_trait;
use services::notify::{InvitationNotification, Notifier};
use tracing::info;

/// Posts invitation notifications to an external delivery endpoint. With no
/// endpoint configured the join link is logged instead, which keeps local
/// development usable without a delivery service.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl WebhookNotifier {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_invitation(&self, notification: &InvitationNotification) -> anyhow::Result<()> {
        let Some(endpoint) = &self.endpoint else {
            info!(
                recipient = %notification.recipient,
                join_link = %notification.join_link,
                "No notification endpoint configured, logging join link"
            );
            return Ok(());
        };

        let response = self
            .client
            .post(endpoint)
            .json(notification)
            .send()
            .await
            .context("Failed to reach notification endpoint")?;

        if !response.status().is_success() {
            anyhow::bail!("Notification endpoint returned {}", response.status());
        }
        Ok(())
    }
}
