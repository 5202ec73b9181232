//! Notification dispatch port.
//!
//! Delivery mechanics (SMTP, provider API, templating) live behind this
//! trait; the domain only specifies the call contract. Dispatch failure is
//! never fatal to the operation that triggered it.

use crate::authz::Role;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvitationNotification {
    pub recipient: String,
    pub organization_name: String,
    pub inviter: String,
    pub join_link: String,
    pub role: Role,
}

#[cfg_attr(any(test, feature = "test-mocks"), mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_invitation(&self, notification: &InvitationNotification) -> anyhow::Result<()>;
}
