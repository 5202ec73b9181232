use crate::authz::Role;
use crate::common::RepositoryError;
use crate::organization::OrganizationId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
        }
    }

    pub fn parse(s: &str) -> Option<InvitationStatus> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            _ => None,
        }
    }
}

/// A pending offer of membership at a specific role in a specific
/// organization. The token is a single-use bearer credential.
///
/// Invitations transition pending -> accepted exactly once and are never
/// deleted; expired ones simply stop verifying. The audit trail stays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invitation {
    pub id: Uuid,
    pub organization_id: OrganizationId,
    pub email: String,
    pub role: Role,
    /// External identity of the inviter
    pub invited_by: String,
    pub status: InvitationStatus,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_acceptable(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && !self.is_expired(now)
    }
}

/// What `verify` exposes for a valid token. Invalid tokens get a generic
/// error and never leak organization details.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvitationDetails {
    pub email: String,
    pub organization_name: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of `create_invitation`. `notified = false` is the
/// partial-success signal: the invitation stands even though the
/// notification could not be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedInvitation {
    pub invitation: Invitation,
    pub notified: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InvitationError {
    // Covers unknown, expired and already-consumed tokens alike
    #[error("Invitation not found or expired")]
    InvalidToken,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Admin role cannot be granted by invitation")]
    RoleNotGrantable,

    #[error("User is already a member of this organization")]
    AlreadyMember,

    #[error("A pending invitation already exists for this email")]
    AlreadyPending,

    #[error("The invited email does not match the accepting account")]
    EmailMismatch,

    #[error("Organization limit reached (at most 3 active organizations per user)")]
    LimitReached,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg_attr(any(test, feature = "test-mocks"), mockall::automock)]
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Persist a pending invitation with a freshly generated single-use
    /// token expiring `expires_in_days` from now.
    async fn create(
        &self,
        organization_id: Uuid,
        email: &str,
        role: Role,
        invited_by: &str,
        expires_in_days: i64,
    ) -> Result<Invitation, RepositoryError>;

    async fn get_by_token(&self, token: &str) -> Result<Option<Invitation>, RepositoryError>;

    /// Pending, non-expired invitation for this (organization, email) pair
    async fn find_pending(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, RepositoryError>;

    /// Transition pending -> accepted. Conditional on the row still being
    /// pending; a consumed or unknown invitation fails with
    /// `RepositoryError::NotFound`.
    async fn mark_accepted(&self, id: Uuid) -> Result<Invitation, RepositoryError>;

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, RepositoryError>;
}
