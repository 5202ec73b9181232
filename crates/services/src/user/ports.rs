use crate::authz::Role;
use crate::common::RepositoryError;
use crate::organization::OrganizationId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        UserId(uuid)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verified (identity, email) pair supplied by the external identity
/// provider. The pairing is trusted completely; no credential handling
/// happens on this side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub identity: String,
    pub email: String,
}

impl Principal {
    /// Emails are compared case-insensitively everywhere, so normalize once
    /// at the boundary.
    pub fn new(identity: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            email: email.into().trim().to_ascii_lowercase(),
        }
    }
}

/// One authenticated principal's profile.
///
/// `role` and `organization_id` describe the *current* active organization
/// context. The role is a denormalized copy of the membership record and is
/// rewritten from it on every organization switch; the membership table is
/// the sole source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    pub identity: String,
    pub email: String,
    pub role: Role,
    pub organization_id: Option<OrganizationId>,
    /// Derived from active memberships on read, never stored independently
    pub organization_ids: Vec<OrganizationId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// A profile with no memberships must create an organization before
    /// using the rest of the system.
    pub fn onboarding_required(&self) -> bool {
        self.organization_ids.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg_attr(any(test, feature = "test-mocks"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_identity(&self, identity: &str)
        -> Result<Option<UserProfile>, RepositoryError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, RepositoryError>;

    /// Create the profile if absent, otherwise refresh email/role/active
    /// organization for the given identity.
    async fn upsert(
        &self,
        principal: &Principal,
        role: Role,
        organization_id: Option<Uuid>,
    ) -> Result<UserProfile, RepositoryError>;

    /// Rewrite the active organization context. `role`, when given, is the
    /// membership role re-derived by the caller.
    async fn set_active_organization(
        &self,
        identity: &str,
        organization_id: Option<Uuid>,
        role: Option<Role>,
    ) -> Result<UserProfile, RepositoryError>;

    /// Soft-delete a profile. Explicit admin action only.
    async fn deactivate(&self, identity: &str) -> Result<bool, RepositoryError>;
}
