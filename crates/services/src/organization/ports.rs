use crate::authz::Role;
use crate::common::RepositoryError;
use crate::user::Principal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single identity (by email) may hold active membership in at most this
/// many active organizations system-wide.
pub const MAX_ACTIVE_ORGANIZATIONS: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OrganizationId(pub Uuid);

impl From<Uuid> for OrganizationId {
    fn from(uuid: Uuid) -> Self {
        OrganizationId(uuid)
    }
}

impl std::fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant settings. A fixed set of known fields plus one explicit
/// open-ended map; arbitrary client-supplied shapes are never merged in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganizationSettings {
    /// When true, joining requires an invitation
    pub invite_required: bool,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            invite_required: true,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// External identity of the creator
    pub created_by: String,
    pub settings: OrganizationSettings,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership record embedded in an organization. This is the authoritative
/// source of per-organization role; any role cached on a profile is
/// re-derived from here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub organization_id: OrganizationId,
    pub email: String,
    pub identity: String,
    pub role: Role,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub email: String,
    pub identity: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum OrganizationError {
    #[error("Organization not found")]
    NotFound,

    #[error("Organization member not found")]
    MemberNotFound,

    #[error("Not a member of this organization")]
    NotAMember,

    // Reported generically; never leaks which permission was required
    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("User is already a member")]
    AlreadyMember,

    // Operation would break a membership invariant (last admin, sole
    // member); the state stays as it is
    #[error("{0}")]
    Conflict(String),

    #[error("Organization limit reached (at most 3 active organizations per user)")]
    LimitReached,

    #[error("Cannot delete: a member would be left without any organization")]
    LastOrganization,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg_attr(any(test, feature = "test-mocks"), mockall::automock)]
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Create an organization with the creator as sole admin member and the
    /// creator's profile switched into it, as one transaction. The
    /// per-email organization limit is re-checked inside the transaction;
    /// exceeding it fails with `RepositoryError::LimitExceeded` and nothing
    /// is written.
    async fn create_with_owner(
        &self,
        name: &str,
        settings: &OrganizationSettings,
        owner: &Principal,
    ) -> Result<Organization, RepositoryError>;

    /// Active organizations only
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Organization>, RepositoryError>;

    /// Active organizations where the email holds an active membership
    async fn list_for_email(&self, email: &str) -> Result<Vec<Organization>, RepositoryError>;

    async fn count_active_for_email(&self, email: &str) -> Result<i64, RepositoryError>;

    async fn get_member_by_identity(
        &self,
        organization_id: Uuid,
        identity: &str,
    ) -> Result<Option<Member>, RepositoryError>;

    async fn get_member_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Member>, RepositoryError>;

    /// Fails with `RepositoryError::AlreadyExists` if the identity already
    /// holds an active membership.
    async fn add_member(
        &self,
        organization_id: Uuid,
        member: &NewMember,
    ) -> Result<Member, RepositoryError>;

    async fn update_member_role(
        &self,
        organization_id: Uuid,
        identity: &str,
        role: Role,
    ) -> Result<Member, RepositoryError>;

    async fn remove_member(
        &self,
        organization_id: Uuid,
        identity: &str,
    ) -> Result<bool, RepositoryError>;

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Member>, RepositoryError>;

    async fn count_admins(&self, organization_id: Uuid) -> Result<i64, RepositoryError>;

    async fn count_members(&self, organization_id: Uuid) -> Result<i64, RepositoryError>;

    /// Soft-delete the organization and detach every member, re-pointing
    /// profiles whose active organization was the deleted one, as one
    /// transaction.
    async fn soft_delete_with_detach(&self, organization_id: Uuid) -> Result<(), RepositoryError>;

    async fn update_settings(
        &self,
        organization_id: Uuid,
        settings: &OrganizationSettings,
    ) -> Result<Organization, RepositoryError>;
}
