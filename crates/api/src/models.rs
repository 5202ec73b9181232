//! Wire-level request and response types.
//!
//! These are deliberately separate from the domain types in `services`; the
//! HTTP surface never exposes internal fields (soft-delete flags, cached
//! state) directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use services::authz::Role;
use services::invitation::InvitationStatus;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub message: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(message: String, code: String) -> Self {
        Self {
            error: ErrorDetail { message, code },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Tenant settings as they appear on the wire. Unknown keys go into
/// `extra`; they are never merged into the known fields.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationSettingsBody {
    #[serde(default = "default_invite_required")]
    pub invite_required: bool,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_invite_required() -> bool {
    true
}

impl Default for OrganizationSettingsBody {
    fn default() -> Self {
        Self {
            invite_required: true,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    pub name: String,
    #[serde(default)]
    pub settings: Option<OrganizationSettingsBody>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrganizationSettingsRequest {
    pub settings: OrganizationSettingsBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub created_by: String,
    pub settings: OrganizationSettingsBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrganizationsResponse {
    pub organizations: Vec<OrganizationResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationMemberResponse {
    pub organization_id: Uuid,
    pub identity: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrganizationMembersResponse {
    pub members: Vec<OrganizationMemberResponse>,
    pub total: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRoleRequest {
    pub role: Role,
}

/// The authenticated principal's view of itself. `role` and
/// `organization_id` are absent until the principal has onboarded into an
/// organization.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentUserResponse {
    pub identity: String,
    pub email: String,
    pub role: Option<Role>,
    pub organization_id: Option<Uuid>,
    pub organization_ids: Vec<Uuid>,
    pub onboarding_required: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: Role,
}

/// Invitation as listed back to admins. The token never appears here; it
/// is a bearer credential and is returned exactly once, at creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub role: Role,
    pub invited_by: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateInvitationResponse {
    pub invitation: InvitationResponse,
    /// Single-use join token, disclosed only in this response
    pub token: String,
    /// False when the invitation was stored but the notification could not
    /// be delivered; the join link can still be shared out of band.
    pub notified: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListInvitationsResponse {
    pub invitations: Vec<InvitationResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyInvitationResponse {
    pub email: String,
    pub organization_name: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}
