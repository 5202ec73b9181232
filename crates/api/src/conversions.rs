//! Mapping between domain types and wire models.

use crate::models::{
    CreateInvitationResponse, CurrentUserResponse, InvitationResponse, OrganizationMemberResponse,
    OrganizationResponse, OrganizationSettingsBody, VerifyInvitationResponse,
};
use services::invitation::{CreatedInvitation, Invitation, InvitationDetails};
use services::organization::{Member, Organization, OrganizationSettings};
use services::user::{Principal, UserProfile};

pub fn settings_to_api(settings: OrganizationSettings) -> OrganizationSettingsBody {
    OrganizationSettingsBody {
        invite_required: settings.invite_required,
        extra: settings.extra,
    }
}

pub fn api_to_settings(body: OrganizationSettingsBody) -> OrganizationSettings {
    OrganizationSettings {
        invite_required: body.invite_required,
        extra: body.extra,
    }
}

pub fn organization_to_api(organization: Organization) -> OrganizationResponse {
    OrganizationResponse {
        id: organization.id.0,
        name: organization.name,
        created_by: organization.created_by,
        settings: settings_to_api(organization.settings),
        created_at: organization.created_at,
        updated_at: organization.updated_at,
    }
}

pub fn member_to_api(member: Member) -> OrganizationMemberResponse {
    OrganizationMemberResponse {
        organization_id: member.organization_id.0,
        identity: member.identity,
        email: member.email,
        role: member.role,
        joined_at: member.joined_at,
    }
}

pub fn profile_to_api(profile: UserProfile) -> CurrentUserResponse {
    let onboarding_required = profile.onboarding_required();
    CurrentUserResponse {
        identity: profile.identity,
        email: profile.email,
        role: Some(profile.role),
        organization_id: profile.organization_id.map(|id| id.0),
        organization_ids: profile.organization_ids.into_iter().map(|id| id.0).collect(),
        onboarding_required,
    }
}

/// View for a principal that has authenticated but has no profile yet.
pub fn onboarding_view(principal: &Principal) -> CurrentUserResponse {
    CurrentUserResponse {
        identity: principal.identity.clone(),
        email: principal.email.clone(),
        role: None,
        organization_id: None,
        organization_ids: Vec::new(),
        onboarding_required: true,
    }
}

pub fn invitation_to_api(invitation: Invitation) -> InvitationResponse {
    InvitationResponse {
        id: invitation.id,
        organization_id: invitation.organization_id.0,
        email: invitation.email,
        role: invitation.role,
        invited_by: invitation.invited_by,
        status: invitation.status,
        created_at: invitation.created_at,
        expires_at: invitation.expires_at,
        responded_at: invitation.responded_at,
    }
}

pub fn created_invitation_to_api(created: CreatedInvitation) -> CreateInvitationResponse {
    let token = created.invitation.token.clone();
    CreateInvitationResponse {
        invitation: invitation_to_api(created.invitation),
        token,
        notified: created.notified,
    }
}

pub fn invitation_details_to_api(details: InvitationDetails) -> VerifyInvitationResponse {
    VerifyInvitationResponse {
        email: details.email,
        organization_name: details.organization_name,
        role: details.role,
        expires_at: details.expires_at,
    }
}
