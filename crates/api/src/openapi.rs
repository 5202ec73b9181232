use crate::models;
use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CRM Membership API",
        description = "Multi-tenant organization membership and authorization API"
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::users::get_current_user,
        crate::routes::organizations::list_organizations,
        crate::routes::organizations::create_organization,
        crate::routes::organizations::get_organization,
        crate::routes::organizations::update_organization_settings,
        crate::routes::organizations::delete_organization,
        crate::routes::organizations::switch_organization,
        crate::routes::organization_members::list_organization_members,
        crate::routes::organization_members::update_organization_member,
        crate::routes::organization_members::remove_organization_member,
        crate::routes::organization_members::leave_organization,
        crate::routes::invitations::create_invitation,
        crate::routes::invitations::list_invitations,
        crate::routes::invitations::verify_invitation,
        crate::routes::invitations::accept_invitation,
    ),
    components(schemas(
        services::authz::Role,
        services::invitation::InvitationStatus,
        models::ErrorResponse,
        models::ErrorDetail,
        models::HealthResponse,
        models::OrganizationSettingsBody,
        models::CreateOrganizationRequest,
        models::UpdateOrganizationSettingsRequest,
        models::OrganizationResponse,
        models::ListOrganizationsResponse,
        models::OrganizationMemberResponse,
        models::ListOrganizationMembersResponse,
        models::UpdateMemberRoleRequest,
        models::CurrentUserResponse,
        models::CreateInvitationRequest,
        models::InvitationResponse,
        models::CreateInvitationResponse,
        models::ListInvitationsResponse,
        models::VerifyInvitationResponse,
    )),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Users", description = "Authenticated principal profile"),
        (name = "Organizations", description = "Organization lifecycle"),
        (name = "Organization Members", description = "Membership management"),
        (name = "Invitations", description = "Invitation flow"),
    )
)]
pub struct ApiDoc;

pub async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
