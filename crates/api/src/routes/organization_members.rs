use crate::{
    conversions::member_to_api,
    middleware::AuthenticatedPrincipal,
    models::{
        ErrorResponse, ListOrganizationMembersResponse, OrganizationMemberResponse,
        UpdateMemberRoleRequest,
    },
    routes::{api::AppState, organization_error_response, ApiError},
};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

/// List organization members
#[utoipa::path(
    get,
    path = "/organizations/{org_id}/members",
    tag = "Organization Members",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization members", body = ListOrganizationMembersResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn list_organization_members(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ListOrganizationMembersResponse>, ApiError> {
    let members = app_state
        .organization_service
        .get_members(org_id, &principal)
        .await
        .map_err(organization_error_response)?;

    let members: Vec<OrganizationMemberResponse> =
        members.into_iter().map(member_to_api).collect();
    let total = members.len();
    Ok(Json(ListOrganizationMembersResponse { members, total }))
}

/// Change a member's role
///
/// Demoting the last admin of an organization is rejected.
#[utoipa::path(
    put,
    path = "/organizations/{org_id}/members/{identity}",
    tag = "Organization Members",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("identity" = String, Path, description = "Member identity")
    ),
    request_body = UpdateMemberRoleRequest,
    responses(
        (status = 200, description = "Updated member", body = OrganizationMemberResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Organization or member not found", body = ErrorResponse),
        (status = 409, description = "Last admin cannot be demoted", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn update_organization_member(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path((org_id, identity)): Path<(Uuid, String)>,
    Json(request): Json<UpdateMemberRoleRequest>,
) -> Result<Json<OrganizationMemberResponse>, ApiError> {
    debug!(
        organization_id = %org_id,
        member = %identity,
        role = %request.role,
        "Updating member role"
    );

    let member = app_state
        .organization_service
        .update_member_role(org_id, &principal, &identity, request.role)
        .await
        .map_err(organization_error_response)?;

    Ok(Json(member_to_api(member)))
}

/// Remove a member
///
/// Removing the sole member or the last admin is rejected; delete the
/// organization instead.
#[utoipa::path(
    delete,
    path = "/organizations/{org_id}/members/{identity}",
    tag = "Organization Members",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("identity" = String, Path, description = "Member identity")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Organization or member not found", body = ErrorResponse),
        (status = 409, description = "Sole member or last admin", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn remove_organization_member(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path((org_id, identity)): Path<(Uuid, String)>,
) -> Result<StatusCode, ApiError> {
    app_state
        .organization_service
        .remove_member(org_id, &principal, &identity)
        .await
        .map_err(organization_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Leave an organization
///
/// Self-removal; needs no permission beyond membership. If the left
/// organization was the active context, the profile is re-pointed to a
/// remaining membership.
#[utoipa::path(
    post,
    path = "/organizations/{org_id}/leave",
    tag = "Organization Members",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 204, description = "Left the organization"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Organization or membership not found", body = ErrorResponse),
        (status = 409, description = "Sole member or last admin", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn leave_organization(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(org_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let identity = principal.identity.clone();
    app_state
        .organization_service
        .remove_member(org_id, &principal, &identity)
        .await
        .map_err(organization_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}
