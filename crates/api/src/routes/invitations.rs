use crate::{
    conversions::{
        created_invitation_to_api, invitation_details_to_api, invitation_to_api, member_to_api,
    },
    middleware::AuthenticatedPrincipal,
    models::{
        CreateInvitationRequest, CreateInvitationResponse, ErrorResponse, InvitationResponse,
        ListInvitationsResponse, OrganizationMemberResponse, VerifyInvitationResponse,
    },
    routes::{api::AppState, invitation_error_response, ApiError},
};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

/// Invite a user to an organization
///
/// Creates a single-use invitation valid for a limited time and dispatches
/// a notification with the join link. A delivery failure does not void the
/// invitation; the response carries `notified = false` instead.
#[utoipa::path(
    post,
    path = "/organizations/{org_id}/invitations",
    tag = "Invitations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation created", body = CreateInvitationResponse),
        (status = 400, description = "Invalid email or non-grantable role", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 409, description = "Already a member or already invited", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn create_invitation(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(org_id): Path<Uuid>,
    Json(request): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<CreateInvitationResponse>), ApiError> {
    debug!(
        organization_id = %org_id,
        role = %request.role,
        "Creating invitation"
    );

    let created = app_state
        .invitation_service
        .create_invitation(org_id, &principal, &request.email, request.role)
        .await
        .map_err(invitation_error_response)?;

    Ok((StatusCode::CREATED, Json(created_invitation_to_api(created))))
}

/// List an organization's invitations
#[utoipa::path(
    get,
    path = "/organizations/{org_id}/invitations",
    tag = "Invitations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Invitations for the organization", body = ListInvitationsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn list_invitations(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ListInvitationsResponse>, ApiError> {
    let invitations = app_state
        .invitation_service
        .list_invitations(org_id, &principal)
        .await
        .map_err(invitation_error_response)?;

    let invitations: Vec<InvitationResponse> =
        invitations.into_iter().map(invitation_to_api).collect();
    let total = invitations.len();
    Ok(Json(ListInvitationsResponse { invitations, total }))
}

/// Verify an invitation token
///
/// Public endpoint backing the join page. Valid tokens reveal the invited
/// email, organization name, granted role and expiry; anything else gets
/// the same generic not-found answer.
#[utoipa::path(
    get,
    path = "/invitations/{token}",
    tag = "Invitations",
    params(("token" = String, Path, description = "Invitation token")),
    responses(
        (status = 200, description = "Invitation details", body = VerifyInvitationResponse),
        (status = 404, description = "Invitation not found or expired", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn verify_invitation(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<VerifyInvitationResponse>, ApiError> {
    let details = app_state
        .invitation_service
        .verify_invitation(&token)
        .await
        .map_err(invitation_error_response)?;

    Ok(Json(invitation_details_to_api(details)))
}

/// Accept an invitation
///
/// Consumes the token and joins the authenticated principal to the
/// organization at the invited role. The accepting account's email must
/// match the invited email.
#[utoipa::path(
    post,
    path = "/invitations/{token}/accept",
    tag = "Invitations",
    params(("token" = String, Path, description = "Invitation token")),
    responses(
        (status = 200, description = "Membership created", body = OrganizationMemberResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Email mismatch", body = ErrorResponse),
        (status = 404, description = "Invitation not found or expired", body = ErrorResponse),
        (status = 409, description = "Organization limit reached", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn accept_invitation(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(token): Path<String>,
) -> Result<Json<OrganizationMemberResponse>, ApiError> {
    let member = app_state
        .invitation_service
        .accept_invitation(&token, &principal)
        .await
        .map_err(invitation_error_response)?;

    Ok(Json(member_to_api(member)))
}
