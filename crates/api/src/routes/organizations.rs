use crate::{
    conversions::{api_to_settings, organization_to_api, profile_to_api},
    middleware::AuthenticatedPrincipal,
    models::{
        CreateOrganizationRequest, CurrentUserResponse, ErrorResponse, ListOrganizationsResponse,
        OrganizationResponse, UpdateOrganizationSettingsRequest,
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

/// List the principal's organizations
#[utoipa::path(
    get,
    path = "/organizations",
    tag = "Organizations",
    responses(
        (status = 200, description = "Organizations the principal belongs to", body = ListOrganizationsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn list_organizations(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
) -> Result<Json<ListOrganizationsResponse>, ApiError> {
    let organizations = app_state
        .organization_service
        .list_organizations(&principal)
        .await
        .map_err(organization_error_response)?;

    let organizations: Vec<OrganizationResponse> =
        organizations.into_iter().map(organization_to_api).collect();
    let total = organizations.len();
    Ok(Json(ListOrganizationsResponse {
        organizations,
        total,
    }))
}

/// Create an organization
///
/// The principal becomes the sole admin member and the new organization
/// becomes its active context. This is also the onboarding step for
/// first-time users.
#[utoipa::path(
    post,
    path = "/organizations",
    tag = "Organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = OrganizationResponse),
        (status = 400, description = "Invalid name", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 409, description = "Organization limit reached", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn create_organization(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Json(request): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>), ApiError> {
    debug!(identity = %principal.identity, "Creating organization");

    let organization = app_state
        .organization_service
        .create_organization(
            &request.name,
            request.settings.map(api_to_settings),
            &principal,
        )
        .await
        .map_err(organization_error_response)?;

    Ok((StatusCode::CREATED, Json(organization_to_api(organization))))
}

/// Get an organization
#[utoipa::path(
    get,
    path = "/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization details", body = OrganizationResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn get_organization(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    let organization = app_state
        .organization_service
        .get_organization(org_id, &principal)
        .await
        .map_err(organization_error_response)?;

    Ok(Json(organization_to_api(organization)))
}

/// Update organization settings
#[utoipa::path(
    put,
    path = "/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = UpdateOrganizationSettingsRequest,
    responses(
        (status = 200, description = "Updated organization", body = OrganizationResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn update_organization_settings(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(org_id): Path<Uuid>,
    Json(request): Json<UpdateOrganizationSettingsRequest>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    let organization = app_state
        .organization_service
        .update_settings(org_id, &principal, api_to_settings(request.settings))
        .await
        .map_err(organization_error_response)?;

    Ok(Json(organization_to_api(organization)))
}

/// Delete an organization
///
/// Soft-deletes the organization and detaches all members. Rejected when
/// any member would be left without an organization to fall back to.
#[utoipa::path(
    delete,
    path = "/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 204, description = "Organization deleted"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 409, description = "A member would be stranded", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn delete_organization(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(org_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    app_state
        .organization_service
        .delete_organization(org_id, &principal)
        .await
        .map_err(organization_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Switch the active organization
///
/// Rewrites the principal's active organization context; the effective role
/// is re-derived from the membership record in the target organization.
#[utoipa::path(
    post,
    path = "/organizations/{org_id}/switch",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Updated profile", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn switch_organization(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    let profile = app_state
        .organization_service
        .switch_organization(&principal, org_id)
        .await
        .map_err(organization_error_response)?;

    Ok(Json(profile_to_api(profile)))
}
