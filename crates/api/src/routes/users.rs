use crate::{
    conversions::{onboarding_view, profile_to_api},
    middleware::AuthenticatedPrincipal,
    models::{CurrentUserResponse, ErrorResponse},
    routes::{api::AppState, internal_error, ApiError},
};
use axum::{
    extract::{Extension, State},
    Json,
};
use tracing::error;

/// Current principal's profile
///
/// Resolves the authenticated principal to its profile. A principal with no
/// profile, or no memberships, gets `onboarding_required = true` and must
/// create an organization before using the rest of the API.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current user profile", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_token" = []))
)]
pub async fn get_current_user(
    State(app_state): State<AppState>,
    Extension(AuthenticatedPrincipal(principal)): Extension<AuthenticatedPrincipal>,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    match app_state.user_service.current_profile(&principal).await {
        Ok(Some(profile)) => Ok(Json(profile_to_api(profile))),
        Ok(None) => Ok(Json(onboarding_view(&principal))),
        Err(e) => {
            error!(error = %e, "Failed to resolve current user");
            Err(internal_error())
        }
    }
}
