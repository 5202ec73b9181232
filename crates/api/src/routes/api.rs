use crate::middleware::{auth_middleware, AuthState};
use crate::openapi::serve_openapi;
use crate::routes::{health, invitations, organization_members, organizations, users};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use services::invitation::InvitationService;
use services::organization::OrganizationService;
use services::user::UserService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub organization_service: Arc<OrganizationService>,
    pub invitation_service: Arc<InvitationService>,
    pub user_service: Arc<UserService>,
}

/// Assemble the full application router under the `/v1` prefix.
pub fn build_router(app_state: AppState, auth_state: AuthState) -> Router {
    // Invitation verification is public: the join page runs before the
    // invitee has an account.
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/openapi.json", get(serve_openapi))
        .route(
            "/invitations/{token}",
            get(invitations::verify_invitation),
        );

    let organization_routes = Router::new()
        .route(
            "/",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/{org_id}",
            get(organizations::get_organization)
                .put(organizations::update_organization_settings)
                .delete(organizations::delete_organization),
        )
        .route("/{org_id}/switch", post(organizations::switch_organization))
        .route(
            "/{org_id}/leave",
            post(organization_members::leave_organization),
        )
        .route(
            "/{org_id}/members",
            get(organization_members::list_organization_members),
        )
        .route(
            "/{org_id}/members/{identity}",
            put(organization_members::update_organization_member)
                .delete(organization_members::remove_organization_member),
        )
        .route(
            "/{org_id}/invitations",
            get(invitations::list_invitations).post(invitations::create_invitation),
        );

    let authenticated_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .route(
            "/invitations/{token}/accept",
            post(invitations::accept_invitation),
        )
        .nest("/organizations", organization_routes)
        .layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .nest("/v1", public_routes.merge(authenticated_routes))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
