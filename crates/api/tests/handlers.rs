//! Handler-level tests over the full router with mocked repositories.

use api::middleware::AuthState;
use api::routes::api::{build_router, AppState};
use axum_test::TestServer;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;
use services::authz::{PermissionTable, Role};
use services::invitation::{
    Invitation, InvitationPolicy, InvitationService, InvitationStatus, MockInvitationRepository,
};
use services::notify::MockNotifier;
use services::organization::{
    MockOrganizationRepository, Organization, OrganizationId, OrganizationService,
    OrganizationSettings,
};
use services::user::{MockUserRepository, UserService};
use std::sync::Arc;
use uuid::Uuid;

const JWT_SECRET: &str = "test-secret";

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    email: String,
    exp: usize,
}

fn bearer(identity: &str, email: &str) -> String {
    let claims = TestClaims {
        sub: identity.to_string(),
        email: email.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

struct TestApp {
    organizations: MockOrganizationRepository,
    users: MockUserRepository,
    invitations: MockInvitationRepository,
    notifier: MockNotifier,
}

impl TestApp {
    fn new() -> Self {
        Self {
            organizations: MockOrganizationRepository::new(),
            users: MockUserRepository::new(),
            invitations: MockInvitationRepository::new(),
            notifier: MockNotifier::new(),
        }
    }

    fn into_server(self) -> TestServer {
        let organizations: Arc<dyn services::organization::OrganizationRepository> =
            Arc::new(self.organizations);
        let users: Arc<dyn services::user::UserRepository> = Arc::new(self.users);
        let invitations: Arc<dyn services::invitation::InvitationRepository> =
            Arc::new(self.invitations);
        let notifier: Arc<dyn services::notify::Notifier> = Arc::new(self.notifier);
        let permissions = Arc::new(PermissionTable::new());

        let app_state = AppState {
            organization_service: Arc::new(OrganizationService::new(
                organizations.clone(),
                users.clone(),
                permissions.clone(),
            )),
            invitation_service: Arc::new(InvitationService::new(
                invitations,
                organizations,
                users.clone(),
                notifier,
                permissions,
                InvitationPolicy {
                    base_url: "https://app.example.com".to_string(),
                    expires_in_days: 7,
                },
            )),
            user_service: Arc::new(UserService::new(users)),
        };

        let auth_state = AuthState::new(JWT_SECRET, None);
        TestServer::new(build_router(app_state, auth_state)).unwrap()
    }
}

fn organization(id: Uuid, name: &str, creator: &str) -> Organization {
    Organization {
        id: OrganizationId(id),
        name: name.to_string(),
        created_by: creator.to_string(),
        settings: OrganizationSettings::default(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn pending_invitation(org: Uuid, email: &str, role: Role) -> Invitation {
    let now = Utc::now();
    Invitation {
        id: Uuid::new_v4(),
        organization_id: OrganizationId(org),
        email: email.to_string(),
        role,
        invited_by: "auth0|admin".to_string(),
        status: InvitationStatus::Pending,
        token: "t".repeat(64),
        created_at: now,
        expires_at: now + Duration::days(7),
        responded_at: None,
    }
}

#[tokio::test]
async fn health_does_not_require_auth() {
    let server = TestApp::new().into_server();

    let response = server.get("/v1/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["status"], "ok");
}

#[tokio::test]
async fn missing_bearer_token_is_rejected() {
    let server = TestApp::new().into_server();

    let response = server.get("/v1/users/me").await;
    response.assert_status_unauthorized();
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["code"],
        "unauthorized"
    );
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let server = TestApp::new().into_server();

    let response = server
        .get("/v1/users/me")
        .add_header("authorization", "Bearer not-a-jwt")
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn new_principal_gets_onboarding_view() {
    let mut app = TestApp::new();
    app.users.expect_get_by_identity().returning(|_| Ok(None));
    let server = app.into_server();

    let response = server
        .get("/v1/users/me")
        .add_header("authorization", bearer("auth0|new", "New@Example.Com"))
        .await;
    response.assert_status_ok();

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["onboarding_required"], true);
    assert_eq!(body["role"], serde_json::Value::Null);
    // Email is normalized at the authentication boundary
    assert_eq!(body["email"], "new@example.com");
}

#[tokio::test]
async fn create_organization_returns_created() {
    let org_id = Uuid::new_v4();
    let mut app = TestApp::new();
    app.organizations
        .expect_count_active_for_email()
        .returning(|_| Ok(0));
    app.organizations
        .expect_create_with_owner()
        .returning(move |name, _, owner| Ok(organization(org_id, name, &owner.identity)));
    let server = app.into_server();

    let response = server
        .post("/v1/organizations")
        .add_header("authorization", bearer("auth0|alice", "alice@acme.com"))
        .json(&json!({ "name": "Acme" }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["name"], "Acme");
    assert_eq!(body["created_by"], "auth0|alice");
    assert_eq!(body["settings"]["invite_required"], true);
}

#[tokio::test]
async fn fourth_organization_is_a_conflict() {
    let mut app = TestApp::new();
    app.organizations
        .expect_count_active_for_email()
        .returning(|_| Ok(3));
    let server = app.into_server();

    let response = server
        .post("/v1/organizations")
        .add_header("authorization", bearer("auth0|alice", "alice@acme.com"))
        .json(&json!({ "name": "Fourth" }))
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["code"],
        "limit_reached"
    );
}

#[tokio::test]
async fn switch_to_non_member_organization_is_forbidden() {
    let org_id = Uuid::new_v4();
    let mut app = TestApp::new();
    app.organizations
        .expect_get_by_id()
        .returning(|id| Ok(Some(organization(id, "Acme", "auth0|other"))));
    app.organizations
        .expect_get_member_by_email()
        .returning(|_, _| Ok(None));
    let server = app.into_server();

    let response = server
        .post(&format!("/v1/organizations/{}/switch", org_id))
        .add_header("authorization", bearer("auth0|alice", "alice@acme.com"))
        .await;
    response.assert_status_forbidden();
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["code"],
        "not_a_member"
    );
}

#[tokio::test]
async fn verify_invitation_is_public() {
    let org_id = Uuid::new_v4();
    let mut app = TestApp::new();
    app.invitations
        .expect_get_by_token()
        .returning(move |_| Ok(Some(pending_invitation(org_id, "bob@x.com", Role::Viewer))));
    app.organizations
        .expect_get_by_id()
        .returning(|id| Ok(Some(organization(id, "Acme", "auth0|admin"))));
    let server = app.into_server();

    // No authorization header at all
    let response = server.get(&format!("/v1/invitations/{}", "t".repeat(64))).await;
    response.assert_status_ok();

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["email"], "bob@x.com");
    assert_eq!(body["organization_name"], "Acme");
    assert_eq!(body["role"], "viewer");
}

#[tokio::test]
async fn unknown_invitation_token_is_not_found() {
    let mut app = TestApp::new();
    app.invitations
        .expect_get_by_token()
        .returning(|_| Ok(None));
    let server = app.into_server();

    let response = server.get("/v1/invitations/nosuchtoken").await;
    response.assert_status_not_found();
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["message"],
        "Invitation not found or expired"
    );
}

#[tokio::test]
async fn accepting_with_wrong_email_is_forbidden() {
    let org_id = Uuid::new_v4();
    let mut app = TestApp::new();
    app.invitations
        .expect_get_by_token()
        .returning(move |_| Ok(Some(pending_invitation(org_id, "bob@x.com", Role::User))));
    app.organizations
        .expect_get_by_id()
        .returning(|id| Ok(Some(organization(id, "Acme", "auth0|admin"))));
    let server = app.into_server();

    let response = server
        .post(&format!("/v1/invitations/{}/accept", "t".repeat(64)))
        .add_header("authorization", bearer("auth0|eve", "eve@x.com"))
        .await;
    response.assert_status_forbidden();
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["code"],
        "email_mismatch"
    );
}

#[tokio::test]
async fn accepting_into_deleted_organization_is_not_found() {
    let org_id = Uuid::new_v4();
    let mut app = TestApp::new();
    app.invitations
        .expect_get_by_token()
        .returning(move |_| Ok(Some(pending_invitation(org_id, "bob@x.com", Role::User))));
    // The organization was soft-deleted after the invitation went out
    app.organizations.expect_get_by_id().returning(|_| Ok(None));
    let server = app.into_server();

    let response = server
        .post(&format!("/v1/invitations/{}/accept", "t".repeat(64)))
        .add_header("authorization", bearer("auth0|bob", "bob@x.com"))
        .await;
    response.assert_status_not_found();
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["message"],
        "Invitation not found or expired"
    );
}

#[tokio::test]
async fn removing_the_last_admin_is_a_conflict() {
    let org_id = Uuid::new_v4();
    let mut app = TestApp::new();
    app.organizations
        .expect_get_by_id()
        .returning(|id| Ok(Some(organization(id, "Acme", "auth0|admin"))));
    app.organizations
        .expect_get_member_by_identity()
        .returning(|org, identity| {
            Ok(Some(services::organization::Member {
                organization_id: OrganizationId(org),
                email: "admin@acme.com".to_string(),
                identity: identity.to_string(),
                role: Role::Admin,
                is_active: true,
                joined_at: Utc::now(),
            }))
        });
    app.organizations.expect_count_members().returning(|_| Ok(2));
    app.organizations.expect_count_admins().returning(|_| Ok(1));
    let server = app.into_server();

    let response = server
        .delete(&format!(
            "/v1/organizations/{}/members/{}",
            org_id, "auth0|admin"
        ))
        .add_header("authorization", bearer("auth0|admin", "admin@acme.com"))
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
    assert_eq!(
        response.json::<serde_json::Value>()["error"]["code"],
        "conflict"
    );
}

#[tokio::test]
async fn create_invitation_reports_notification_failure() {
    let org_id = Uuid::new_v4();
    let mut app = TestApp::new();
    app.organizations
        .expect_get_by_id()
        .returning(|id| Ok(Some(organization(id, "Acme", "auth0|admin"))));
    app.organizations
        .expect_get_member_by_identity()
        .returning(|org, identity| {
            Ok(Some(services::organization::Member {
                organization_id: OrganizationId(org),
                email: "admin@acme.com".to_string(),
                identity: identity.to_string(),
                role: Role::Admin,
                is_active: true,
                joined_at: Utc::now(),
            }))
        });
    app.organizations
        .expect_get_member_by_email()
        .returning(|_, _| Ok(None));
    app.invitations
        .expect_find_pending()
        .returning(|_, _| Ok(None));
    app.invitations
        .expect_create()
        .returning(|org, email, role, _, _| Ok(pending_invitation(org, email, role)));
    app.notifier
        .expect_send_invitation()
        .returning(|_| Err(anyhow::anyhow!("delivery failed")));
    let server = app.into_server();

    let response = server
        .post(&format!("/v1/organizations/{}/invitations", org_id))
        .add_header("authorization", bearer("auth0|admin", "admin@acme.com"))
        .json(&json!({ "email": "bob@x.com", "role": "user" }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["notified"], false);
    assert_eq!(body["invitation"]["status"], "pending");
    // The join token is disclosed here, once, and nowhere else
    assert_eq!(body["token"], "t".repeat(64));
    assert!(body["invitation"].get("token").is_none());
}

#[tokio::test]
async fn listed_invitations_do_not_expose_tokens() {
    let org_id = Uuid::new_v4();
    let mut app = TestApp::new();
    app.organizations
        .expect_get_by_id()
        .returning(|id| Ok(Some(organization(id, "Acme", "auth0|admin"))));
    app.organizations
        .expect_get_member_by_identity()
        .returning(|org, identity| {
            Ok(Some(services::organization::Member {
                organization_id: OrganizationId(org),
                email: "admin@acme.com".to_string(),
                identity: identity.to_string(),
                role: Role::Admin,
                is_active: true,
                joined_at: Utc::now(),
            }))
        });
    app.invitations
        .expect_list_by_organization()
        .returning(|org| Ok(vec![pending_invitation(org, "bob@x.com", Role::User)]));
    let server = app.into_server();

    let response = server
        .get(&format!("/v1/organizations/{}/invitations", org_id))
        .add_header("authorization", bearer("auth0|admin", "admin@acme.com"))
        .await;
    response.assert_status_ok();

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["total"], 1);
    assert_eq!(body["invitations"][0]["email"], "bob@x.com");
    assert!(body["invitations"][0].get("token").is_none());
}
