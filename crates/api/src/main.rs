use api::{
    middleware::AuthState,
    notify::WebhookNotifier,
    routes::api::{build_router, AppState},
};
use config::{ApiConfig, LoggingConfig};
use database::{create_pool, PgInvitationRepository, PgOrganizationRepository, PgUserRepository};
use services::authz::PermissionTable;
use services::invitation::{InvitationPolicy, InvitationService};
use services::organization::OrganizationService;
use services::user::UserService;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Load configuration first to get logging settings
    let config = ApiConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Application cannot start without a valid configuration file.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let pool = create_pool(&config.database).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to create database pool");
        std::process::exit(1);
    });

    database::migrations::run(&pool).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to run database migrations");
        std::process::exit(1);
    });

    let users: Arc<dyn services::user::UserRepository> =
        Arc::new(PgUserRepository::new(pool.clone()));
    let organizations: Arc<dyn services::organization::OrganizationRepository> =
        Arc::new(PgOrganizationRepository::new(pool.clone()));
    let invitations: Arc<dyn services::invitation::InvitationRepository> =
        Arc::new(PgInvitationRepository::new(pool.clone()));
    let notifier: Arc<dyn services::notify::Notifier> = Arc::new(WebhookNotifier::new(
        config.invitations.webhook_url.clone(),
    ));

    // Built once; every permission check goes through this table
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
                base_url: config.invitations.base_url.clone(),
                expires_in_days: config.invitations.expires_in_days,
            },
        )),
        user_service: Arc::new(UserService::new(users)),
    };

    let auth_state = AuthState::new(&config.auth.jwt_secret, config.auth.issuer.as_deref());
    let app = build_router(app_state, auth_state);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, address = %bind_address, "Failed to bind");
            std::process::exit(1);
        });

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!("API Endpoints:");
    tracing::info!("  - GET  /v1/health");
    tracing::info!("  - GET  /v1/users/me");
    tracing::info!("  - GET/POST /v1/organizations");
    tracing::info!("  - GET/PUT/DELETE /v1/organizations/{{id}}");
    tracing::info!("  - POST /v1/organizations/{{id}}/switch");
    tracing::info!("  - POST /v1/organizations/{{id}}/leave");
    tracing::info!("  - GET  /v1/organizations/{{id}}/members");
    tracing::info!("  - PUT/DELETE /v1/organizations/{{id}}/members/{{identity}}");
    tracing::info!("  - GET/POST /v1/organizations/{{id}}/invitations");
    tracing::info!("  - GET  /v1/invitations/{{token}}");
    tracing::info!("  - POST /v1/invitations/{{token}}/accept");

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    });
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Build the filter string from the logging configuration
    let mut filter = logging_config.level.clone();
    for (module, level) in &logging_config.modules {
        filter.push_str(&format!(",{}={}", module, level));
    }

    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
