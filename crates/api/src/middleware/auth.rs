//! Bearer-token authentication.
//!
//! Tokens are issued by the external identity provider; this layer only
//! verifies the signature and trusts the (sub, email) pair the claims
//! carry. No credential handling happens here.

use crate::models::ErrorResponse;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use services::user::Principal;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    email: String,
    #[allow(dead_code)]
    exp: usize,
}

#[derive(Clone)]
pub struct AuthState {
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl AuthState {
    pub fn new(jwt_secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(jwt_secret.as_bytes())),
            validation: Arc::new(validation),
        }
    }
}

/// The verified principal, inserted as a request extension for handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;

    let claims = decode::<TokenClaims>(token, &state.decoding_key, &state.validation)
        .map_err(|e| {
            debug!(error = %e, "Token verification failed");
            unauthorized()
        })?
        .claims;

    let principal = Principal::new(claims.sub, claims.email);
    request
        .extensions_mut()
        .insert(AuthenticatedPrincipal(principal));

    Ok(next.run(request).await)
}

fn unauthorized() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(
            "Authentication required".to_string(),
            "unauthorized".to_string(),
        )),
    )
}
