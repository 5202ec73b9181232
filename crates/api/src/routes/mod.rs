pub mod api;
pub mod health;
pub mod invitations;
pub mod organization_members;
pub mod organizations;
pub mod users;

use crate::models::ErrorResponse;
use axum::{http::StatusCode, Json};
use services::invitation::InvitationError;
use services::organization::OrganizationError;
use tracing::error;

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn error_response(status: StatusCode, message: &str, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse::new(message.to_string(), code.to_string())),
    )
}

pub(crate) fn internal_error() -> ApiError {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        "internal_server_error",
    )
}

pub(crate) fn organization_error_response(e: OrganizationError) -> ApiError {
    match e {
        OrganizationError::NotFound => {
            error_response(StatusCode::NOT_FOUND, "Organization not found", "not_found")
        }
        OrganizationError::MemberNotFound => error_response(
            StatusCode::NOT_FOUND,
            "Organization member not found",
            "not_found",
        ),
        OrganizationError::NotAMember => error_response(
            StatusCode::FORBIDDEN,
            "Not a member of this organization",
            "not_a_member",
        ),
        OrganizationError::Forbidden => {
            error_response(StatusCode::FORBIDDEN, "Insufficient permissions", "forbidden")
        }
        OrganizationError::InvalidParams(message) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(message, "bad_request".to_string())),
        ),
        OrganizationError::AlreadyMember => {
            error_response(StatusCode::CONFLICT, "Already a member", "conflict")
        }
        OrganizationError::Conflict(message) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(message, "conflict".to_string())),
        ),
        OrganizationError::LimitReached => error_response(
            StatusCode::CONFLICT,
            "Organization limit reached",
            "limit_reached",
        ),
        OrganizationError::LastOrganization => error_response(
            StatusCode::CONFLICT,
            "A member would be left without any organization",
            "conflict",
        ),
        OrganizationError::Internal(message) => {
            error!(error = %message, "Organization operation failed");
            internal_error()
        }
    }
}

pub(crate) fn invitation_error_response(e: InvitationError) -> ApiError {
    match e {
        // Unknown, expired and consumed tokens all collapse into the same
        // answer; the response never reveals which.
        InvitationError::InvalidToken => error_response(
            StatusCode::NOT_FOUND,
            "Invitation not found or expired",
            "not_found",
        ),
        InvitationError::OrganizationNotFound => {
            error_response(StatusCode::NOT_FOUND, "Organization not found", "not_found")
        }
        InvitationError::Forbidden => {
            error_response(StatusCode::FORBIDDEN, "Insufficient permissions", "forbidden")
        }
        InvitationError::InvalidParams(message) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(message, "bad_request".to_string())),
        ),
        InvitationError::RoleNotGrantable => error_response(
            StatusCode::BAD_REQUEST,
            "Admin role cannot be granted by invitation",
            "bad_request",
        ),
        InvitationError::AlreadyMember => error_response(
            StatusCode::CONFLICT,
            "User is already a member of this organization",
            "conflict",
        ),
        InvitationError::AlreadyPending => error_response(
            StatusCode::CONFLICT,
            "A pending invitation already exists for this email",
            "conflict",
        ),
        InvitationError::EmailMismatch => error_response(
            StatusCode::FORBIDDEN,
            "The invited email does not match the accepting account",
            "email_mismatch",
        ),
        InvitationError::LimitReached => error_response(
            StatusCode::CONFLICT,
            "Organization limit reached",
            "limit_reached",
        ),
        InvitationError::Internal(message) => {
            error!(error = %message, "Invitation operation failed");
            internal_error()
        }
    }
}
