use services::authz::Role;
use services::common::RepositoryError;
use services::invitation::InvitationStatus;
use tokio_postgres::error::SqlState;

/// Translate driver errors into the shared repository error taxonomy.
pub fn map_db_error(e: tokio_postgres::Error) -> RepositoryError {
    if let Some(db_err) = e.as_db_error() {
        if db_err.code() == &SqlState::UNIQUE_VIOLATION {
            return RepositoryError::AlreadyExists;
        }
        if db_err.code() == &SqlState::FOREIGN_KEY_VIOLATION {
            return RepositoryError::ForeignKeyViolation(db_err.message().to_string());
        }
    }
    RepositoryError::DatabaseError(anyhow::Error::new(e))
}

pub fn parse_role(s: &str) -> Result<Role, RepositoryError> {
    Role::parse(s)
        .ok_or_else(|| RepositoryError::DataConversionError(anyhow::anyhow!("Invalid role: {s}")))
}

pub fn parse_status(s: &str) -> Result<InvitationStatus, RepositoryError> {
    InvitationStatus::parse(s).ok_or_else(|| {
        RepositoryError::DataConversionError(anyhow::anyhow!("Invalid invitation status: {s}"))
    })
}
