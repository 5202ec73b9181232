/// Shared error types for repository operations across all domains.
/// These errors represent infrastructure and storage-level concerns rather
/// than domain-specific business logic; services translate them into their
/// own error enums at the port boundary.
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("'{0}' does not exist")]
    NotFound(String),
    #[error("Cannot add this resource as it already exists")]
    AlreadyExists,
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("Data validation failed: {0}")]
    ValidationFailed(String),
    #[error("Referenced entity does not exist: {0}")]
    ForeignKeyViolation(String),
    #[error("Database connection pool error: {0}")]
    PoolError(#[source] anyhow::Error),
    #[error("Database operation error: {0}")]
    DatabaseError(#[source] anyhow::Error),
    #[error("Data conversion error: {0}")]
    DataConversionError(#[source] anyhow::Error),
}
