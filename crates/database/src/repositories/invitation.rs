use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, parse_role, parse_status};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use services::authz::Role;
use services::common::RepositoryError;
use services::invitation::{Invitation, InvitationRepository};
use services::organization::OrganizationId;
use tracing::debug;
use uuid::Uuid;

pub struct PgInvitationRepository {
    pool: DbPool,
}

impl PgInvitationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn get_client(&self) -> Result<deadpool_postgres::Object, RepositoryError> {
        self.pool
            .get()
            .await
            .context("Failed to get database connection")
            .map_err(RepositoryError::PoolError)
    }

    fn row_to_invitation(row: &tokio_postgres::Row) -> Result<Invitation, RepositoryError> {
        let role_str: String = row.get("role");
        let status_str: String = row.get("status");
        Ok(Invitation {
            id: row.get("id"),
            organization_id: OrganizationId(row.get("organization_id")),
            email: row.get("email"),
            role: parse_role(&role_str)?,
            invited_by: row.get("invited_by"),
            status: parse_status(&status_str)?,
            token: row.get("token"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            responded_at: row.get("responded_at"),
        })
    }

    /// Generate an unguessable single-use token. This is a bearer
    /// credential, not an identifier.
    fn generate_token() -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut rng = rand::rng();
        (0..64)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

#[async_trait]
impl InvitationRepository for PgInvitationRepository {
    async fn create(
        &self,
        organization_id: Uuid,
        email: &str,
        role: Role,
        invited_by: &str,
        expires_in_days: i64,
    ) -> Result<Invitation, RepositoryError> {
        let client = self.get_client().await?;
        let token = Self::generate_token();
        let expires_at = Utc::now() + Duration::days(expires_in_days);

        let row = client
            .query_one(
                r#"
                INSERT INTO organization_invitations
                    (organization_id, email, role, invited_by, token, expires_at)
                VALUES ($1, LOWER($2), $3, $4, $5, $6)
                RETURNING *
                "#,
                &[
                    &organization_id,
                    &email,
                    &role.as_str(),
                    &invited_by,
                    &token,
                    &expires_at,
                ],
            )
            .await
            .map_err(map_db_error)?;

        debug!(
            organization_id = %organization_id,
            role = %role,
            "Created invitation"
        );
        Self::row_to_invitation(&row)
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Invitation>, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_opt(
                "SELECT * FROM organization_invitations WHERE token = $1",
                &[&token],
            )
            .await
            .map_err(map_db_error)?;

        row.map(|r| Self::row_to_invitation(&r)).transpose()
    }

    async fn find_pending(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_opt(
                r#"
                SELECT * FROM organization_invitations
                WHERE organization_id = $1
                  AND LOWER(email) = LOWER($2)
                  AND status = 'pending'
                  AND expires_at > NOW()
                ORDER BY created_at DESC
                LIMIT 1
                "#,
                &[&organization_id, &email],
            )
            .await
            .map_err(map_db_error)?;

        row.map(|r| Self::row_to_invitation(&r)).transpose()
    }

    async fn mark_accepted(&self, id: Uuid) -> Result<Invitation, RepositoryError> {
        let client = self.get_client().await?;

        // Conditional on the row still being pending; this is what makes
        // the token single-use.
        let row = client
            .query_opt(
                r#"
                UPDATE organization_invitations
                SET status = 'accepted', responded_at = NOW()
                WHERE id = $1 AND status = 'pending'
                RETURNING *
                "#,
                &[&id],
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::NotFound("pending invitation".to_string()))?;

        Self::row_to_invitation(&row)
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, RepositoryError> {
        let client = self.get_client().await?;

        let rows = client
            .query(
                "SELECT * FROM organization_invitations
                 WHERE organization_id = $1
                 ORDER BY created_at DESC",
                &[&organization_id],
            )
            .await
            .map_err(map_db_error)?;

        rows.iter().map(Self::row_to_invitation).collect()
    }
}
