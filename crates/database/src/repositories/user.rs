use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, parse_role};
use anyhow::Context;
use async_trait::async_trait;
use services::authz::Role;
use services::common::RepositoryError;
use services::organization::OrganizationId;
use services::user::{Principal, UserId, UserProfile, UserRepository};
use tracing::debug;
use uuid::Uuid;

pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
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

    fn row_to_profile(row: &tokio_postgres::Row) -> Result<UserProfile, RepositoryError> {
        let role_str: String = row.get("role");
        Ok(UserProfile {
            id: UserId(row.get("id")),
            identity: row.get("identity"),
            email: row.get("email"),
            role: parse_role(&role_str)?,
            organization_id: row
                .get::<_, Option<Uuid>>("organization_id")
                .map(OrganizationId),
            organization_ids: Vec::new(),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Memberships are the source of truth for which organizations a
    /// profile belongs to; the profile only caches the active one.
    async fn fill_organization_ids(
        client: &deadpool_postgres::Object,
        mut profile: UserProfile,
    ) -> Result<UserProfile, RepositoryError> {
        let rows = client
            .query(
                r#"
                SELECT m.organization_id
                FROM organization_members m
                JOIN organizations o ON o.id = m.organization_id
                WHERE LOWER(m.email) = LOWER($1) AND m.is_active AND o.is_active
                ORDER BY m.joined_at
                "#,
                &[&profile.email],
            )
            .await
            .map_err(map_db_error)?;

        profile.organization_ids = rows
            .into_iter()
            .map(|row| OrganizationId(row.get(0)))
            .collect();
        Ok(profile)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_opt("SELECT * FROM users WHERE identity = $1", &[&identity])
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => {
                let profile = Self::row_to_profile(&row)?;
                Ok(Some(Self::fill_organization_ids(&client, profile).await?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_opt(
                "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND is_active",
                &[&email],
            )
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => {
                let profile = Self::row_to_profile(&row)?;
                Ok(Some(Self::fill_organization_ids(&client, profile).await?))
            }
            None => Ok(None),
        }
    }

    async fn upsert(
        &self,
        principal: &Principal,
        role: Role,
        organization_id: Option<Uuid>,
    ) -> Result<UserProfile, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                r#"
                INSERT INTO users (identity, email, role, organization_id)
                VALUES ($1, LOWER($2), $3, $4)
                ON CONFLICT (identity) DO UPDATE
                SET email = EXCLUDED.email,
                    role = EXCLUDED.role,
                    organization_id = EXCLUDED.organization_id,
                    is_active = TRUE,
                    updated_at = NOW()
                RETURNING *
                "#,
                &[
                    &principal.identity,
                    &principal.email,
                    &role.as_str(),
                    &organization_id,
                ],
            )
            .await
            .map_err(map_db_error)?;

        debug!(identity = %principal.identity, "Upserted user profile");
        let profile = Self::row_to_profile(&row)?;
        Self::fill_organization_ids(&client, profile).await
    }

    async fn set_active_organization(
        &self,
        identity: &str,
        organization_id: Option<Uuid>,
        role: Option<Role>,
    ) -> Result<UserProfile, RepositoryError> {
        let client = self.get_client().await?;
        let role_str = role.map(|r| r.as_str());

        let row = client
            .query_opt(
                r#"
                UPDATE users
                SET organization_id = $2,
                    role = COALESCE($3, role),
                    updated_at = NOW()
                WHERE identity = $1 AND is_active
                RETURNING *
                "#,
                &[&identity, &organization_id, &role_str],
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::NotFound("user".to_string()))?;

        let profile = Self::row_to_profile(&row)?;
        Self::fill_organization_ids(&client, profile).await
    }

    async fn deactivate(&self, identity: &str) -> Result<bool, RepositoryError> {
        let client = self.get_client().await?;

        let rows_affected = client
            .execute(
                "UPDATE users SET is_active = FALSE, updated_at = NOW()
                 WHERE identity = $1 AND is_active",
                &[&identity],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows_affected > 0)
    }
}
