use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, parse_role};
use anyhow::Context;
use async_trait::async_trait;
use services::authz::Role;
use services::common::RepositoryError;
use services::organization::{
    Member, NewMember, Organization, OrganizationId, OrganizationRepository,
    OrganizationSettings, MAX_ACTIVE_ORGANIZATIONS,
};
use services::user::Principal;
use tracing::debug;
use uuid::Uuid;

pub struct PgOrganizationRepository {
    pool: DbPool,
}

impl PgOrganizationRepository {
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

    fn row_to_organization(row: &tokio_postgres::Row) -> Result<Organization, RepositoryError> {
        let extra: serde_json::Value = row.get("extra");
        Ok(Organization {
            id: OrganizationId(row.get("id")),
            name: row.get("name"),
            created_by: row.get("created_by"),
            settings: OrganizationSettings {
                invite_required: row.get("invite_required"),
                extra: extra.as_object().cloned().unwrap_or_default(),
            },
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_member(row: &tokio_postgres::Row) -> Result<Member, RepositoryError> {
        let role_str: String = row.get("role");
        Ok(Member {
            organization_id: OrganizationId(row.get("organization_id")),
            email: row.get("email"),
            identity: row.get("identity"),
            role: parse_role(&role_str)?,
            is_active: row.get("is_active"),
            joined_at: row.get("joined_at"),
        })
    }
}

const COUNT_ACTIVE_FOR_EMAIL: &str = r#"
    SELECT COUNT(DISTINCT m.organization_id)
    FROM organization_members m
    JOIN organizations o ON o.id = m.organization_id
    WHERE LOWER(m.email) = LOWER($1) AND m.is_active AND o.is_active
"#;

#[async_trait]
impl OrganizationRepository for PgOrganizationRepository {
    async fn create_with_owner(
        &self,
        name: &str,
        settings: &OrganizationSettings,
        owner: &Principal,
    ) -> Result<Organization, RepositoryError> {
        let mut client = self.get_client().await?;
        let transaction = client.transaction().await.map_err(map_db_error)?;

        // Re-check the per-email limit inside the transaction so the
        // organization, its first member and the profile linkage are all
        // written or none are.
        let count_row = transaction
            .query_one(COUNT_ACTIVE_FOR_EMAIL, &[&owner.email])
            .await
            .map_err(map_db_error)?;
        let active: i64 = count_row.get(0);
        if active >= MAX_ACTIVE_ORGANIZATIONS {
            return Err(RepositoryError::LimitExceeded(format!(
                "{} already belongs to {} active organizations",
                owner.email, active
            )));
        }

        let extra = serde_json::Value::Object(settings.extra.clone());
        let row = transaction
            .query_one(
                r#"
                INSERT INTO organizations (name, created_by, invite_required, extra)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
                &[&name, &owner.identity, &settings.invite_required, &extra],
            )
            .await
            .map_err(map_db_error)?;
        let organization = Self::row_to_organization(&row)?;
        let org_id = organization.id.0;

        // Creator is always the first member, role admin
        transaction
            .execute(
                r#"
                INSERT INTO organization_members (organization_id, email, identity, role)
                VALUES ($1, LOWER($2), $3, 'admin')
                "#,
                &[&org_id, &owner.email, &owner.identity],
            )
            .await
            .map_err(map_db_error)?;

        // Create or refresh the creator's profile, switched into the new
        // organization
        transaction
            .execute(
                r#"
                INSERT INTO users (identity, email, role, organization_id)
                VALUES ($1, LOWER($2), 'admin', $3)
                ON CONFLICT (identity) DO UPDATE
                SET email = EXCLUDED.email,
                    role = 'admin',
                    organization_id = EXCLUDED.organization_id,
                    is_active = TRUE,
                    updated_at = NOW()
                "#,
                &[&owner.identity, &owner.email, &org_id],
            )
            .await
            .map_err(map_db_error)?;

        transaction.commit().await.map_err(map_db_error)?;

        debug!(organization_id = %org_id, owner = %owner.identity, "Created organization");
        Ok(organization)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Organization>, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_opt(
                "SELECT * FROM organizations WHERE id = $1 AND is_active",
                &[&id],
            )
            .await
            .map_err(map_db_error)?;

        row.map(|r| Self::row_to_organization(&r)).transpose()
    }

    async fn list_for_email(&self, email: &str) -> Result<Vec<Organization>, RepositoryError> {
        let client = self.get_client().await?;

        let rows = client
            .query(
                r#"
                SELECT o.*
                FROM organizations o
                JOIN organization_members m ON m.organization_id = o.id
                WHERE LOWER(m.email) = LOWER($1) AND m.is_active AND o.is_active
                ORDER BY m.joined_at
                "#,
                &[&email],
            )
            .await
            .map_err(map_db_error)?;

        rows.iter().map(Self::row_to_organization).collect()
    }

    async fn count_active_for_email(&self, email: &str) -> Result<i64, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_one(COUNT_ACTIVE_FOR_EMAIL, &[&email])
            .await
            .map_err(map_db_error)?;

        Ok(row.get(0))
    }

    async fn get_member_by_identity(
        &self,
        organization_id: Uuid,
        identity: &str,
    ) -> Result<Option<Member>, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_opt(
                "SELECT * FROM organization_members
                 WHERE organization_id = $1 AND identity = $2 AND is_active",
                &[&organization_id, &identity],
            )
            .await
            .map_err(map_db_error)?;

        row.map(|r| Self::row_to_member(&r)).transpose()
    }

    async fn get_member_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Member>, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_opt(
                "SELECT * FROM organization_members
                 WHERE organization_id = $1 AND LOWER(email) = LOWER($2) AND is_active",
                &[&organization_id, &email],
            )
            .await
            .map_err(map_db_error)?;

        row.map(|r| Self::row_to_member(&r)).transpose()
    }

    async fn add_member(
        &self,
        organization_id: Uuid,
        member: &NewMember,
    ) -> Result<Member, RepositoryError> {
        let client = self.get_client().await?;

        // The partial unique index on (organization_id, identity) turns a
        // concurrent duplicate into AlreadyExists via map_db_error.
        let row = client
            .query_one(
                r#"
                INSERT INTO organization_members (organization_id, email, identity, role)
                VALUES ($1, LOWER($2), $3, $4)
                RETURNING *
                "#,
                &[
                    &organization_id,
                    &member.email,
                    &member.identity,
                    &member.role.as_str(),
                ],
            )
            .await
            .map_err(map_db_error)?;

        debug!(
            organization_id = %organization_id,
            member = %member.identity,
            role = %member.role,
            "Added organization member"
        );
        Self::row_to_member(&row)
    }

    async fn update_member_role(
        &self,
        organization_id: Uuid,
        identity: &str,
        role: Role,
    ) -> Result<Member, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_opt(
                r#"
                UPDATE organization_members
                SET role = $3
                WHERE organization_id = $1 AND identity = $2 AND is_active
                RETURNING *
                "#,
                &[&organization_id, &identity, &role.as_str()],
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::NotFound("organization member".to_string()))?;

        Self::row_to_member(&row)
    }

    async fn remove_member(
        &self,
        organization_id: Uuid,
        identity: &str,
    ) -> Result<bool, RepositoryError> {
        let client = self.get_client().await?;

        let rows_affected = client
            .execute(
                "UPDATE organization_members SET is_active = FALSE
                 WHERE organization_id = $1 AND identity = $2 AND is_active",
                &[&organization_id, &identity],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows_affected > 0)
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Member>, RepositoryError> {
        let client = self.get_client().await?;

        let rows = client
            .query(
                "SELECT * FROM organization_members
                 WHERE organization_id = $1 AND is_active
                 ORDER BY joined_at",
                &[&organization_id],
            )
            .await
            .map_err(map_db_error)?;

        rows.iter().map(Self::row_to_member).collect()
    }

    async fn count_admins(&self, organization_id: Uuid) -> Result<i64, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "SELECT COUNT(*) FROM organization_members
                 WHERE organization_id = $1 AND role = 'admin' AND is_active",
                &[&organization_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.get(0))
    }

    async fn count_members(&self, organization_id: Uuid) -> Result<i64, RepositoryError> {
        let client = self.get_client().await?;

        let row = client
            .query_one(
                "SELECT COUNT(*) FROM organization_members
                 WHERE organization_id = $1 AND is_active",
                &[&organization_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.get(0))
    }

    async fn soft_delete_with_detach(
        &self,
        organization_id: Uuid,
    ) -> Result<(), RepositoryError> {
        let mut client = self.get_client().await?;
        let transaction = client.transaction().await.map_err(map_db_error)?;

        let rows_affected = transaction
            .execute(
                "UPDATE organizations SET is_active = FALSE, updated_at = NOW()
                 WHERE id = $1 AND is_active",
                &[&organization_id],
            )
            .await
            .map_err(map_db_error)?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound("organization".to_string()));
        }

        let detached = transaction
            .query(
                "UPDATE organization_members SET is_active = FALSE
                 WHERE organization_id = $1 AND is_active
                 RETURNING identity",
                &[&organization_id],
            )
            .await
            .map_err(map_db_error)?;

        // Re-point profiles whose active context was the deleted
        // organization to any remaining membership
        for row in &detached {
            let identity: String = row.get("identity");

            let fallback = transaction
                .query_opt(
                    r#"
                    SELECT m.organization_id, m.role
                    FROM organization_members m
                    JOIN organizations o ON o.id = m.organization_id
                    WHERE m.identity = $1 AND m.is_active AND o.is_active
                    ORDER BY m.joined_at
                    LIMIT 1
                    "#,
                    &[&identity],
                )
                .await
                .map_err(map_db_error)?;

            match fallback {
                Some(f) => {
                    let fallback_org: Uuid = f.get(0);
                    let fallback_role: String = f.get(1);
                    transaction
                        .execute(
                            "UPDATE users
                             SET organization_id = $2, role = $3, updated_at = NOW()
                             WHERE identity = $1 AND organization_id = $4",
                            &[&identity, &fallback_org, &fallback_role, &organization_id],
                        )
                        .await
                        .map_err(map_db_error)?;
                }
                None => {
                    transaction
                        .execute(
                            "UPDATE users
                             SET organization_id = NULL, updated_at = NOW()
                             WHERE identity = $1 AND organization_id = $2",
                            &[&identity, &organization_id],
                        )
                        .await
                        .map_err(map_db_error)?;
                }
            }
        }

        transaction.commit().await.map_err(map_db_error)?;

        debug!(
            organization_id = %organization_id,
            members = detached.len(),
            "Soft-deleted organization and detached members"
        );
        Ok(())
    }

    async fn update_settings(
        &self,
        organization_id: Uuid,
        settings: &OrganizationSettings,
    ) -> Result<Organization, RepositoryError> {
        let client = self.get_client().await?;
        let extra = serde_json::Value::Object(settings.extra.clone());

        let row = client
            .query_opt(
                r#"
                UPDATE organizations
                SET invite_required = $2, extra = $3, updated_at = NOW()
                WHERE id = $1 AND is_active
                RETURNING *
                "#,
                &[&organization_id, &settings.invite_required, &extra],
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::NotFound("organization".to_string()))?;

        Self::row_to_organization(&row)
    }
}
