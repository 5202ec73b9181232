pub mod ports;
pub use ports::*;

use crate::authz::{Action, PermissionTable, Resource, Role};
use crate::common::RepositoryError;
use crate::user::{Principal, UserProfile, UserRepository};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct OrganizationService {
    organizations: Arc<dyn OrganizationRepository>,
    users: Arc<dyn UserRepository>,
    permissions: Arc<PermissionTable>,
}

impl OrganizationService {
    pub fn new(
        organizations: Arc<dyn OrganizationRepository>,
        users: Arc<dyn UserRepository>,
        permissions: Arc<PermissionTable>,
    ) -> Self {
        Self {
            organizations,
            users,
            permissions,
        }
    }

    /// Create a new organization with the principal as sole admin member.
    ///
    /// This is the onboarding transition as well as the explicit "create
    /// organization" action: organization, creator membership and profile
    /// linkage are written in one transaction by the repository.
    pub async fn create_organization(
        &self,
        name: &str,
        settings: Option<OrganizationSettings>,
        principal: &Principal,
    ) -> Result<Organization, OrganizationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OrganizationError::InvalidParams(
                "Organization name cannot be empty".to_string(),
            ));
        }

        // Rejected before any write; the repository re-checks inside the
        // creation transaction.
        let active = self
            .organizations
            .count_active_for_email(&principal.email)
            .await
            .map_err(internal)?;
        if active >= MAX_ACTIVE_ORGANIZATIONS {
            return Err(OrganizationError::LimitReached);
        }

        let settings = settings.unwrap_or_default();
        let organization = self
            .organizations
            .create_with_owner(name, &settings, principal)
            .await
            .map_err(|e| match e {
                RepositoryError::LimitExceeded(_) => OrganizationError::LimitReached,
                other => internal(other),
            })?;

        info!(
            organization_id = %organization.id,
            creator = %principal.identity,
            "Created organization"
        );
        Ok(organization)
    }

    /// Get an organization. Requester must be an active member.
    pub async fn get_organization(
        &self,
        id: Uuid,
        requester: &Principal,
    ) -> Result<Organization, OrganizationError> {
        let organization = self
            .organizations
            .get_by_id(id)
            .await
            .map_err(internal)?
            .ok_or(OrganizationError::NotFound)?;

        self.require_member(id, requester).await?;
        Ok(organization)
    }

    /// List active organizations the principal belongs to.
    pub async fn list_organizations(
        &self,
        principal: &Principal,
    ) -> Result<Vec<Organization>, OrganizationError> {
        self.organizations
            .list_for_email(&principal.email)
            .await
            .map_err(internal)
    }

    /// Switch the principal's active organization context.
    ///
    /// Requires an active membership by email in the target organization.
    /// The cached role on the profile is rewritten from the membership
    /// record, never carried over.
    pub async fn switch_organization(
        &self,
        principal: &Principal,
        organization_id: Uuid,
    ) -> Result<UserProfile, OrganizationError> {
        self.organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(OrganizationError::NotFound)?;

        let member = self
            .organizations
            .get_member_by_email(organization_id, &principal.email)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
            .ok_or(OrganizationError::NotAMember)?;

        let profile = self
            .users
            .set_active_organization(
                &principal.identity,
                Some(organization_id),
                Some(member.role),
            )
            .await
            .map_err(internal)?;

        debug!(
            identity = %principal.identity,
            organization_id = %organization_id,
            role = %member.role,
            "Switched active organization"
        );
        Ok(profile)
    }

    /// List members. Requester must be an active member.
    pub async fn get_members(
        &self,
        organization_id: Uuid,
        requester: &Principal,
    ) -> Result<Vec<Member>, OrganizationError> {
        self.organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(OrganizationError::NotFound)?;
        self.require_member(organization_id, requester).await?;

        self.organizations
            .list_members(organization_id)
            .await
            .map_err(internal)
    }

    /// Change a member's role. Admin cannot demote the last admin of an
    /// active organization.
    pub async fn update_member_role(
        &self,
        organization_id: Uuid,
        requester: &Principal,
        member_identity: &str,
        new_role: Role,
    ) -> Result<Member, OrganizationError> {
        self.organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(OrganizationError::NotFound)?;

        self.require_permission(organization_id, requester, Resource::Users, Action::Update)
            .await?;

        let target = self
            .organizations
            .get_member_by_identity(organization_id, member_identity)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
            .ok_or(OrganizationError::MemberNotFound)?;

        if target.role == Role::Admin && new_role != Role::Admin {
            let admins = self
                .organizations
                .count_admins(organization_id)
                .await
                .map_err(internal)?;
            if admins <= 1 {
                return Err(OrganizationError::Conflict(
                    "Cannot demote the last admin of an organization".to_string(),
                ));
            }
        }

        let member = self
            .organizations
            .update_member_role(organization_id, member_identity, new_role)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => OrganizationError::MemberNotFound,
                other => internal(other),
            })?;

        // Refresh the denormalized role cache if this org is the member's
        // active context.
        if let Some(profile) = self
            .users
            .get_by_identity(member_identity)
            .await
            .map_err(internal)?
        {
            if profile.organization_id == Some(OrganizationId(organization_id)) {
                self.users
                    .set_active_organization(
                        member_identity,
                        Some(organization_id),
                        Some(new_role),
                    )
                    .await
                    .map_err(internal)?;
            }
        }

        Ok(member)
    }

    /// Remove a member, or leave when the requester removes itself.
    ///
    /// If the removed organization was the member's active context, the
    /// profile is re-pointed to any remaining membership, or left without an
    /// active organization if none remain.
    pub async fn remove_member(
        &self,
        organization_id: Uuid,
        requester: &Principal,
        member_identity: &str,
    ) -> Result<(), OrganizationError> {
        self.organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(OrganizationError::NotFound)?;

        let target = self
            .organizations
            .get_member_by_identity(organization_id, member_identity)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
            .ok_or(OrganizationError::MemberNotFound)?;

        // Self-removal (leave) needs no permission; removing someone else
        // requires user-management rights.
        if requester.identity != member_identity {
            self.require_permission(organization_id, requester, Resource::Users, Action::Delete)
                .await?;
        }

        // An active organization must never end up with an empty member
        // list or without any admin; it has to be deleted instead.
        let members = self
            .organizations
            .count_members(organization_id)
            .await
            .map_err(internal)?;
        if members <= 1 {
            return Err(OrganizationError::Conflict(
                "Cannot remove the only member; delete the organization instead".to_string(),
            ));
        }
        if target.role == Role::Admin {
            let admins = self
                .organizations
                .count_admins(organization_id)
                .await
                .map_err(internal)?;
            if admins <= 1 {
                return Err(OrganizationError::Conflict(
                    "Cannot remove the last admin of an organization".to_string(),
                ));
            }
        }

        let removed = self
            .organizations
            .remove_member(organization_id, member_identity)
            .await
            .map_err(internal)?;
        if !removed {
            return Err(OrganizationError::MemberNotFound);
        }

        self.repoint_active_organization(&target, organization_id)
            .await?;

        info!(
            organization_id = %organization_id,
            member = %member_identity,
            "Removed organization member"
        );
        Ok(())
    }

    /// Soft-delete an organization.
    ///
    /// Permitted only for an admin member, and only when no member would be
    /// stranded: every active member (the requester included) must hold at
    /// least one other active organization to fall back to.
    pub async fn delete_organization(
        &self,
        organization_id: Uuid,
        requester: &Principal,
    ) -> Result<(), OrganizationError> {
        self.organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(OrganizationError::NotFound)?;

        self.require_permission(
            organization_id,
            requester,
            Resource::Organization,
            Action::Delete,
        )
        .await?;

        let members = self
            .organizations
            .list_members(organization_id)
            .await
            .map_err(internal)?;

        for member in members.iter().filter(|m| m.is_active) {
            let remaining = self
                .organizations
                .count_active_for_email(&member.email)
                .await
                .map_err(internal)?;
            if remaining <= 1 {
                debug!(
                    organization_id = %organization_id,
                    member = %member.email,
                    "Deletion would strand a member"
                );
                return Err(OrganizationError::LastOrganization);
            }
        }

        self.organizations
            .soft_delete_with_detach(organization_id)
            .await
            .map_err(internal)?;

        info!(organization_id = %organization_id, "Soft-deleted organization");
        Ok(())
    }

    /// Update tenant settings. Requires settings-update permission.
    pub async fn update_settings(
        &self,
        organization_id: Uuid,
        requester: &Principal,
        settings: OrganizationSettings,
    ) -> Result<Organization, OrganizationError> {
        self.organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(OrganizationError::NotFound)?;

        self.require_permission(
            organization_id,
            requester,
            Resource::Settings,
            Action::Update,
        )
        .await?;

        self.organizations
            .update_settings(organization_id, &settings)
            .await
            .map_err(internal)
    }

    /// Membership role of the requester, resolved from the membership
    /// record (never from the profile cache).
    pub async fn member_role(
        &self,
        organization_id: Uuid,
        requester: &Principal,
    ) -> Result<Option<Role>, OrganizationError> {
        Ok(self
            .organizations
            .get_member_by_identity(organization_id, &requester.identity)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
            .map(|m| m.role))
    }

    async fn require_member(
        &self,
        organization_id: Uuid,
        requester: &Principal,
    ) -> Result<Member, OrganizationError> {
        self.organizations
            .get_member_by_identity(organization_id, &requester.identity)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
            .ok_or(OrganizationError::NotAMember)
    }

    /// Fails closed: an unresolvable membership denies the request.
    async fn require_permission(
        &self,
        organization_id: Uuid,
        requester: &Principal,
        resource: Resource,
        action: Action,
    ) -> Result<(), OrganizationError> {
        let member = match self.require_member(organization_id, requester).await {
            Ok(member) => member,
            Err(_) => {
                warn!(
                    organization_id = %organization_id,
                    identity = %requester.identity,
                    "Permission check for non-member denied"
                );
                return Err(OrganizationError::Forbidden);
            }
        };

        if self.permissions.is_allowed(member.role, resource, action) {
            Ok(())
        } else {
            Err(OrganizationError::Forbidden)
        }
    }

    async fn repoint_active_organization(
        &self,
        removed: &Member,
        removed_org: Uuid,
    ) -> Result<(), OrganizationError> {
        let profile = match self
            .users
            .get_by_identity(&removed.identity)
            .await
            .map_err(internal)?
        {
            Some(profile) => profile,
            None => return Ok(()),
        };

        if profile.organization_id != Some(OrganizationId(removed_org)) {
            return Ok(());
        }

        let remaining = self
            .organizations
            .list_for_email(&removed.email)
            .await
            .map_err(internal)?;

        match remaining.first() {
            Some(fallback) => {
                let role = self
                    .organizations
                    .get_member_by_email(fallback.id.0, &removed.email)
                    .await
                    .map_err(internal)?
                    .map(|m| m.role);
                self.users
                    .set_active_organization(&removed.identity, Some(fallback.id.0), role)
                    .await
                    .map_err(internal)?;
            }
            None => {
                self.users
                    .set_active_organization(&removed.identity, None, None)
                    .await
                    .map_err(internal)?;
            }
        }
        Ok(())
    }
}

fn internal(e: RepositoryError) -> OrganizationError {
    OrganizationError::Internal(e.to_string())
}
