pub mod ports;
pub use ports::*;

use crate::authz::{Action, PermissionTable, Resource, Role};
use crate::common::RepositoryError;
use crate::notify::{InvitationNotification, Notifier};
use crate::organization::{Member, NewMember, OrganizationRepository, MAX_ACTIVE_ORGANIZATIONS};
use crate::user::{Principal, UserRepository};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Invitation policy knobs, taken from configuration at startup.
#[derive(Debug, Clone)]
pub struct InvitationPolicy {
    /// Base URL for constructing join links
    pub base_url: String,
    pub expires_in_days: i64,
}

impl Default for InvitationPolicy {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            expires_in_days: 7,
        }
    }
}

pub struct InvitationService {
    invitations: Arc<dyn InvitationRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    permissions: Arc<PermissionTable>,
    policy: InvitationPolicy,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
        permissions: Arc<PermissionTable>,
        policy: InvitationPolicy,
    ) -> Self {
        Self {
            invitations,
            organizations,
            users,
            notifier,
            permissions,
            policy,
        }
    }

    /// Create a time-boxed invitation granting `role` in the organization.
    ///
    /// Notification dispatch failure does not fail the operation; the
    /// invitation stands and the caller receives `notified = false`.
    pub async fn create_invitation(
        &self,
        organization_id: Uuid,
        inviter: &Principal,
        email: &str,
        role: Role,
    ) -> Result<CreatedInvitation, InvitationError> {
        if role == Role::Admin {
            return Err(InvitationError::RoleNotGrantable);
        }

        let email = email.trim().to_ascii_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(InvitationError::InvalidParams(
                "A valid email address is required".to_string(),
            ));
        }

        let organization = self
            .organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(InvitationError::OrganizationNotFound)?;

        // Fails closed when the inviter's membership cannot be resolved
        let inviter_member = self
            .organizations
            .get_member_by_identity(organization_id, &inviter.identity)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
            .ok_or(InvitationError::Forbidden)?;
        if !self
            .permissions
            .is_allowed(inviter_member.role, Resource::Users, Action::Invite)
        {
            return Err(InvitationError::Forbidden);
        }

        if self
            .organizations
            .get_member_by_email(organization_id, &email)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
            .is_some()
        {
            return Err(InvitationError::AlreadyMember);
        }

        if self
            .invitations
            .find_pending(organization_id, &email)
            .await
            .map_err(internal)?
            .is_some()
        {
            return Err(InvitationError::AlreadyPending);
        }

        let invitation = self
            .invitations
            .create(
                organization_id,
                &email,
                role,
                &inviter.identity,
                self.policy.expires_in_days,
            )
            .await
            .map_err(internal)?;

        let notification = InvitationNotification {
            recipient: email.clone(),
            organization_name: organization.name.clone(),
            inviter: inviter.email.clone(),
            join_link: self.join_link(&invitation.token),
            role,
        };
        let notified = match self.notifier.send_invitation(&notification).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    organization_id = %organization_id,
                    recipient = %email,
                    error = %e,
                    "Invitation notification failed; invitation remains valid"
                );
                false
            }
        };

        info!(
            organization_id = %organization_id,
            invitation_id = %invitation.id,
            role = %role,
            notified,
            "Created invitation"
        );
        Ok(CreatedInvitation {
            invitation,
            notified,
        })
    }

    /// Read-only token check. Anything but a pending, unexpired invitation
    /// gets the same generic error.
    pub async fn verify_invitation(
        &self,
        token: &str,
    ) -> Result<InvitationDetails, InvitationError> {
        let invitation = self
            .invitations
            .get_by_token(token)
            .await
            .map_err(internal)?
            .ok_or(InvitationError::InvalidToken)?;

        if !invitation.is_acceptable(Utc::now()) {
            return Err(InvitationError::InvalidToken);
        }

        let organization = self
            .organizations
            .get_by_id(invitation.organization_id.0)
            .await
            .map_err(internal)?
            .ok_or(InvitationError::InvalidToken)?;

        Ok(InvitationDetails {
            email: invitation.email,
            organization_name: organization.name,
            role: invitation.role,
            expires_at: invitation.expires_at,
        })
    }

    /// Consume an invitation token and materialize membership.
    ///
    /// The acceptor's email must match the invited email
    /// case-insensitively; a mismatch mutates nothing. Acceptance is
    /// single-use: the conditional pending -> accepted transition makes a
    /// second attempt fail.
    pub async fn accept_invitation(
        &self,
        token: &str,
        acceptor: &Principal,
    ) -> Result<Member, InvitationError> {
        let invitation = self
            .invitations
            .get_by_token(token)
            .await
            .map_err(internal)?
            .ok_or(InvitationError::InvalidToken)?;

        if !invitation.is_acceptable(Utc::now()) {
            return Err(InvitationError::InvalidToken);
        }

        let organization_id = invitation.organization_id.0;

        // The organization may have been soft-deleted since the invitation
        // was issued; its tokens die with it.
        self.organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(InvitationError::InvalidToken)?;

        if !invitation.email.eq_ignore_ascii_case(&acceptor.email) {
            debug!(invitation_id = %invitation.id, "Acceptor email mismatch");
            return Err(InvitationError::EmailMismatch);
        }

        // Idempotent join: an existing membership is kept as-is, only the
        // invitation is consumed.
        if let Some(existing) = self
            .organizations
            .get_member_by_identity(organization_id, &acceptor.identity)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
        {
            self.consume(invitation.id).await?;
            return Ok(existing);
        }

        let active = self
            .organizations
            .count_active_for_email(&acceptor.email)
            .await
            .map_err(internal)?;
        if active >= MAX_ACTIVE_ORGANIZATIONS {
            return Err(InvitationError::LimitReached);
        }

        let member = self
            .organizations
            .add_member(
                organization_id,
                &NewMember {
                    email: invitation.email.clone(),
                    identity: acceptor.identity.clone(),
                    role: invitation.role,
                },
            )
            .await
            .map_err(|e| match e {
                RepositoryError::AlreadyExists => InvitationError::AlreadyMember,
                other => internal(other),
            })?;

        // Resolve or construct the acceptor's profile and switch it into
        // the joined organization at the granted role.
        self.users
            .upsert(acceptor, invitation.role, Some(organization_id))
            .await
            .map_err(internal)?;

        self.consume(invitation.id).await?;

        info!(
            organization_id = %organization_id,
            invitation_id = %invitation.id,
            member = %acceptor.identity,
            "Accepted invitation"
        );
        Ok(member)
    }

    /// List an organization's invitations; requires invite permission.
    pub async fn list_invitations(
        &self,
        organization_id: Uuid,
        requester: &Principal,
    ) -> Result<Vec<Invitation>, InvitationError> {
        self.organizations
            .get_by_id(organization_id)
            .await
            .map_err(internal)?
            .ok_or(InvitationError::OrganizationNotFound)?;

        let member = self
            .organizations
            .get_member_by_identity(organization_id, &requester.identity)
            .await
            .map_err(internal)?
            .filter(|m| m.is_active)
            .ok_or(InvitationError::Forbidden)?;
        if !self
            .permissions
            .is_allowed(member.role, Resource::Users, Action::Invite)
        {
            return Err(InvitationError::Forbidden);
        }

        self.invitations
            .list_by_organization(organization_id)
            .await
            .map_err(internal)
    }

    async fn consume(&self, invitation_id: Uuid) -> Result<(), InvitationError> {
        self.invitations
            .mark_accepted(invitation_id)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                // Raced with another acceptance; the token is spent
                RepositoryError::NotFound(_) => InvitationError::InvalidToken,
                other => internal(other),
            })
    }

    fn join_link(&self, token: &str) -> String {
        format!(
            "{}/join?token={}",
            self.policy.base_url.trim_end_matches('/'),
            token
        )
    }
}

fn internal(e: RepositoryError) -> InvitationError {
    InvitationError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotifier;
    use crate::organization::{
        MockOrganizationRepository, Organization, OrganizationId, OrganizationSettings,
    };
    use crate::user::{MockUserRepository, UserId, UserProfile};
    use chrono::{Duration, Utc};
    use mockall::predicate::eq;

    fn organization(id: Uuid, name: &str) -> Organization {
        Organization {
            id: OrganizationId(id),
            name: name.to_string(),
            created_by: "auth0|admin".to_string(),
            settings: OrganizationSettings::default(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(org: Uuid, identity: &str, email: &str, role: Role) -> Member {
        Member {
            organization_id: OrganizationId(org),
            email: email.to_string(),
            identity: identity.to_string(),
            role,
            is_active: true,
            joined_at: Utc::now(),
        }
    }

    fn invitation(org: Uuid, email: &str, role: Role, status: InvitationStatus) -> Invitation {
        let now = Utc::now();
        Invitation {
            id: Uuid::new_v4(),
            organization_id: OrganizationId(org),
            email: email.to_string(),
            role,
            invited_by: "auth0|admin".to_string(),
            status,
            token: "tok".repeat(21).chars().take(64).collect(),
            created_at: now,
            expires_at: now + Duration::days(7),
            responded_at: None,
        }
    }

    fn profile(org: Uuid, identity: &str, email: &str, role: Role) -> UserProfile {
        UserProfile {
            id: UserId(Uuid::new_v4()),
            identity: identity.to_string(),
            email: email.to_string(),
            role,
            organization_id: Some(OrganizationId(org)),
            organization_ids: vec![OrganizationId(org)],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Mocks {
        invitations: MockInvitationRepository,
        organizations: MockOrganizationRepository,
        users: MockUserRepository,
        notifier: MockNotifier,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                invitations: MockInvitationRepository::new(),
                organizations: MockOrganizationRepository::new(),
                users: MockUserRepository::new(),
                notifier: MockNotifier::new(),
            }
        }

        fn into_service(self) -> InvitationService {
            InvitationService::new(
                Arc::new(self.invitations),
                Arc::new(self.organizations),
                Arc::new(self.users),
                Arc::new(self.notifier),
                Arc::new(PermissionTable::new()),
                InvitationPolicy {
                    base_url: "https://app.example.com/".to_string(),
                    expires_in_days: 7,
                },
            )
        }
    }

    fn admin() -> Principal {
        Principal::new("auth0|admin", "admin@acme.com")
    }

    #[tokio::test]
    async fn create_invitation_builds_join_link_and_notifies() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));
        mocks
            .organizations
            .expect_get_member_by_identity()
            .returning(|org, identity| {
                Ok(Some(member(org, identity, "admin@acme.com", Role::Admin)))
            });
        mocks
            .organizations
            .expect_get_member_by_email()
            .returning(|_, _| Ok(None));
        mocks.invitations.expect_find_pending().returning(|_, _| Ok(None));
        mocks
            .invitations
            .expect_create()
            .withf(|_, email, role, invited_by, days| {
                email == "bob@x.com" && *role == Role::Viewer && invited_by == "auth0|admin"
                    && *days == 7
            })
            .returning(|org, email, role, _, _| {
                Ok(invitation(org, email, role, InvitationStatus::Pending))
            });
        mocks
            .notifier
            .expect_send_invitation()
            .withf(|n| {
                n.recipient == "bob@x.com"
                    && n.organization_name == "Acme"
                    && n.join_link.starts_with("https://app.example.com/join?token=")
            })
            .returning(|_| Ok(()));

        let created = mocks
            .into_service()
            .create_invitation(org_id, &admin(), "Bob@X.com", Role::Viewer)
            .await
            .unwrap();

        assert!(created.notified);
        assert_eq!(created.invitation.status, InvitationStatus::Pending);
        assert_eq!(created.invitation.role, Role::Viewer);
    }

    #[tokio::test]
    async fn admin_role_is_not_grantable_by_invitation() {
        let err = Mocks::new()
            .into_service()
            .create_invitation(Uuid::new_v4(), &admin(), "bob@x.com", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::RoleNotGrantable));
    }

    #[tokio::test]
    async fn non_admin_member_cannot_invite() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));
        mocks
            .organizations
            .expect_get_member_by_identity()
            .returning(|org, identity| Ok(Some(member(org, identity, "u@x.com", Role::User))));

        let err = mocks
            .into_service()
            .create_invitation(org_id, &Principal::new("auth0|u", "u@x.com"), "bob@x.com", Role::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::Forbidden));
    }

    #[tokio::test]
    async fn existing_member_cannot_be_invited_again() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));
        mocks
            .organizations
            .expect_get_member_by_identity()
            .returning(|org, identity| {
                Ok(Some(member(org, identity, "admin@acme.com", Role::Admin)))
            });
        mocks
            .organizations
            .expect_get_member_by_email()
            .returning(|org, email| Ok(Some(member(org, "auth0|bob", email, Role::User))));

        let err = mocks
            .into_service()
            .create_invitation(org_id, &admin(), "bob@x.com", Role::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::AlreadyMember));
    }

    #[tokio::test]
    async fn duplicate_pending_invitation_is_rejected() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));
        mocks
            .organizations
            .expect_get_member_by_identity()
            .returning(|org, identity| {
                Ok(Some(member(org, identity, "admin@acme.com", Role::Admin)))
            });
        mocks
            .organizations
            .expect_get_member_by_email()
            .returning(|_, _| Ok(None));
        mocks.invitations.expect_find_pending().returning(|org, email| {
            Ok(Some(invitation(org, email, Role::Viewer, InvitationStatus::Pending)))
        });

        let err = mocks
            .into_service()
            .create_invitation(org_id, &admin(), "bob@x.com", Role::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::AlreadyPending));
    }

    #[tokio::test]
    async fn notification_failure_is_partial_success() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));
        mocks
            .organizations
            .expect_get_member_by_identity()
            .returning(|org, identity| {
                Ok(Some(member(org, identity, "admin@acme.com", Role::Admin)))
            });
        mocks
            .organizations
            .expect_get_member_by_email()
            .returning(|_, _| Ok(None));
        mocks.invitations.expect_find_pending().returning(|_, _| Ok(None));
        mocks.invitations.expect_create().returning(|org, email, role, _, _| {
            Ok(invitation(org, email, role, InvitationStatus::Pending))
        });
        mocks
            .notifier
            .expect_send_invitation()
            .returning(|_| Err(anyhow::anyhow!("smtp down")));

        let created = mocks
            .into_service()
            .create_invitation(org_id, &admin(), "bob@x.com", Role::User)
            .await
            .unwrap();

        assert!(!created.notified);
        assert_eq!(created.invitation.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn verify_returns_details_for_pending_token() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks.invitations.expect_get_by_token().returning(move |_| {
            Ok(Some(invitation(org_id, "bob@x.com", Role::Viewer, InvitationStatus::Pending)))
        });
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));

        let details = mocks
            .into_service()
            .verify_invitation("sometoken")
            .await
            .unwrap();
        assert_eq!(details.email, "bob@x.com");
        assert_eq!(details.organization_name, "Acme");
        assert_eq!(details.role, Role::Viewer);
    }

    #[tokio::test]
    async fn verify_rejects_expired_tokens_generically() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks.invitations.expect_get_by_token().returning(move |_| {
            let mut inv = invitation(org_id, "bob@x.com", Role::Viewer, InvitationStatus::Pending);
            inv.expires_at = Utc::now() - Duration::hours(1);
            Ok(Some(inv))
        });

        let err = mocks
            .into_service()
            .verify_invitation("sometoken")
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::InvalidToken));
    }

    #[tokio::test]
    async fn accept_with_mismatched_email_mutates_nothing() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks.invitations.expect_get_by_token().returning(move |_| {
            Ok(Some(invitation(org_id, "bob@x.com", Role::Viewer, InvitationStatus::Pending)))
        });
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));
        // No membership, profile or invitation mutation expectations: any
        // such call would fail the test.

        let err = mocks
            .into_service()
            .accept_invitation("sometoken", &Principal::new("auth0|eve", "eve@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::EmailMismatch));
    }

    #[tokio::test]
    async fn accept_for_deleted_organization_is_rejected() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks.invitations.expect_get_by_token().returning(move |_| {
            Ok(Some(invitation(org_id, "bob@x.com", Role::Viewer, InvitationStatus::Pending)))
        });
        // Soft-deleted organizations resolve to nothing
        mocks.organizations.expect_get_by_id().returning(|_| Ok(None));
        // No membership, profile or invitation mutation expectations: any
        // such call would fail the test.

        let err = mocks
            .into_service()
            .accept_invitation("sometoken", &Principal::new("auth0|bob", "bob@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::InvalidToken));
    }

    #[tokio::test]
    async fn accept_creates_membership_and_consumes_token() {
        let org_id = Uuid::new_v4();
        let inv = invitation(org_id, "bob@x.com", Role::Viewer, InvitationStatus::Pending);
        let inv_id = inv.id;

        let mut mocks = Mocks::new();
        let inv_clone = inv.clone();
        mocks
            .invitations
            .expect_get_by_token()
            .returning(move |_| Ok(Some(inv_clone.clone())));
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));
        mocks
            .organizations
            .expect_get_member_by_identity()
            .returning(|_, _| Ok(None));
        mocks
            .organizations
            .expect_count_active_for_email()
            .returning(|_| Ok(0));
        mocks
            .organizations
            .expect_add_member()
            .withf(move |org, new| {
                *org == org_id && new.email == "bob@x.com" && new.role == Role::Viewer
            })
            .returning(|org, new| Ok(member(org, &new.identity, &new.email, new.role)));
        mocks
            .users
            .expect_upsert()
            .withf(move |p, role, org| {
                p.identity == "auth0|bob" && *role == Role::Viewer && *org == Some(org_id)
            })
            .returning(move |p, role, org| {
                Ok(profile(org.unwrap(), &p.identity, &p.email, role))
            });
        mocks
            .invitations
            .expect_mark_accepted()
            .with(eq(inv_id))
            .times(1)
            .returning(move |_| {
                let mut accepted = inv.clone();
                accepted.status = InvitationStatus::Accepted;
                accepted.responded_at = Some(Utc::now());
                Ok(accepted)
            });

        let member = mocks
            .into_service()
            .accept_invitation("sometoken", &Principal::new("auth0|bob", "Bob@X.com"))
            .await
            .unwrap();

        assert_eq!(member.role, Role::Viewer);
        assert_eq!(member.email, "bob@x.com");
    }

    #[tokio::test]
    async fn accepted_invitation_cannot_be_accepted_again() {
        let org_id = Uuid::new_v4();
        let mut mocks = Mocks::new();
        mocks.invitations.expect_get_by_token().returning(move |_| {
            Ok(Some(invitation(org_id, "bob@x.com", Role::Viewer, InvitationStatus::Accepted)))
        });

        let err = mocks
            .into_service()
            .accept_invitation("sometoken", &Principal::new("auth0|bob", "bob@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, InvitationError::InvalidToken));
    }

    #[tokio::test]
    async fn accept_is_idempotent_for_existing_members() {
        let org_id = Uuid::new_v4();
        let inv = invitation(org_id, "bob@x.com", Role::Viewer, InvitationStatus::Pending);
        let inv_id = inv.id;

        let mut mocks = Mocks::new();
        mocks
            .invitations
            .expect_get_by_token()
            .returning(move |_| Ok(Some(inv.clone())));
        mocks
            .organizations
            .expect_get_by_id()
            .returning(move |id| Ok(Some(organization(id, "Acme"))));
        mocks
            .organizations
            .expect_get_member_by_identity()
            .returning(|org, identity| Ok(Some(member(org, identity, "bob@x.com", Role::User))));
        mocks
            .invitations
            .expect_mark_accepted()
            .with(eq(inv_id))
            .times(1)
            .returning(move |id| {
                let mut accepted =
                    invitation(org_id, "bob@x.com", Role::Viewer, InvitationStatus::Accepted);
                accepted.id = id;
                Ok(accepted)
            });
        // add_member must not be called: membership is not duplicated

        let member = mocks
            .into_service()
            .accept_invitation("sometoken", &Principal::new("auth0|bob", "bob@x.com"))
            .await
            .unwrap();
        // Existing membership role is kept, not overwritten by the grant
        assert_eq!(member.role, Role::User);
    }
}
