pub mod ports;
pub use ports::*;

use std::sync::Arc;
use tracing::debug;

pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Resolve the profile for an authenticated principal.
    ///
    /// Returns `None` for a freshly authenticated principal with no profile
    /// yet; the caller is expected to route such principals into onboarding.
    pub async fn current_profile(
        &self,
        principal: &Principal,
    ) -> Result<Option<UserProfile>, UserError> {
        let profile = self
            .users
            .get_by_identity(&principal.identity)
            .await
            .map_err(|e| UserError::Internal(format!("Failed to resolve profile: {}", e)))?;

        if profile.is_none() {
            debug!(identity = %principal.identity, "No profile yet, onboarding required");
        }

        Ok(profile.filter(|p| p.is_active))
    }

    pub async fn get_profile(&self, identity: &str) -> Result<UserProfile, UserError> {
        self.users
            .get_by_identity(identity)
            .await
            .map_err(|e| UserError::Internal(format!("Failed to load profile: {}", e)))?
            .filter(|p| p.is_active)
            .ok_or(UserError::NotFound)
    }

    /// Soft-delete a profile (explicit account removal).
    pub async fn deactivate(&self, identity: &str) -> Result<(), UserError> {
        let removed = self
            .users
            .deactivate(identity)
            .await
            .map_err(|e| UserError::Internal(format!("Failed to deactivate profile: {}", e)))?;
        if removed {
            Ok(())
        } else {
            Err(UserError::NotFound)
        }
    }
}
