use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::user::models::Identity;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;
use crate::user::ports::UserDirectory;
use crate::user::ports::UserServicePort;

/// Domain service implementation for profile operations.
///
/// Concrete implementation of UserServicePort with dependency injection.
pub struct UserService<UD>
where
    UD: UserDirectory,
{
    directory: Arc<UD>,
}

impl<UD> UserService<UD>
where
    UD: UserDirectory,
{
    /// Create a new user service with injected dependencies.
    ///
    /// # Arguments
    /// * `directory` - User persistence implementation
    ///
    /// # Returns
    /// Configured user service instance
    pub fn new(directory: Arc<UD>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<UD> UserServicePort for UserService<UD>
where
    UD: UserDirectory,
{
    async fn get_profile(&self, id: &UserId) -> Result<Identity, UserError> {
        self.directory
            .find_by_id(id)
            .await?
            .map(|user| user.identity())
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<Identity, UserError> {
        let mut user = self
            .directory
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;

        if let Some(first_name) = command.first_name {
            user.first_name = first_name;
        }

        if let Some(last_name) = command.last_name {
            user.last_name = last_name;
        }

        user.updated_at = Some(Utc::now());

        let updated_user = self.directory.update(user).await?;
        tracing::info!(user_id = %updated_user.id, "Profile updated");

        Ok(updated_user.identity())
    }
}
