use std::sync::Arc;

use crate::error::EngineError;
use crate::users::repo::UserRepository;
use crate::users::User;

pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Get-or-create by platform id, touching the activity timestamp on every
    /// contact.
    pub async fn ensure_user(&self, platform_user_id: i64) -> Result<User, EngineError> {
        if let Some(existing) = self.repo.get_by_platform_id(platform_user_id).await? {
            self.repo.touch_last_active(existing.id).await?;
            return Ok(existing);
        }
        self.repo.create(platform_user_id).await
    }
}
