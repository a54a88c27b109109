//! Identity lookup and password checks.

use tracing::debug;
use uuid::Uuid;

use super::password::{hash_password, verify_password};
use crate::user::{User, UserRepository};
use crate::{HangarError, Result};

/// Finds users by e-mail or login name and checks their passwords.
///
/// Hashing runs on the blocking pool; Argon2id is slow on purpose.
#[derive(Clone)]
pub struct UserAuthorizer {
    users: UserRepository,
}

impl UserAuthorizer {
    /// Create a new UserAuthorizer.
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    /// Find a user by e-mail first, then by login name.
    pub async fn identify_user(&self, email: Option<&str>, username: Option<&str>) -> Result<User> {
        if let Some(email) = email.filter(|e| !e.is_empty()) {
            match self.users.find_user_by_email(email).await {
                Ok(user) => return Ok(user),
                Err(e) if e.is_not_found() => {
                    debug!("No user with that e-mail, trying the login name");
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            return self.users.find_user_by_username(username).await;
        }
        Err(HangarError::NotFound("user".to_string()))
    }

    /// Hash a new password.
    pub async fn create_password_hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| HangarError::Internal(format!("hashing task failed: {e}")))??;
        Ok(hash)
    }

    /// Check `password` against the stored hash of `user_id`.
    ///
    /// A wrong password is `Auth`; an unknown user stays `NotFound`.
    pub async fn check_password(&self, password: &str, user_id: Uuid) -> Result<()> {
        let user = self.users.get_user(user_id).await?;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &user.password))
            .await
            .map_err(|e| HangarError::Internal(format!("verification task failed: {e}")))??;
        Ok(())
    }
}
