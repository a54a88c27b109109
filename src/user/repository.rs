//! User repository.
//!
//! Owns the permission tuples tied to accounts and sessions:
//!
//! - a user may PATCH and DELETE `users/<id>`;
//! - a user may DELETE `logout/<session id>` for each of its live sessions.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use super::store::UserStore;
use super::types::{NewUser, Role, RoleUpdate, Session, User, UserUpdate};
use crate::db::SearchQuery;
use crate::policy::{logout_object, object_path, PolicyEngine, FREE_TIER, PAID_TIER, SUPERUSER};
use crate::storage::{check_file_size, picture_key, ObjectStore, Upload, PICTURE_TIER};
use crate::{HangarError, Result};

const USERS: &str = "users";

/// Repository for users, roles and sessions.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn UserStore>,
    policy: Arc<PolicyEngine>,
    objects: Arc<dyn ObjectStore>,
}

impl UserRepository {
    /// Create a new UserRepository.
    pub fn new(
        store: Arc<dyn UserStore>,
        policy: Arc<PolicyEngine>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            store,
            policy,
            objects,
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Create a user and grant it PATCH and DELETE on itself.
    ///
    /// Users without a role get the free tier.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let mut new_user = new_user.clone();
        if new_user.role_id.is_none() {
            new_user.role_id = Some(self.store.role_by_name(FREE_TIER).await?.id);
        }
        let user = self.store.insert_user(&new_user).await?;

        let subject = user.id.to_string();
        let object = object_path(USERS, user.id);
        self.policy.grant_owner(&subject, &object).await?;
        Ok(user)
    }

    /// Get a user by ID.
    pub async fn find_user(&self, id: Uuid) -> Result<User> {
        let mut user = self.store.user_by_id(id).await?;
        self.attach_picture(&mut user).await?;
        Ok(user)
    }

    /// Get a user by ID without resolving the picture link.
    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.store.user_by_id(id).await
    }

    /// Get a user by e-mail address.
    pub async fn find_user_by_email(&self, email: &str) -> Result<User> {
        self.store.user_by_email(email).await
    }

    /// Get a user by login name.
    pub async fn find_user_by_username(&self, username: &str) -> Result<User> {
        self.store.user_by_username(username).await
    }

    /// Search users, with profile picture links.
    pub async fn find_users(&self, query: &SearchQuery) -> Result<Vec<User>> {
        let mut users = self.store.find_users(query).await?;
        for user in &mut users {
            self.attach_picture(user).await?;
        }
        Ok(users)
    }

    /// Versioned partial update.
    pub async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<User> {
        if update.is_empty() {
            return Err(HangarError::Validation("nothing to update".to_string()));
        }
        let mut user = self.store.update_user(id, update).await?;
        self.attach_picture(&mut user).await?;
        Ok(user)
    }

    /// Mark a user as verified.
    pub async fn verify_user(&self, id: Uuid) -> Result<User> {
        self.store
            .update_user(id, &UserUpdate::new().verified(true))
            .await
    }

    /// Replace the password hash of a user.
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        self.store.set_password(id, password_hash).await
    }

    /// Store a new profile picture.
    pub async fn set_profile_picture(&self, id: Uuid, picture: Upload) -> Result<User> {
        check_file_size(picture.size(), PICTURE_TIER)?;
        self.store.user_by_id(id).await?;

        let key = picture_key(id);
        self.objects
            .put(&key, picture.data, picture.content_type.as_deref())
            .await?;
        self.store.set_profile_key(id, &key).await?;
        self.find_user(id).await
    }

    /// Delete a user, its sessions and every permission tied to them.
    pub async fn delete_user(&self, id: Uuid) -> Result<()> {
        let user = self.store.user_by_id(id).await?;
        let session_ids = self.store.delete_user(id).await?;

        let subject = id.to_string();
        for session_id in session_ids {
            self.policy
                .remove(&subject, &logout_object(session_id), "DELETE")
                .await?;
        }
        let object = object_path(USERS, id);
        self.policy.remove(&subject, &object, "PATCH").await?;
        self.policy.remove(&subject, &object, "DELETE").await?;

        if let Some(key) = &user.profile_pic_key {
            if let Err(e) = self.objects.delete(key).await {
                warn!(user_id = %id, key = %key, "Failed to delete profile picture: {}", e);
            }
        }
        Ok(())
    }

    async fn attach_picture(&self, user: &mut User) -> Result<()> {
        let Some(key) = &user.profile_pic_key else {
            return Ok(());
        };
        match self.objects.get_link(key).await {
            Ok(link) => user.profile_pic = Some(link),
            Err(HangarError::ObjectNotFound(_)) => {
                warn!(user_id = %user.id, key = %key, "Profile picture is missing");
                user.profile_pic = None;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Open a session and allow its owner to log it out.
    pub async fn create_session(&self, user_id: Uuid) -> Result<Session> {
        let session = self.store.insert_session(user_id).await?;
        self.policy
            .add(&user_id.to_string(), &logout_object(session.id), "DELETE")
            .await?;
        Ok(session)
    }

    /// Get a session by ID.
    pub async fn find_session(&self, id: Uuid) -> Result<Session> {
        self.store.session_by_id(id).await
    }

    /// Every session of a user.
    pub async fn user_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        self.store.sessions_of_user(user_id).await
    }

    /// Close a session.
    pub async fn delete_session(&self, id: Uuid) -> Result<()> {
        let session = self.store.session_by_id(id).await?;
        self.store.delete_session(id).await?;
        self.policy
            .remove(&session.user_id.to_string(), &logout_object(id), "DELETE")
            .await?;
        Ok(())
    }

    /// Close every session of a user.
    ///
    /// Permissions are dropped first so no tuple outlives its session.
    pub async fn delete_all_user_sessions(&self, user_id: Uuid) -> Result<u64> {
        let subject = user_id.to_string();
        for session in self.store.sessions_of_user(user_id).await? {
            self.policy
                .remove(&subject, &logout_object(session.id), "DELETE")
                .await?;
        }
        self.store.delete_sessions_of_user(user_id).await
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    /// Create a role.
    pub async fn create_role(&self, name: &str) -> Result<Role> {
        self.store.insert_role(name).await
    }

    /// Get a role by ID.
    pub async fn find_role(&self, id: Uuid) -> Result<Role> {
        self.store.role_by_id(id).await
    }

    /// Get a role by name.
    pub async fn find_role_by_name(&self, name: &str) -> Result<Role> {
        self.store.role_by_name(name).await
    }

    /// Search roles.
    pub async fn find_roles(&self, query: &SearchQuery) -> Result<Vec<Role>> {
        self.store.find_roles(query).await
    }

    /// Versioned role update.
    ///
    /// Renaming does not move permissions granted to the old name.
    pub async fn update_role(&self, id: Uuid, update: &RoleUpdate) -> Result<Role> {
        if update.is_empty() {
            return Err(HangarError::Validation("nothing to update".to_string()));
        }
        self.store.update_role(id, update).await
    }

    /// Delete a role and every tuple and grouping naming it.
    ///
    /// Fails while users still hold the role, and for the built-in roles.
    pub async fn delete_role(&self, id: Uuid) -> Result<()> {
        let role = self.store.role_by_id(id).await?;
        if [SUPERUSER, PAID_TIER, FREE_TIER]
            .iter()
            .any(|builtin| role.name.eq_ignore_ascii_case(builtin))
        {
            return Err(HangarError::Validation(format!(
                "role {} is built in",
                role.name
            )));
        }
        let role = self.store.delete_role(id).await?;
        self.policy.remove_subject(&role.name).await
    }
}
