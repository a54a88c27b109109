//! User, role and session models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub id: Uuid,
    /// Login name, unique regardless of case.
    pub username: String,
    /// Name shown to others.
    pub display_name: Option<String>,
    /// E-mail address, unique regardless of case.
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip)]
    pub password: String,
    /// Whether the account has been verified.
    pub verified: bool,
    /// Role of the user.
    #[serde(rename = "roleID")]
    pub role_id: Uuid,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Reputation.
    pub karma: i32,
    /// Object-store key of the profile picture.
    #[serde(skip)]
    pub profile_pic_key: Option<String>,
    /// Presigned link to the profile picture, filled in by the repository.
    #[sqlx(skip)]
    pub profile_pic: Option<String>,
    /// Optimistic-concurrency version.
    pub version: i32,
}

/// Data for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Display name.
    pub display_name: Option<String>,
    /// E-mail address.
    pub email: String,
    /// Password hash, never the plain password.
    pub password_hash: String,
    /// Role; the free tier when unset.
    pub role_id: Option<Uuid>,
}

impl NewUser {
    /// Create a new user with minimal required fields.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            display_name: None,
            email: email.into(),
            password_hash: password_hash.into(),
            role_id: None,
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role_id: Uuid) -> Self {
        self.role_id = Some(role_id);
        self
    }
}

/// Partial update of a user.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// New login name.
    pub username: Option<String>,
    /// New display name.
    pub display_name: Option<String>,
    /// New e-mail address.
    pub email: Option<String>,
    /// New verification state.
    pub verified: Option<bool>,
    /// New karma.
    pub karma: Option<i32>,
    /// New role.
    pub role_id: Option<Uuid>,
    /// Version the client last saw, if any.
    pub version: Option<i32>,
}

impl UserUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the verification state.
    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    /// Set new display name.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the role.
    pub fn role(mut self, role_id: Uuid) -> Self {
        self.role_id = Some(role_id);
        self
    }

    /// True when no column would change.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.display_name.is_none()
            && self.email.is_none()
            && self.verified.is_none()
            && self.karma.is_none()
            && self.role_id.is_none()
    }
}

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct Role {
    /// Role ID.
    pub id: Uuid,
    /// Name used as a policy subject.
    pub name: String,
    /// Optimistic-concurrency version.
    pub version: i32,
}

/// Partial update of a role.
#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    /// New name.
    pub name: Option<String>,
    /// Version the client last saw.
    pub version: Option<i32>,
}

impl RoleUpdate {
    /// True when no column would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}

/// An authenticated login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session ID, sent as the `sessionID` cookie.
    pub id: Uuid,
    /// Owner.
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    /// Login time.
    pub created_at: DateTime<Utc>,
}
