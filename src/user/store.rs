//! User, role and session storage.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::types::{NewUser, Role, RoleUpdate, Session, User, UserUpdate};
use crate::db::{map_constraint, missed_update, push_search, Database, KeywordMatch, SearchQuery, SortColumns};
use crate::{HangarError, Result};

const USER_COLUMNS: &str = "id, username, display_name, email, password, verified, role_id, \
                            created_at, karma, profile_pic_key, version";
const ROLE_COLUMNS: &str = "id, name, version";
const SESSION_COLUMNS: &str = "id, user_id, created_at";

/// Persistence of users, roles and sessions.
///
/// Deleting a user removes its sessions; the IDs of those sessions are
/// returned so their permissions can be dropped.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. The role must be set.
    async fn insert_user(&self, user: &NewUser) -> Result<User>;
    /// Fetch a user.
    async fn user_by_id(&self, id: Uuid) -> Result<User>;
    /// Fetch a user by e-mail, ignoring case.
    async fn user_by_email(&self, email: &str) -> Result<User>;
    /// Fetch a user by login name, ignoring case.
    async fn user_by_username(&self, username: &str) -> Result<User>;
    /// Search users.
    async fn find_users(&self, query: &SearchQuery) -> Result<Vec<User>>;
    /// Versioned partial update.
    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<User>;
    /// Replace the password hash.
    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<()>;
    /// Record where the profile picture is stored.
    async fn set_profile_key(&self, id: Uuid, key: &str) -> Result<()>;
    /// Delete a user and its sessions.
    async fn delete_user(&self, id: Uuid) -> Result<Vec<Uuid>>;

    /// Insert a role.
    async fn insert_role(&self, name: &str) -> Result<Role>;
    /// Fetch a role.
    async fn role_by_id(&self, id: Uuid) -> Result<Role>;
    /// Fetch a role by name, ignoring case.
    async fn role_by_name(&self, name: &str) -> Result<Role>;
    /// Search roles by name.
    async fn find_roles(&self, query: &SearchQuery) -> Result<Vec<Role>>;
    /// Versioned role update.
    async fn update_role(&self, id: Uuid, update: &RoleUpdate) -> Result<Role>;
    /// Delete a role no user holds and return it.
    async fn delete_role(&self, id: Uuid) -> Result<Role>;

    /// Open a session for a user.
    async fn insert_session(&self, user_id: Uuid) -> Result<Session>;
    /// Fetch a session.
    async fn session_by_id(&self, id: Uuid) -> Result<Session>;
    /// Every session of a user.
    async fn sessions_of_user(&self, user_id: Uuid) -> Result<Vec<Session>>;
    /// Delete a session.
    async fn delete_session(&self, id: Uuid) -> Result<()>;
    /// Delete every session of a user and return how many went.
    async fn delete_sessions_of_user(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
impl UserStore for Database {
    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let role_id = user
            .role_id
            .ok_or_else(|| HangarError::Validation("user has no role".to_string()))?;

        sqlx::query_as(&format!(
            r#"INSERT INTO "user".users (username, display_name, email, password, role_id)
               VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"#
        ))
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(role_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_constraint(e, "user"))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<User> {
        sqlx::query_as(&format!(r#"SELECT {USER_COLUMNS} FROM "user".users WHERE id = $1"#))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| HangarError::NotFound(format!("user {id}")))
    }

    async fn user_by_email(&self, email: &str) -> Result<User> {
        sqlx::query_as(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user".users WHERE email = $1"#
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| HangarError::NotFound("user".to_string()))
    }

    async fn user_by_username(&self, username: &str) -> Result<User> {
        sqlx::query_as(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user".users WHERE username = $1"#
        ))
        .bind(username)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| HangarError::NotFound("user".to_string()))
    }

    async fn find_users(&self, query: &SearchQuery) -> Result<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!(r#"SELECT {USER_COLUMNS} FROM "user".users"#));
        push_search(
            &mut builder,
            query,
            KeywordMatch::AnyOf("username"),
            &SortColumns::USERS,
            false,
        );
        Ok(builder.build_query_as().fetch_all(self.pool()).await?)
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<User> {
        let row: Option<User> = sqlx::query_as(&format!(
            r#"UPDATE "user".users SET
                   username = COALESCE($1, username),
                   display_name = COALESCE($2, display_name),
                   email = COALESCE($3, email),
                   verified = COALESCE($4, verified),
                   karma = COALESCE($5, karma),
                   role_id = COALESCE($6, role_id)
               WHERE id = $7 AND ($8::int IS NULL OR version = $8)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(&update.username)
        .bind(&update.display_name)
        .bind(&update.email)
        .bind(update.verified)
        .bind(update.karma)
        .bind(update.role_id)
        .bind(id)
        .bind(update.version)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_constraint(e, "user"))?;
        match row {
            Some(user) => Ok(user),
            None => Err(missed_update(self.pool(), r#""user".users"#, id, "user").await),
        }
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let result = sqlx::query(r#"UPDATE "user".users SET password = $1 WHERE id = $2"#)
            .bind(password_hash)
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn set_profile_key(&self, id: Uuid, key: &str) -> Result<()> {
        let result = sqlx::query(r#"UPDATE "user".users SET profile_pic_key = $1 WHERE id = $2"#)
            .bind(key)
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let mut tx = self.pool().begin().await?;
        let session_ids: Vec<Uuid> =
            sqlx::query_scalar(r#"SELECT id FROM "user".sessions WHERE user_id = $1"#)
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        let result = sqlx::query(r#"DELETE FROM "user".users WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("user {id}")));
        }
        tx.commit().await?;
        Ok(session_ids)
    }

    async fn insert_role(&self, name: &str) -> Result<Role> {
        sqlx::query_as(&format!(
            r#"INSERT INTO "user".roles (name) VALUES ($1) RETURNING {ROLE_COLUMNS}"#
        ))
        .bind(name)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_constraint(e, "role"))
    }

    async fn role_by_id(&self, id: Uuid) -> Result<Role> {
        sqlx::query_as(&format!(r#"SELECT {ROLE_COLUMNS} FROM "user".roles WHERE id = $1"#))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| HangarError::NotFound(format!("role {id}")))
    }

    async fn role_by_name(&self, name: &str) -> Result<Role> {
        sqlx::query_as(&format!(r#"SELECT {ROLE_COLUMNS} FROM "user".roles WHERE name = $1"#))
            .bind(name)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| HangarError::NotFound(format!("role {name}")))
    }

    async fn find_roles(&self, query: &SearchQuery) -> Result<Vec<Role>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!(r#"SELECT {ROLE_COLUMNS} FROM "user".roles"#));
        push_search(
            &mut builder,
            query,
            KeywordMatch::Exact("name"),
            &SortColumns::plain("name"),
            false,
        );
        Ok(builder.build_query_as().fetch_all(self.pool()).await?)
    }

    async fn update_role(&self, id: Uuid, update: &RoleUpdate) -> Result<Role> {
        let row: Option<Role> = sqlx::query_as(&format!(
            r#"UPDATE "user".roles SET name = COALESCE($1, name)
               WHERE id = $2 AND ($3::int IS NULL OR version = $3)
               RETURNING {ROLE_COLUMNS}"#
        ))
        .bind(&update.name)
        .bind(id)
        .bind(update.version)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_constraint(e, "role"))?;
        match row {
            Some(role) => Ok(role),
            None => Err(missed_update(self.pool(), r#""user".roles"#, id, "role").await),
        }
    }

    async fn delete_role(&self, id: Uuid) -> Result<Role> {
        sqlx::query_as(&format!(
            r#"DELETE FROM "user".roles WHERE id = $1 RETURNING {ROLE_COLUMNS}"#
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_constraint(e, "role"))?
        .ok_or_else(|| HangarError::NotFound(format!("role {id}")))
    }

    async fn insert_session(&self, user_id: Uuid) -> Result<Session> {
        sqlx::query_as(&format!(
            r#"INSERT INTO "user".sessions (user_id) VALUES ($1) RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_constraint(e, "session"))
    }

    async fn session_by_id(&self, id: Uuid) -> Result<Session> {
        sqlx::query_as(&format!(
            r#"SELECT {SESSION_COLUMNS} FROM "user".sessions WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| HangarError::NotFound(format!("session {id}")))
    }

    async fn sessions_of_user(&self, user_id: Uuid) -> Result<Vec<Session>> {
        Ok(sqlx::query_as(&format!(
            r#"SELECT {SESSION_COLUMNS} FROM "user".sessions WHERE user_id = $1 ORDER BY created_at"#
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?)
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM "user".sessions WHERE id = $1"#)
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("session {id}")));
        }
        Ok(())
    }

    async fn delete_sessions_of_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM "user".sessions WHERE user_id = $1"#)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
