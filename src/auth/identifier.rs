//! Session cookie resolution.

use uuid::Uuid;

use crate::policy::{PolicyEngine, FREE_TIER, PAID_TIER, POST_EXTENDED, SUPERUSER};
use crate::user::UserRepository;
use crate::Result;

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Logged-in user.
    pub user_id: Uuid,
    /// Session the request came with.
    pub session_id: Uuid,
    /// Role name of the user.
    pub role: String,
}

impl AuthContext {
    /// True for the superuser role.
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case(SUPERUSER)
    }

    /// Policy subject of the user.
    pub fn subject(&self) -> String {
        self.user_id.to_string()
    }

    /// Check a permission for the user or its role.
    pub async fn can(&self, policy: &PolicyEngine, object: &str, action: &str) -> bool {
        policy.enforce(&self.subject(), object, action).await
            || policy.enforce(&self.role, object, action).await
    }

    /// Upload tier that caps the files of this user.
    pub async fn upload_tier(&self, policy: &PolicyEngine) -> &'static str {
        if self.is_admin() {
            SUPERUSER
        } else if self.can(policy, "demos", POST_EXTENDED).await {
            PAID_TIER
        } else {
            FREE_TIER
        }
    }
}

/// Resolves a session ID to the user behind it.
#[derive(Clone)]
pub struct UserIdentifier {
    users: UserRepository,
}

impl UserIdentifier {
    /// Create a new UserIdentifier.
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    /// Look up the session, its user and the user's role.
    pub async fn identify(&self, session_id: Uuid) -> Result<AuthContext> {
        let session = self.users.find_session(session_id).await?;
        let user = self.users.get_user(session.user_id).await?;
        let role = self.users.find_role(user.role_id).await?;
        Ok(AuthContext {
            user_id: user.id,
            session_id: session.id,
            role: role.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: &str) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role: role.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upload_tiers() {
        let policy = PolicyEngine::in_memory();
        assert_eq!(context("admin").upload_tier(&policy).await, "admin");
        assert_eq!(context("paidtier").upload_tier(&policy).await, "paidtier");
        assert_eq!(context("freetier").upload_tier(&policy).await, "freetier");
        assert_eq!(context("unknown").upload_tier(&policy).await, "freetier");
    }

    #[tokio::test]
    async fn test_user_grant_lifts_tier() {
        let policy = PolicyEngine::in_memory();
        let ctx = context("freetier");
        policy
            .add(&ctx.subject(), "demos", POST_EXTENDED)
            .await
            .unwrap();
        assert_eq!(ctx.upload_tier(&policy).await, "paidtier");
    }

    #[tokio::test]
    async fn test_can_checks_user_and_role() {
        let policy = PolicyEngine::in_memory();
        let ctx = context("freetier");
        assert!(ctx.can(&policy, "demos", "POST").await);
        assert!(!ctx.can(&policy, "demos/1", "PATCH").await);
        policy.add(&ctx.subject(), "demos/1", "PATCH").await.unwrap();
        assert!(ctx.can(&policy, "demos/1", "PATCH").await);
    }
}
