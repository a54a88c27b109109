//! Permission tuples for Game Hangar.
//!
//! Permissions are `(subject, object, action)` tuples. A subject is a user id
//! or a role name, an object is an API path without the version prefix
//! (`demos`, `demos/7`, `logout/<session id>`), and an action is an HTTP
//! method or `POSTExtended`. Groupings `(member, parent)` let a role inherit
//! the tuples of another.

mod adapter;
mod engine;

pub use adapter::{PolicyAdapter, PolicySnapshot};
pub use engine::PolicyEngine;

use serde::Serialize;

/// Role that passes every check.
pub const SUPERUSER: &str = "admin";
/// Paying members.
pub const PAID_TIER: &str = "paidtier";
/// Default role for new users.
pub const FREE_TIER: &str = "freetier";
/// Extended upload permission on `demos`.
pub const POST_EXTENDED: &str = "POSTExtended";

/// A single permission tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Rule {
    /// User id or role name.
    pub subject: String,
    /// Object path.
    pub object: String,
    /// Action name.
    pub action: String,
}

impl Rule {
    /// Create a new rule.
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }
}

/// Role inheritance: `member` gets every tuple of `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Grouping {
    /// Inheriting role.
    pub member: String,
    /// Role inherited from.
    pub parent: String,
}

impl Grouping {
    /// Create a new grouping.
    pub fn new(member: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            parent: parent.into(),
        }
    }
}

/// Tuples every deployment starts with.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(FREE_TIER, "assets", "POST"),
        Rule::new(FREE_TIER, "demos", "POST"),
        Rule::new(FREE_TIER, "threads", "POST"),
        Rule::new(FREE_TIER, "messages", "POST"),
        Rule::new(PAID_TIER, "demos", POST_EXTENDED),
    ]
}

/// Groupings every deployment starts with.
pub fn default_groupings() -> Vec<Grouping> {
    vec![Grouping::new(PAID_TIER, FREE_TIER)]
}

/// Object path of a single resource, e.g. `demos/7`.
pub fn object_path(resource: &str, id: impl std::fmt::Display) -> String {
    format!("{resource}/{id}")
}

/// Object path guarding the logout of one session.
pub fn logout_object(session_id: impl std::fmt::Display) -> String {
    object_path("logout", session_id)
}

/// Strip the API prefix and surrounding slashes from a request path.
///
/// `/game-hangar/v1/demos/7/` becomes `demos/7`.
pub fn request_object<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix)
        .unwrap_or(path)
        .trim_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_paths() {
        assert_eq!(object_path("demos", 7), "demos/7");
        assert_eq!(logout_object("abc"), "logout/abc");
    }

    #[test]
    fn test_request_object() {
        assert_eq!(request_object("/game-hangar/v1/demos", "/game-hangar/v1"), "demos");
        assert_eq!(
            request_object("/game-hangar/v1/demos/7/", "/game-hangar/v1"),
            "demos/7"
        );
        assert_eq!(request_object("/other/path", "/game-hangar/v1"), "other/path");
    }

    #[test]
    fn test_default_rules() {
        let rules = default_rules();
        assert!(rules.contains(&Rule::new("freetier", "demos", "POST")));
        assert!(rules.contains(&Rule::new("paidtier", "demos", "POSTExtended")));
        assert_eq!(default_groupings(), vec![Grouping::new("paidtier", "freetier")]);
    }
}
