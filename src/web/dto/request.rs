//! Request DTOs for the Web API.
//!
//! Create bodies require the fields a new row cannot do without; update
//! bodies are sparse and every absent field is left untouched.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::validation::{no_control_chars, not_empty_trimmed, valid_tags};
use crate::asset::{AssetUpdate, NewAsset};
use crate::db::SearchQuery;
use crate::demo::{DemoUpdate, NewDemo};
use crate::forum::{MessageUpdate, NewMessage, NewThread, NewTopic, ThreadUpdate, TopicUpdate};
use crate::user::{RoleUpdate, UserUpdate};

/// `q`, `l` and `o` query parameters of every list endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Keywords separated by spaces or commas.
    pub q: Option<String>,
    /// Maximum number of results; 0 or absent means unlimited.
    pub l: Option<u64>,
    /// `highest-rated`, `newest-updated` or `most-views`.
    pub o: Option<String>,
}

impl ListQuery {
    /// Convert to a store search.
    pub fn to_search(&self) -> SearchQuery {
        SearchQuery::from_params(self.q.as_deref(), self.l, self.o.as_deref())
    }
}

// ============================================================================
// Assets
// ============================================================================

/// `metadata` part of an asset upload.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetRequest {
    #[validate(length(min = 1, max = 90), custom(function = "no_control_chars"))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
    /// Owner; defaults to the caller.
    #[serde(rename = "userID")]
    pub user_id: Option<Uuid>,
}

impl CreateAssetRequest {
    pub fn into_new(self, owner: Uuid) -> NewAsset {
        let mut asset = NewAsset::new(self.name, owner);
        asset.description = self.description;
        asset.tags = self.tags;
        asset
    }
}

/// `metadata` part of an asset update.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssetRequest {
    #[validate(length(min = 1, max = 90), custom(function = "no_control_chars"))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
    #[validate(range(min = 0))]
    pub upvotes: Option<i32>,
    #[validate(range(min = 0))]
    pub downvotes: Option<i32>,
    #[validate(required)]
    pub version: Option<i32>,
}

impl From<UpdateAssetRequest> for AssetUpdate {
    fn from(req: UpdateAssetRequest) -> Self {
        AssetUpdate {
            name: req.name,
            description: req.description,
            tags: req.tags,
            upvotes: req.upvotes,
            downvotes: req.downvotes,
            version: req.version,
        }
    }
}

// ============================================================================
// Demos
// ============================================================================

/// Demo creation request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDemoRequest {
    #[validate(length(min = 1, max = 90), custom(function = "no_control_chars"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(url)]
    pub link: String,
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "userID")]
    pub user_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub upvotes: Option<i32>,
    #[validate(range(min = 0))]
    pub downvotes: Option<i32>,
}

impl CreateDemoRequest {
    pub fn into_new(self, owner: Uuid) -> NewDemo {
        let mut demo = NewDemo::new(self.title, self.link, owner);
        demo.description = self.description;
        demo.tags = self.tags;
        demo.upvotes = self.upvotes.unwrap_or(0);
        demo.downvotes = self.downvotes.unwrap_or(0);
        demo
    }
}

/// Demo update request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDemoRequest {
    #[validate(length(min = 1, max = 90), custom(function = "no_control_chars"))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(url)]
    pub link: Option<String>,
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
    #[validate(range(min = 0))]
    pub upvotes: Option<i32>,
    #[validate(range(min = 0))]
    pub downvotes: Option<i32>,
    pub version: Option<i32>,
}

impl From<UpdateDemoRequest> for DemoUpdate {
    fn from(req: UpdateDemoRequest) -> Self {
        DemoUpdate {
            title: req.title,
            description: req.description,
            link: req.link,
            tags: req.tags,
            upvotes: req.upvotes,
            downvotes: req.downvotes,
            version: req.version,
        }
    }
}

// ============================================================================
// Forum
// ============================================================================

/// Topic creation request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 90), custom(function = "not_empty_trimmed"))]
    pub name: String,
}

impl From<CreateTopicRequest> for NewTopic {
    fn from(req: CreateTopicRequest) -> Self {
        NewTopic::new(req.name)
    }
}

/// Topic rename request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTopicRequest {
    #[validate(length(min = 1, max = 90), custom(function = "not_empty_trimmed"))]
    pub name: Option<String>,
    #[validate(required)]
    pub version: Option<i32>,
}

impl From<UpdateTopicRequest> for TopicUpdate {
    fn from(req: UpdateTopicRequest) -> Self {
        TopicUpdate {
            name: req.name,
            version: req.version,
        }
    }
}

/// Thread creation request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadRequest {
    #[validate(length(min = 1, max = 90), custom(function = "no_control_chars"))]
    pub title: String,
    #[serde(rename = "topicID")]
    pub topic_id: i64,
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "userID")]
    pub user_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub upvotes: Option<i32>,
    #[validate(range(min = 0))]
    pub downvotes: Option<i32>,
}

impl CreateThreadRequest {
    pub fn into_new(self, owner: Uuid) -> NewThread {
        NewThread::new(self.title, owner, self.topic_id)
            .with_tags(self.tags)
            .with_votes(self.upvotes.unwrap_or(0), self.downvotes.unwrap_or(0))
    }
}

/// Thread update request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateThreadRequest {
    #[validate(length(min = 1, max = 90), custom(function = "no_control_chars"))]
    pub title: Option<String>,
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
    #[validate(range(min = 0))]
    pub upvotes: Option<i32>,
    #[validate(range(min = 0))]
    pub downvotes: Option<i32>,
    pub version: Option<i32>,
}

impl From<UpdateThreadRequest> for ThreadUpdate {
    fn from(req: UpdateThreadRequest) -> Self {
        ThreadUpdate {
            title: req.title,
            tags: req.tags,
            upvotes: req.upvotes,
            downvotes: req.downvotes,
            version: req.version,
        }
    }
}

/// Message creation request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMessageRequest {
    #[serde(rename = "threadID")]
    pub thread_id: i64,
    #[validate(length(min = 1, max = 90), custom(function = "no_control_chars"))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub body: Option<String>,
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "userID")]
    pub user_id: Option<Uuid>,
}

impl CreateMessageRequest {
    pub fn into_new(self, owner: Uuid) -> NewMessage {
        let mut message = NewMessage::new(self.thread_id, owner, self.title);
        message.body = self.body;
        message.tags = self.tags;
        message
    }
}

/// Message update request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMessageRequest {
    #[validate(length(min = 1, max = 90), custom(function = "no_control_chars"))]
    pub title: Option<String>,
    #[validate(length(max = 10000))]
    pub body: Option<String>,
    #[validate(custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
    #[validate(range(min = 0))]
    pub upvotes: Option<i32>,
    #[validate(range(min = 0))]
    pub downvotes: Option<i32>,
    pub version: Option<i32>,
}

impl From<UpdateMessageRequest> for MessageUpdate {
    fn from(req: UpdateMessageRequest) -> Self {
        MessageUpdate {
            title: req.title,
            body: req.body,
            tags: req.tags,
            upvotes: req.upvotes,
            downvotes: req.downvotes,
            version: req.version,
        }
    }
}

// ============================================================================
// Users and roles
// ============================================================================

/// Account registration request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255), custom(function = "no_control_chars"))]
    pub username: String,
    #[validate(length(max = 255))]
    pub display_name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: String,
    pub password: String,
}

/// Login request; either `email` or `username` identifies the account.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    #[validate(length(min = 1))]
    pub password: String,
}

/// User update request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255), custom(function = "no_control_chars"))]
    pub username: Option<String>,
    #[validate(length(max = 255))]
    pub display_name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    /// Administrators only.
    pub karma: Option<i32>,
    /// Administrators only.
    #[serde(rename = "roleID")]
    pub role_id: Option<Uuid>,
    pub version: Option<i32>,
}

impl UpdateUserRequest {
    /// True when the request touches fields only an administrator may set.
    pub fn is_privileged(&self) -> bool {
        self.karma.is_some() || self.role_id.is_some()
    }
}

impl From<UpdateUserRequest> for UserUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        UserUpdate {
            username: req.username,
            display_name: req.display_name,
            email: req.email,
            verified: None,
            karma: req.karma,
            role_id: req.role_id,
            version: req.version,
        }
    }
}

/// Role creation request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_empty_trimmed"))]
    pub name: String,
}

/// Role rename request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 255), custom(function = "not_empty_trimmed"))]
    pub name: Option<String>,
    #[validate(required)]
    pub version: Option<i32>,
}

impl From<UpdateRoleRequest> for RoleUpdate {
    fn from(req: UpdateRoleRequest) -> Self {
        RoleUpdate {
            name: req.name,
            version: req.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_request_rules() {
        let ok: CreateDemoRequest = serde_json::from_str(
            r#"{"title":"Space Race","link":"https://example.com/space","tags":["arcade"]}"#,
        )
        .unwrap();
        assert!(ok.validate().is_ok());

        let bad_link: CreateDemoRequest =
            serde_json::from_str(r#"{"title":"Space Race","link":"not a link"}"#).unwrap();
        assert!(bad_link.validate().is_err());

        let long_title = format!(r#"{{"title":"{}","link":"https://e.com"}}"#, "x".repeat(91));
        let long: CreateDemoRequest = serde_json::from_str(&long_title).unwrap();
        let errors = long.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn test_duplicate_tags_rejected() {
        let req: CreateThreadRequest =
            serde_json::from_str(r#"{"title":"t","topicID":2,"tags":["a","A"]}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_version_required_for_topic_and_role() {
        let topic: UpdateTopicRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(topic.validate().is_err());
        let role: UpdateRoleRequest = serde_json::from_str(r#"{"name":"x","version":1}"#).unwrap();
        assert!(role.validate().is_ok());
    }

    #[test]
    fn test_negative_votes_rejected() {
        let req: UpdateMessageRequest = serde_json::from_str(r#"{"upvotes":-1}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_privileged_user_fields() {
        let plain: UpdateUserRequest = serde_json::from_str(r#"{"displayName":"Ann"}"#).unwrap();
        assert!(!plain.is_privileged());
        let karma: UpdateUserRequest = serde_json::from_str(r#"{"karma":9000}"#).unwrap();
        assert!(karma.is_privileged());
    }

    #[test]
    fn test_list_query_conversion() {
        let query = ListQuery {
            q: Some("rpg, retro".to_string()),
            l: Some(5),
            o: Some("most-views".to_string()),
        };
        let search = query.to_search();
        assert_eq!(search.keywords, vec!["rpg", "retro"]);
        assert_eq!(search.limit, 5);
    }

    #[test]
    fn test_user_id_field_name() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"threadID":3,"title":"hi","userID":"{id}"}}"#);
        let req: CreateMessageRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.user_id, Some(id));
        assert_eq!(req.into_new(id).thread_id, 3);
    }
}
