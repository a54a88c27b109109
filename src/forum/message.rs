//! Message model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A post inside a thread.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID.
    pub id: i64,
    /// Thread the message belongs to.
    #[serde(rename = "threadID")]
    pub thread_id: i64,
    /// Author.
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    /// Title.
    pub title: String,
    /// Body text.
    pub body: Option<String>,
    /// Tags.
    pub tags: Option<Vec<String>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Upvotes.
    pub upvotes: i32,
    /// Downvotes.
    pub downvotes: i32,
    /// View count.
    pub views: i32,
    /// `upvotes - downvotes`.
    pub rating: i32,
    /// Optimistic-concurrency version.
    pub version: i32,
}

/// Data for creating a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Thread.
    pub thread_id: i64,
    /// Author.
    pub user_id: Uuid,
    /// Title.
    pub title: String,
    /// Body.
    pub body: Option<String>,
    /// Tags.
    pub tags: Option<Vec<String>>,
}

impl NewMessage {
    /// Create a new message with minimal required fields.
    pub fn new(thread_id: i64, user_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            thread_id,
            user_id,
            title: title.into(),
            body: None,
            tags: None,
        }
    }
}

/// Partial update of a message.
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub body: Option<String>,
    /// New tags.
    pub tags: Option<Vec<String>>,
    /// New upvote count.
    pub upvotes: Option<i32>,
    /// New downvote count.
    pub downvotes: Option<i32>,
    /// Version the client last saw, if any.
    pub version: Option<i32>,
}

impl MessageUpdate {
    /// True when no column would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.tags.is_none()
            && self.upvotes.is_none()
            && self.downvotes.is_none()
    }
}
