//! Topic model.

use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// ID of the topic that holds demo threads.
pub const DEMO_TOPIC_ID: i64 = 1;

/// A forum partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct Topic {
    /// Topic ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Optimistic-concurrency version.
    pub version: i32,
}

/// Data for creating a topic.
#[derive(Debug, Clone)]
pub struct NewTopic {
    /// Display name.
    pub name: String,
}

impl NewTopic {
    /// Create a new topic.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Partial update of a topic.
#[derive(Debug, Clone, Default)]
pub struct TopicUpdate {
    /// New name.
    pub name: Option<String>,
    /// Version the client last saw.
    pub version: Option<i32>,
}

impl TopicUpdate {
    /// True when no column would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}
