//! Forum repository.
//!
//! Wraps the forum store and keeps owner permissions of threads and
//! messages in step with their rows, including rows removed by cascade.

use std::sync::Arc;

use tracing::warn;

use super::message::{Message, MessageUpdate, NewMessage};
use super::store::ForumStore;
use super::thread::{NewThread, Thread, ThreadUpdate};
use super::topic::{NewTopic, Topic, TopicUpdate, DEMO_TOPIC_ID};
use crate::db::SearchQuery;
use crate::policy::{object_path, PolicyEngine};
use crate::{HangarError, Result};

const THREADS: &str = "threads";
const MESSAGES: &str = "messages";

/// Repository for topics, threads and messages.
#[derive(Clone)]
pub struct ForumRepository {
    store: Arc<dyn ForumStore>,
    policy: Arc<PolicyEngine>,
}

impl ForumRepository {
    /// Create a new ForumRepository.
    pub fn new(store: Arc<dyn ForumStore>, policy: Arc<PolicyEngine>) -> Self {
        Self { store, policy }
    }

    // ------------------------------------------------------------------
    // Topics
    // ------------------------------------------------------------------

    /// Create a topic.
    pub async fn create_topic(&self, new_topic: &NewTopic) -> Result<Topic> {
        self.store.insert_topic(new_topic).await
    }

    /// Get a topic by ID.
    pub async fn find_topic(&self, id: i64) -> Result<Topic> {
        self.store.topic_by_id(id).await
    }

    /// Search topics.
    pub async fn find_topics(&self, query: &SearchQuery) -> Result<Vec<Topic>> {
        self.store.find_topics(query).await
    }

    /// Versioned topic update.
    pub async fn update_topic(&self, id: i64, update: &TopicUpdate) -> Result<Topic> {
        if update.is_empty() {
            return Err(HangarError::Validation("nothing to update".to_string()));
        }
        self.store.update_topic(id, update).await
    }

    /// Delete a topic together with its threads and messages.
    ///
    /// The demo topic cannot be deleted; its threads belong to demos.
    pub async fn delete_topic(&self, id: i64) -> Result<()> {
        if id == DEMO_TOPIC_ID {
            return Err(HangarError::Validation(
                "the demo topic cannot be deleted".to_string(),
            ));
        }
        let removed = self.store.delete_topic(id).await?;
        for thread_id in removed.thread_ids {
            self.drop_permissions(THREADS, thread_id).await?;
        }
        for message_id in removed.message_ids {
            self.drop_permissions(MESSAGES, message_id).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    /// Create a thread and grant its author PATCH and DELETE.
    ///
    /// Threads of the demo topic are created with their demo only.
    pub async fn create_thread(&self, new_thread: &NewThread) -> Result<Thread> {
        if new_thread.topic_id == DEMO_TOPIC_ID {
            return Err(HangarError::Validation(
                "demo threads are created by publishing a demo".to_string(),
            ));
        }
        self.insert_thread(new_thread).await
    }

    /// Create a thread in any topic.
    ///
    /// The row is deleted again when its author cannot be granted access.
    pub(crate) async fn insert_thread(&self, new_thread: &NewThread) -> Result<Thread> {
        let thread = self.store.insert_thread(new_thread).await?;
        let granted = self
            .grant_owner(THREADS, thread.id, &thread.user_id.to_string())
            .await;
        if let Err(e) = granted {
            if let Err(cleanup) = self.store.delete_thread(thread.id).await {
                warn!(thread_id = thread.id, "Ungranted thread left behind: {}", cleanup);
            }
            return Err(e);
        }
        Ok(thread)
    }

    /// Get a thread by ID, counting a view.
    pub async fn find_thread(&self, id: i64) -> Result<Thread> {
        self.store.thread_by_id(id, true).await
    }

    /// Get a thread by ID without counting a view.
    pub async fn get_thread(&self, id: i64) -> Result<Thread> {
        self.store.thread_by_id(id, false).await
    }

    /// Search threads.
    pub async fn find_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        self.store.find_threads(query).await
    }

    /// Versioned thread update.
    pub async fn update_thread(&self, id: i64, update: &ThreadUpdate) -> Result<Thread> {
        if update.is_empty() {
            return Err(HangarError::Validation("nothing to update".to_string()));
        }
        self.store.update_thread(id, update).await
    }

    /// Delete a thread and its messages.
    ///
    /// Threads of the demo topic go away with their demo only.
    pub async fn delete_thread(&self, id: i64) -> Result<()> {
        let thread = self.store.thread_by_id(id, false).await?;
        if thread.topic_id == DEMO_TOPIC_ID {
            return Err(HangarError::Validation(format!(
                "thread {id} belongs to a demo; delete the demo instead"
            )));
        }
        self.remove_thread(id).await
    }

    /// Delete a thread and its messages whatever its topic.
    pub(crate) async fn remove_thread(&self, id: i64) -> Result<()> {
        let message_ids = self.store.delete_thread(id).await?;
        self.drop_permissions(THREADS, id).await?;
        for message_id in message_ids {
            self.drop_permissions(MESSAGES, message_id).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Create a message and grant its author PATCH and DELETE.
    pub async fn create_message(&self, new_message: &NewMessage) -> Result<Message> {
        let message = self.store.insert_message(new_message).await?;
        let granted = self
            .grant_owner(MESSAGES, message.id, &message.user_id.to_string())
            .await;
        if let Err(e) = granted {
            if let Err(cleanup) = self.store.delete_message(message.id).await {
                warn!(message_id = message.id, "Ungranted message left behind: {}", cleanup);
            }
            return Err(e);
        }
        Ok(message)
    }

    /// Get a message by ID, counting a view.
    pub async fn find_message(&self, id: i64) -> Result<Message> {
        self.store.message_by_id(id, true).await
    }

    /// Search messages.
    pub async fn find_messages(&self, query: &SearchQuery) -> Result<Vec<Message>> {
        self.store.find_messages(query).await
    }

    /// Search the messages of a thread. Fails if the thread does not exist.
    pub async fn messages_by_thread(
        &self,
        thread_id: i64,
        query: &SearchQuery,
    ) -> Result<Vec<Message>> {
        self.store.thread_by_id(thread_id, false).await?;
        self.store.messages_by_thread(thread_id, query).await
    }

    /// Versioned message update.
    pub async fn update_message(&self, id: i64, update: &MessageUpdate) -> Result<Message> {
        if update.is_empty() {
            return Err(HangarError::Validation("nothing to update".to_string()));
        }
        self.store.update_message(id, update).await
    }

    /// Delete a message.
    pub async fn delete_message(&self, id: i64) -> Result<()> {
        self.store.delete_message(id).await?;
        self.drop_permissions(MESSAGES, id).await
    }

    async fn grant_owner(&self, resource: &str, id: i64, owner: &str) -> Result<()> {
        self.policy
            .grant_owner(owner, &object_path(resource, id))
            .await
    }

    async fn drop_permissions(&self, resource: &str, id: i64) -> Result<()> {
        self.policy
            .remove_all_for_object(&object_path(resource, id), None)
            .await?;
        Ok(())
    }
}
