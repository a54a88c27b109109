//! Forum storage.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::message::{Message, MessageUpdate, NewMessage};
use super::thread::{NewThread, Thread, ThreadUpdate};
use super::topic::{NewTopic, Topic, TopicUpdate};
use crate::db::{map_constraint, missed_update, push_search, Database, KeywordMatch, SearchQuery, SortColumns};
use crate::{HangarError, Result};

const TOPIC_COLUMNS: &str = "id, name, version";
const THREAD_COLUMNS: &str = "id, title, user_id, topic_id, tags, created_at, updated_at, \
                              upvotes, downvotes, views, rating, version";
const MESSAGE_COLUMNS: &str = "id, thread_id, user_id, title, body, tags, created_at, \
                               updated_at, upvotes, downvotes, views, rating, version";

/// Rows removed together with a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicRemoval {
    /// Threads of the topic.
    pub thread_ids: Vec<i64>,
    /// Messages of those threads.
    pub message_ids: Vec<i64>,
}

/// Persistence of topics, threads and messages.
///
/// Deleting a topic removes its threads, and deleting a thread removes its
/// messages. The delete calls report the IDs of the rows removed that way.
#[async_trait]
pub trait ForumStore: Send + Sync {
    /// Insert a topic.
    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic>;
    /// Fetch a topic.
    async fn topic_by_id(&self, id: i64) -> Result<Topic>;
    /// Search topics by name.
    async fn find_topics(&self, query: &SearchQuery) -> Result<Vec<Topic>>;
    /// Versioned topic update.
    async fn update_topic(&self, id: i64, update: &TopicUpdate) -> Result<Topic>;
    /// Delete a topic with its threads and messages.
    async fn delete_topic(&self, id: i64) -> Result<TopicRemoval>;

    /// Insert a thread.
    async fn insert_thread(&self, thread: &NewThread) -> Result<Thread>;
    /// Fetch a thread, counting a view when `count_view` is set.
    async fn thread_by_id(&self, id: i64, count_view: bool) -> Result<Thread>;
    /// Search threads.
    async fn find_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>>;
    /// Versioned thread update.
    async fn update_thread(&self, id: i64, update: &ThreadUpdate) -> Result<Thread>;
    /// Delete a thread and return the IDs of its messages.
    async fn delete_thread(&self, id: i64) -> Result<Vec<i64>>;

    /// Insert a message.
    async fn insert_message(&self, message: &NewMessage) -> Result<Message>;
    /// Fetch a message, counting a view when `count_view` is set.
    async fn message_by_id(&self, id: i64, count_view: bool) -> Result<Message>;
    /// Search messages.
    async fn find_messages(&self, query: &SearchQuery) -> Result<Vec<Message>>;
    /// Search the messages of one thread.
    async fn messages_by_thread(&self, thread_id: i64, query: &SearchQuery) -> Result<Vec<Message>>;
    /// Versioned message update.
    async fn update_message(&self, id: i64, update: &MessageUpdate) -> Result<Message>;
    /// Delete a message.
    async fn delete_message(&self, id: i64) -> Result<()>;
}

#[async_trait]
impl ForumStore for Database {
    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic> {
        sqlx::query_as(&format!(
            "INSERT INTO forum.topics (name) VALUES ($1) RETURNING {TOPIC_COLUMNS}"
        ))
        .bind(&topic.name)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_constraint(e, "topic"))
    }

    async fn topic_by_id(&self, id: i64) -> Result<Topic> {
        sqlx::query_as(&format!("SELECT {TOPIC_COLUMNS} FROM forum.topics WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| HangarError::NotFound(format!("topic {id}")))
    }

    async fn find_topics(&self, query: &SearchQuery) -> Result<Vec<Topic>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {TOPIC_COLUMNS} FROM forum.topics"));
        push_search(
            &mut builder,
            query,
            KeywordMatch::AnyOf("name"),
            &SortColumns::plain("id"),
            false,
        );
        Ok(builder.build_query_as().fetch_all(self.pool()).await?)
    }

    async fn update_topic(&self, id: i64, update: &TopicUpdate) -> Result<Topic> {
        let row: Option<Topic> = sqlx::query_as(&format!(
            "UPDATE forum.topics SET name = COALESCE($1, name)
             WHERE id = $2 AND ($3::int IS NULL OR version = $3)
             RETURNING {TOPIC_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(id)
        .bind(update.version)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_constraint(e, "topic"))?;
        match row {
            Some(topic) => Ok(topic),
            None => Err(missed_update(self.pool(), "forum.topics", id, "topic").await),
        }
    }

    async fn delete_topic(&self, id: i64) -> Result<TopicRemoval> {
        let mut tx = self.pool().begin().await?;
        let thread_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM forum.threads WHERE topic_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        let message_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM forum.messages WHERE thread_id = ANY($1) ORDER BY id",
        )
        .bind(&thread_ids)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM forum.topics WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("topic {id}")));
        }
        tx.commit().await?;

        Ok(TopicRemoval {
            thread_ids,
            message_ids,
        })
    }

    async fn insert_thread(&self, thread: &NewThread) -> Result<Thread> {
        sqlx::query_as(&format!(
            "INSERT INTO forum.threads (title, user_id, topic_id, tags, upvotes, downvotes)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {THREAD_COLUMNS}"
        ))
        .bind(&thread.title)
        .bind(thread.user_id)
        .bind(thread.topic_id)
        .bind(&thread.tags)
        .bind(thread.upvotes)
        .bind(thread.downvotes)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_constraint(e, "thread"))
    }

    async fn thread_by_id(&self, id: i64, count_view: bool) -> Result<Thread> {
        let sql = if count_view {
            format!(
                "UPDATE forum.threads SET views = views + 1 WHERE id = $1 RETURNING {THREAD_COLUMNS}"
            )
        } else {
            format!("SELECT {THREAD_COLUMNS} FROM forum.threads WHERE id = $1")
        };
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| HangarError::NotFound(format!("thread {id}")))
    }

    async fn find_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {THREAD_COLUMNS} FROM forum.threads"));
        push_search(
            &mut builder,
            query,
            KeywordMatch::Tags("tags"),
            &SortColumns::COUNTED,
            false,
        );
        Ok(builder.build_query_as().fetch_all(self.pool()).await?)
    }

    async fn update_thread(&self, id: i64, update: &ThreadUpdate) -> Result<Thread> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE forum.threads SET updated_at = NOW()");
        if let Some(title) = &update.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(tags) = &update.tags {
            builder.push(", tags = ").push_bind(tags);
        }
        if let Some(upvotes) = update.upvotes {
            builder.push(", upvotes = ").push_bind(upvotes);
        }
        if let Some(downvotes) = update.downvotes {
            builder.push(", downvotes = ").push_bind(downvotes);
        }
        builder.push(" WHERE id = ").push_bind(id);
        if let Some(version) = update.version {
            builder.push(" AND version = ").push_bind(version);
        }
        builder.push(format!(" RETURNING {THREAD_COLUMNS}"));

        let row: Option<Thread> = builder
            .build_query_as()
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_constraint(e, "thread"))?;
        match row {
            Some(thread) => Ok(thread),
            None => Err(missed_update(self.pool(), "forum.threads", id, "thread").await),
        }
    }

    async fn delete_thread(&self, id: i64) -> Result<Vec<i64>> {
        let mut tx = self.pool().begin().await?;
        let message_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM forum.messages WHERE thread_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        let result = sqlx::query("DELETE FROM forum.threads WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("thread {id}")));
        }
        tx.commit().await?;
        Ok(message_ids)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        sqlx::query_as(&format!(
            "INSERT INTO forum.messages (thread_id, user_id, title, body, tags)
             VALUES ($1, $2, $3, $4, $5) RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message.thread_id)
        .bind(message.user_id)
        .bind(&message.title)
        .bind(&message.body)
        .bind(&message.tags)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_constraint(e, "message"))
    }

    async fn message_by_id(&self, id: i64, count_view: bool) -> Result<Message> {
        let sql = if count_view {
            format!(
                "UPDATE forum.messages SET views = views + 1 WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
            )
        } else {
            format!("SELECT {MESSAGE_COLUMNS} FROM forum.messages WHERE id = $1")
        };
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| HangarError::NotFound(format!("message {id}")))
    }

    async fn find_messages(&self, query: &SearchQuery) -> Result<Vec<Message>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MESSAGE_COLUMNS} FROM forum.messages"));
        push_search(
            &mut builder,
            query,
            KeywordMatch::Tags("tags"),
            &SortColumns::COUNTED,
            false,
        );
        Ok(builder.build_query_as().fetch_all(self.pool()).await?)
    }

    async fn messages_by_thread(&self, thread_id: i64, query: &SearchQuery) -> Result<Vec<Message>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {MESSAGE_COLUMNS} FROM forum.messages WHERE thread_id = "
        ));
        builder.push_bind(thread_id);
        push_search(
            &mut builder,
            query,
            KeywordMatch::Tags("tags"),
            &SortColumns::COUNTED,
            true,
        );
        Ok(builder.build_query_as().fetch_all(self.pool()).await?)
    }

    async fn update_message(&self, id: i64, update: &MessageUpdate) -> Result<Message> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE forum.messages SET updated_at = NOW()");
        if let Some(title) = &update.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(body) = &update.body {
            builder.push(", body = ").push_bind(body);
        }
        if let Some(tags) = &update.tags {
            builder.push(", tags = ").push_bind(tags);
        }
        if let Some(upvotes) = update.upvotes {
            builder.push(", upvotes = ").push_bind(upvotes);
        }
        if let Some(downvotes) = update.downvotes {
            builder.push(", downvotes = ").push_bind(downvotes);
        }
        builder.push(" WHERE id = ").push_bind(id);
        if let Some(version) = update.version {
            builder.push(" AND version = ").push_bind(version);
        }
        builder.push(format!(" RETURNING {MESSAGE_COLUMNS}"));

        let row: Option<Message> = builder
            .build_query_as()
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_constraint(e, "message"))?;
        match row {
            Some(message) => Ok(message),
            None => Err(missed_update(self.pool(), "forum.messages", id, "message").await),
        }
    }

    async fn delete_message(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM forum.messages WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(HangarError::NotFound(format!("message {id}")));
        }
        Ok(())
    }
}
