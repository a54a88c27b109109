//! Keeps every demo paired with its forum thread.
//!
//! The demo row and the thread row live in different schemas and are written
//! by separate statements. The syncer orders the writes so a demo never
//! points at a missing thread, and undoes a fresh thread when the demo that
//! needed it cannot be stored.

use tracing::{info, warn};

use crate::demo::{Demo, DemoRepository, DemoUpdate, NewDemo};
use crate::forum::{ForumRepository, NewThread, ThreadUpdate, DEMO_TOPIC_ID};
use crate::Result;

/// Orchestrates demo and thread writes.
#[derive(Clone)]
pub struct ThreadSyncer {
    demos: DemoRepository,
    forum: ForumRepository,
}

/// The thread-visible part of a demo update.
fn thread_projection(update: &DemoUpdate) -> ThreadUpdate {
    ThreadUpdate {
        title: update.title.clone(),
        tags: update.tags.clone(),
        upvotes: update.upvotes,
        downvotes: update.downvotes,
        version: None,
    }
}

impl ThreadSyncer {
    /// Create a new ThreadSyncer.
    pub fn new(demos: DemoRepository, forum: ForumRepository) -> Self {
        Self { demos, forum }
    }

    /// Create the thread of a demo that is about to be stored.
    ///
    /// Returns the thread ID to stamp into the demo.
    pub async fn post_thread(&self, demo: &NewDemo) -> Result<i64> {
        let thread = NewThread::new(demo.title.clone(), demo.user_id, DEMO_TOPIC_ID)
            .with_tags(demo.tags.clone())
            .with_votes(demo.upvotes, demo.downvotes);
        let thread = self.forum.insert_thread(&thread).await?;
        Ok(thread.id)
    }

    /// Mirror a demo update onto the thread of demo `demo_id`.
    ///
    /// Updates that touch nothing the thread shows are skipped.
    pub async fn patch_thread(&self, demo_id: i64, update: &DemoUpdate) -> Result<()> {
        let demo = self.demos.get(demo_id).await?;
        self.patch_linked_thread(demo.thread_id, update).await
    }

    async fn patch_linked_thread(&self, thread_id: i64, update: &DemoUpdate) -> Result<()> {
        let projection = thread_projection(update);
        if projection.is_empty() {
            return Ok(());
        }
        self.forum.update_thread(thread_id, &projection).await?;
        Ok(())
    }

    /// Publish a demo: create its thread, then the demo row.
    ///
    /// If the demo cannot be stored, the new thread is deleted again before
    /// the error is returned. A failing compensation is logged, not raised.
    pub async fn publish_demo(&self, new_demo: NewDemo) -> Result<Demo> {
        let thread_id = self.post_thread(&new_demo).await?;
        let new_demo = new_demo.with_thread(thread_id);

        match self.demos.create(&new_demo).await {
            Ok(demo) => {
                info!(demo_id = demo.id, thread_id, "Published demo");
                Ok(demo)
            }
            Err(e) => {
                if let Err(cleanup) = self.forum.remove_thread(thread_id).await {
                    warn!(thread_id, "Orphan demo thread left behind: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Update a demo, then its thread.
    pub async fn update_demo(&self, id: i64, update: &DemoUpdate) -> Result<Demo> {
        let demo = self.demos.update(id, update).await?;
        self.patch_linked_thread(demo.thread_id, update).await?;
        Ok(demo)
    }

    /// Delete the thread of a demo, then the demo.
    ///
    /// A thread that is already gone counts as deleted, so a failed delete
    /// can simply be retried.
    pub async fn remove_demo(&self, id: i64) -> Result<()> {
        let demo = self.demos.get(id).await?;
        match self.forum.remove_thread(demo.thread_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(demo_id = id, thread_id = demo.thread_id, "Demo thread was already gone");
            }
            Err(e) => return Err(e),
        }
        self.demos.delete(id).await?;
        info!(demo_id = id, "Removed demo");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::db::SearchQuery;
    use crate::demo::DemoStore;
    use crate::forum::NewMessage;
    use crate::policy::{object_path, Grouping, PolicyAdapter, PolicySnapshot, Rule};
    use crate::{HangarError, MemoryStore, PolicyEngine};

    fn syncer() -> (ThreadSyncer, ForumRepository) {
        let store = Arc::new(MemoryStore::new());
        let policy = Arc::new(PolicyEngine::in_memory());
        let demos = DemoRepository::new(store.clone(), policy.clone());
        let forum = ForumRepository::new(store, policy);
        (ThreadSyncer::new(demos, forum.clone()), forum)
    }

    fn outage() -> HangarError {
        HangarError::Upstream("policy store down".to_string())
    }

    /// Policy storage that refuses new tuples on objects under `prefix`.
    struct RefusingPolicy {
        inner: MemoryStore,
        prefix: &'static str,
    }

    #[async_trait]
    impl PolicyAdapter for RefusingPolicy {
        async fn load(&self) -> Result<PolicySnapshot> {
            self.inner.load().await
        }

        async fn add_rule(&self, rule: &Rule) -> Result<bool> {
            if rule.object.starts_with(self.prefix) {
                return Err(outage());
            }
            self.inner.add_rule(rule).await
        }

        async fn remove_rule(&self, rule: &Rule) -> Result<bool> {
            self.inner.remove_rule(rule).await
        }

        async fn remove_object(&self, object: &str, action: Option<&str>) -> Result<u64> {
            self.inner.remove_object(object, action).await
        }

        async fn remove_subject(&self, subject: &str) -> Result<u64> {
            self.inner.remove_subject(subject).await
        }

        async fn add_grouping(&self, grouping: &Grouping) -> Result<bool> {
            self.inner.add_grouping(grouping).await
        }
    }

    /// Demo storage whose inserts always fail.
    struct BrokenDemos(Arc<MemoryStore>);

    #[async_trait]
    impl DemoStore for BrokenDemos {
        async fn insert_demo(&self, _demo: &NewDemo) -> Result<Demo> {
            Err(HangarError::Database("connection reset".to_string()))
        }

        async fn demo_by_id(&self, id: i64, count_view: bool) -> Result<Demo> {
            self.0.demo_by_id(id, count_view).await
        }

        async fn find_demos(&self, query: &SearchQuery) -> Result<Vec<Demo>> {
            self.0.find_demos(query).await
        }

        async fn update_demo(&self, id: i64, update: &DemoUpdate) -> Result<Demo> {
            self.0.update_demo(id, update).await
        }

        async fn delete_demo(&self, id: i64) -> Result<()> {
            self.0.delete_demo(id).await
        }
    }

    async fn refusing_syncer(
        prefix: &'static str,
    ) -> (ThreadSyncer, DemoRepository, ForumRepository, Arc<PolicyEngine>) {
        let store = Arc::new(MemoryStore::new());
        let adapter = RefusingPolicy {
            inner: MemoryStore::new(),
            prefix,
        };
        let policy = Arc::new(PolicyEngine::load(Arc::new(adapter)).await.unwrap());
        let demos = DemoRepository::new(store.clone(), policy.clone());
        let forum = ForumRepository::new(store, policy.clone());
        (
            ThreadSyncer::new(demos.clone(), forum.clone()),
            demos,
            forum,
            policy,
        )
    }

    async fn assert_nothing_published(demos: &DemoRepository, forum: &ForumRepository) {
        assert!(demos.find(&SearchQuery::all()).await.unwrap().is_empty());
        assert!(forum.find_threads(&SearchQuery::all()).await.unwrap().is_empty());
    }

    #[test]
    fn test_projection_keeps_thread_fields() {
        let update = DemoUpdate {
            title: Some("New".to_string()),
            description: Some("ignored".to_string()),
            link: Some("https://example.com".to_string()),
            upvotes: Some(3),
            version: Some(4),
            ..DemoUpdate::default()
        };
        let projection = thread_projection(&update);
        assert_eq!(projection.title.as_deref(), Some("New"));
        assert_eq!(projection.upvotes, Some(3));
        assert_eq!(projection.version, None);
    }

    #[test]
    fn test_projection_of_description_only_is_empty() {
        let update = DemoUpdate::new().description("text");
        assert!(thread_projection(&update).is_empty());
    }

    #[tokio::test]
    async fn test_patch_thread_mirrors_title() {
        let (syncer, forum) = syncer();
        let demo = syncer
            .publish_demo(NewDemo::new("Before", "https://e", Uuid::new_v4()))
            .await
            .unwrap();

        syncer
            .patch_thread(demo.id, &DemoUpdate::new().title("After"))
            .await
            .unwrap();
        let thread = forum.get_thread(demo.thread_id).await.unwrap();
        assert_eq!(thread.title, "After");
        assert_eq!(thread.version, 2);

        syncer
            .patch_thread(demo.id, &DemoUpdate::new().description("not shown"))
            .await
            .unwrap();
        assert_eq!(forum.get_thread(demo.thread_id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_remove_demo_tolerates_missing_thread() {
        let (syncer, forum) = syncer();
        let demo = syncer
            .publish_demo(NewDemo::new("Gone", "https://e", Uuid::new_v4()))
            .await
            .unwrap();
        forum.remove_thread(demo.thread_id).await.unwrap();

        syncer.remove_demo(demo.id).await.unwrap();
        assert!(syncer.remove_demo(demo.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failed_demo_insert_removes_thread() {
        let store = Arc::new(MemoryStore::new());
        let policy = Arc::new(PolicyEngine::in_memory());
        let demos = DemoRepository::new(Arc::new(BrokenDemos(store.clone())), policy.clone());
        let forum = ForumRepository::new(store, policy.clone());
        let syncer = ThreadSyncer::new(demos.clone(), forum.clone());

        let err = syncer
            .publish_demo(NewDemo::new("Lost", "https://e", Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, HangarError::Database(_)));
        assert_nothing_published(&demos, &forum).await;
        assert!(policy.rules_for_object(&object_path("threads", 2)).await.is_empty());
    }

    #[tokio::test]
    async fn test_refused_demo_grant_rolls_back_publish() {
        let (syncer, demos, forum, _) = refusing_syncer("demos/").await;

        let err = syncer
            .publish_demo(NewDemo::new("T", "https://e", Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, HangarError::Upstream(_)));
        assert_nothing_published(&demos, &forum).await;
    }

    #[tokio::test]
    async fn test_refused_thread_grant_leaves_no_thread() {
        let (syncer, demos, forum, _) = refusing_syncer("threads/").await;

        let err = syncer
            .publish_demo(NewDemo::new("T", "https://e", Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, HangarError::Upstream(_)));
        assert_nothing_published(&demos, &forum).await;
    }

    #[tokio::test]
    async fn test_refused_message_grant_drops_message() {
        let (syncer, _, forum, policy) = refusing_syncer("messages/").await;
        let demo = syncer
            .publish_demo(NewDemo::new("T", "https://e", Uuid::new_v4()))
            .await
            .unwrap();

        let err = forum
            .create_message(&NewMessage::new(demo.thread_id, Uuid::new_v4(), "Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, HangarError::Upstream(_)));
        assert!(forum.find_messages(&SearchQuery::all()).await.unwrap().is_empty());

        let object = object_path("threads", demo.thread_id);
        assert_eq!(policy.rules_for_object(&object).await.len(), 2);
    }
}
