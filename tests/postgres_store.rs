//! Store tests against a live PostgreSQL.
//!
//! Skipped unless `TEST_DATABASE_URL` points at a database the tests may
//! migrate and write to.

use std::sync::Arc;

use uuid::Uuid;

use game_hangar::auth::hash_password;
use game_hangar::config::{DatabaseConfig, MigrateConfig};
use game_hangar::db::{SearchQuery, MIGRATIONS};
use game_hangar::demo::{DemoUpdate, NewDemo};
use game_hangar::forum::{NewThread, NewTopic, TopicUpdate};
use game_hangar::user::NewUser;
use game_hangar::{AppState, Database, HangarError, MemoryObjectStore, PolicyEngine};

async fn connect() -> Option<Arc<AppState>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let config = DatabaseConfig {
        conn_string: url,
        migrate: MigrateConfig {
            enabled: true,
            expected_version: MIGRATIONS.len() as i64,
            ..MigrateConfig::default()
        },
        ..DatabaseConfig::default()
    };
    let db = Database::connect(&config).await.expect("connect");
    db.migrate(&config.migrate).await.expect("migrate");

    let store = Arc::new(db);
    let policy = Arc::new(PolicyEngine::load(store.clone()).await.expect("policy"));
    let objects = Arc::new(MemoryObjectStore::new());
    Some(Arc::new(AppState::new(store, policy, objects)))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_pg_topic_versioning() {
    let Some(state) = connect().await else { return };

    let topic = state
        .forum
        .create_topic(&NewTopic::new(unique("topic")))
        .await
        .unwrap();
    assert_eq!(topic.version, 1);

    let update = TopicUpdate {
        name: Some(unique("renamed")),
        version: Some(1),
    };
    let renamed = state.forum.update_topic(topic.id, &update).await.unwrap();
    assert_eq!(renamed.version, 2);

    let stale = state.forum.update_topic(topic.id, &update).await;
    assert!(matches!(stale, Err(HangarError::Conflict(_))));

    state.forum.delete_topic(topic.id).await.unwrap();
    assert!(state.forum.find_topic(topic.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_pg_demo_thread_pairing() {
    let Some(state) = connect().await else { return };

    let hash = hash_password("pw12pw12").unwrap();
    let name = unique("maker");
    let user = state
        .users
        .create_user(&NewUser::new(&name, format!("{name}@hangar.test"), hash))
        .await
        .unwrap();

    let tag = unique("tag");
    let demo = state
        .syncer
        .publish_demo(NewDemo::new(unique("Demo"), "https://e", user.id).with_tags(vec![tag.clone()]))
        .await
        .unwrap();
    let thread = state.forum.get_thread(demo.thread_id).await.unwrap();
    assert_eq!(thread.title, demo.title);
    assert_eq!(thread.user_id, user.id);

    let title = unique("Renamed");
    let updated = state
        .syncer
        .update_demo(demo.id, &DemoUpdate::new().title(&title).version(1))
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(state.forum.get_thread(demo.thread_id).await.unwrap().title, title);

    let viewed = state.demos.find_by_id(demo.id).await.unwrap();
    let viewed_again = state.demos.find_by_id(demo.id).await.unwrap();
    assert_eq!(viewed_again.views, viewed.views + 1);

    let hits = state
        .demos
        .find(&SearchQuery::all().with_keywords([tag.as_str()]))
        .await
        .unwrap();
    assert!(hits.iter().any(|d| d.id == demo.id));

    state.syncer.remove_demo(demo.id).await.unwrap();
    assert!(state.demos.get(demo.id).await.unwrap_err().is_not_found());
    assert!(state
        .forum
        .get_thread(demo.thread_id)
        .await
        .unwrap_err()
        .is_not_found());

    state.users.delete_user(user.id).await.unwrap();
}

#[tokio::test]
async fn test_pg_thread_needs_topic() {
    let Some(state) = connect().await else { return };

    let hash = hash_password("pw12pw12").unwrap();
    let name = unique("poster");
    let user = state
        .users
        .create_user(&NewUser::new(&name, format!("{name}@hangar.test"), hash))
        .await
        .unwrap();

    let result = state
        .forum
        .create_thread(&NewThread::new("Lost", user.id, i64::MAX))
        .await;
    assert!(matches!(result, Err(HangarError::Validation(_))));

    state.users.delete_user(user.id).await.unwrap();
}
