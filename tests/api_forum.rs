//! Topics, threads and messages.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{spawn_app, TestApp, TestUser};

async fn create_topic(app: &TestApp, admin: &TestUser, name: &str) -> i64 {
    let response = app.post_json("/topics", admin, json!({"name": name})).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn create_thread(app: &TestApp, user: &TestUser, topic_id: i64, title: &str) -> Value {
    let response = app
        .post_json("/threads", user, json!({"title": title, "topicID": topic_id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

async fn post_message(app: &TestApp, user: &TestUser, thread_id: i64, title: &str) -> Value {
    let response = app
        .post_json(
            "/messages",
            user,
            json!({"threadID": thread_id, "title": title, "body": "hello hangar"}),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_stale_topic_version_conflicts() {
    let app = spawn_app().await;
    let admin = app.register_admin("root").await;

    let response = app
        .patch_json("/topics/1", &admin, json!({"name": "X", "version": 1}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let topic: Value = response.json();
    assert_eq!(topic["name"], "X");
    assert_eq!(topic["version"], 2);

    let response = app
        .patch_json("/topics/1", &admin, json!({"name": "Y", "version": 1}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let topic: Value = app.get("/topics/1").await.json();
    assert_eq!(topic["name"], "X");
    assert_eq!(topic["version"], 2);
}

#[tokio::test]
async fn test_topic_update_requires_version() {
    let app = spawn_app().await;
    let admin = app.register_admin("root").await;
    let response = app.patch_json("/topics/1", &admin, json!({"name": "X"})).await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_only_admin_manages_topics() {
    let app = spawn_app().await;
    let user = app.register("pilot").await;

    let response = app.post_json("/topics", &user, json!({"name": "General"})).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let response = app
        .patch_json("/topics/1", &user, json!({"name": "Mine", "version": 1}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let topics: Vec<Value> = app.get("/topics").await.json();
    assert_eq!(topics.len(), 1);
}

#[tokio::test]
async fn test_demo_topic_cannot_be_deleted() {
    let app = spawn_app().await;
    let admin = app.register_admin("root").await;
    let response = app.delete("/topics/1", &admin).await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_threads_cannot_be_posted_to_demo_topic() {
    let app = spawn_app().await;
    let user = app.register("pilot").await;
    let response = app
        .post_json("/threads", &user, json!({"title": "Sneaky", "topicID": 1}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_thread_in_missing_topic_is_rejected() {
    let app = spawn_app().await;
    let user = app.register("pilot").await;
    let response = app
        .post_json("/threads", &user, json!({"title": "Lost", "topicID": 999}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_thread_lifecycle() {
    let app = spawn_app().await;
    let admin = app.register_admin("root").await;
    let author = app.register("author").await;
    let reader = app.register("reader").await;
    let topic_id = create_topic(&app, &admin, "General").await;

    let thread = create_thread(&app, &author, topic_id, "Level design").await;
    assert_eq!(thread["userID"], author.id.to_string());
    assert_eq!(thread["version"], 1);
    let path = format!("/threads/{}", thread["id"]);

    let response = app
        .patch_json(&path, &reader, json!({"title": "Hijacked"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .patch_json(&path, &author, json!({"title": "Level design tips", "version": 1}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: Value = response.json();
    assert_eq!(updated["title"], "Level design tips");
    assert_eq!(updated["version"], 2);

    let found: Vec<Value> = app.search("/threads", &[("q", "design")]).await.json();
    assert_eq!(found.len(), 1);

    let response = app.delete(&path, &author).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let response = app.get(&path).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_message_lifecycle() {
    let app = spawn_app().await;
    let admin = app.register_admin("root").await;
    let author = app.register("author").await;
    let other = app.register("other").await;
    let topic_id = create_topic(&app, &admin, "General").await;
    let thread = create_thread(&app, &author, topic_id, "Sprites").await;
    let thread_id = thread["id"].as_i64().unwrap();

    let first = post_message(&app, &other, thread_id, "First").await;
    post_message(&app, &author, thread_id, "Second").await;
    assert_eq!(first["threadID"], thread_id);
    assert_eq!(first["userID"], other.id.to_string());

    let messages: Vec<Value> = app
        .get(&format!("/messages/thread/{thread_id}"))
        .await
        .json();
    assert_eq!(messages.len(), 2);

    let path = format!("/messages/{}", first["id"]);
    let response = app
        .patch_json(&path, &author, json!({"body": "edited by someone else"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .patch_json(&path, &other, json!({"body": "edited", "version": 1}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let edited: Value = response.json();
    assert_eq!(edited["body"], "edited");
    assert_eq!(edited["title"], "First");
    assert_eq!(edited["version"], 2);

    let response = app.delete(&path, &other).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let messages: Vec<Value> = app
        .get(&format!("/messages/thread/{thread_id}"))
        .await
        .json();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_messages_of_missing_thread() {
    let app = spawn_app().await;
    let response = app.get("/messages/thread/424242").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_message_in_missing_thread_is_rejected() {
    let app = spawn_app().await;
    let user = app.register("pilot").await;
    let response = app
        .post_json("/messages", &user, json!({"threadID": 424242, "title": "Echo"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_overlong_message_body() {
    let app = spawn_app().await;
    let admin = app.register_admin("root").await;
    let topic_id = create_topic(&app, &admin, "General").await;
    let thread = create_thread(&app, &admin, topic_id, "Long reads").await;

    let response = app
        .post_json(
            "/messages",
            &admin,
            json!({"threadID": thread["id"], "title": "Essay", "body": "a".repeat(10_001)}),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_deleting_topic_removes_threads_and_messages() {
    let app = spawn_app().await;
    let admin = app.register_admin("root").await;
    let author = app.register("author").await;
    let topic_id = create_topic(&app, &admin, "Off-topic").await;
    let thread = create_thread(&app, &author, topic_id, "Chatter").await;
    let message = post_message(&app, &author, thread["id"].as_i64().unwrap(), "Hi").await;

    let response = app.delete(&format!("/topics/{topic_id}"), &admin).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = app.get(&format!("/threads/{}", thread["id"])).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let response = app.get(&format!("/messages/{}", message["id"])).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let thread_object = format!("threads/{}", thread["id"]);
    assert!(app.state.policy.rules_for_object(&thread_object).await.is_empty());
}

#[tokio::test]
async fn test_duplicate_tags_are_rejected() {
    let app = spawn_app().await;
    let admin = app.register_admin("root").await;
    let topic_id = create_topic(&app, &admin, "General").await;

    let response = app
        .post_json(
            "/threads",
            &admin,
            json!({"title": "Tagged", "topicID": topic_id, "tags": ["rpg", "RPG"]}),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}
