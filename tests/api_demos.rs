//! Demos and their forum threads.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{api, authed, spawn_app};

#[tokio::test]
async fn test_publish_demo_creates_thread() {
    let app = spawn_app().await;
    let user = app.register("maker").await;

    let response = app
        .post_json(
            "/demos",
            &user,
            json!({"title": "T", "link": "https://e", "userID": user.id, "tags": ["rpg"]}),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let demo: Value = response.json();
    assert_eq!(demo["version"], 1);
    assert_eq!(demo["userID"], user.id.to_string());
    let thread_id = demo["threadID"].as_i64().unwrap();

    let response = app.get(&format!("/threads/{thread_id}")).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let thread: Value = response.json();
    assert_eq!(thread["title"], "T");
    assert_eq!(thread["userID"], user.id.to_string());
    assert_eq!(thread["topicID"], 1);
    assert_eq!(thread["tags"], json!(["rpg"]));
}

#[tokio::test]
async fn test_demo_update_is_versioned_and_mirrored() {
    let app = spawn_app().await;
    let user = app.register("maker").await;
    let demo = app.publish_demo(&user, "Old Title").await;
    let id = demo["id"].as_i64().unwrap();
    let thread_id = demo["threadID"].as_i64().unwrap();

    let response = app
        .patch_json(
            &format!("/demos/{id}"),
            &user,
            json!({"title": "New Title", "version": 1}),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: Value = response.json();
    assert_eq!(updated["title"], "New Title");
    assert_eq!(updated["version"], 2);
    // Omitted fields keep their values.
    assert_eq!(updated["link"], demo["link"]);
    assert_eq!(updated["tags"], demo["tags"]);

    let thread = app.state.forum.get_thread(thread_id).await.unwrap();
    assert_eq!(thread.title, "New Title");

    let response = app
        .patch_json(&format!("/demos/{id}"), &user, json!({"title": "Stale", "version": 1}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let current = app.state.demos.get(id).await.unwrap();
    assert_eq!(current.title, "New Title");
    assert_eq!(current.version, 2);
}

#[tokio::test]
async fn test_versions_increase_by_one() {
    let app = spawn_app().await;
    let user = app.register("maker").await;
    let demo = app.publish_demo(&user, "Counting").await;
    let id = demo["id"].as_i64().unwrap();

    for expected in 2..=5 {
        let response = app
            .patch_json(
                &format!("/demos/{id}"),
                &user,
                json!({"description": format!("rev {expected}")}),
            )
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["version"], expected);
    }
}

#[tokio::test]
async fn test_empty_patch_is_rejected() {
    let app = spawn_app().await;
    let user = app.register("maker").await;
    let demo = app.publish_demo(&user, "Nothing").await;
    let response = app
        .patch_json(&format!("/demos/{}", demo["id"]), &user, json!({"version": 1}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_only_owner_edits_demo() {
    let app = spawn_app().await;
    let owner = app.register("maker").await;
    let stranger = app.register("stranger").await;
    let admin = app.register_admin("root").await;
    let demo = app.publish_demo(&owner, "Mine").await;
    let path = format!("/demos/{}", demo["id"]);

    let response = app.patch_json(&path, &stranger, json!({"title": "Yours"})).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let response = app.delete(&path, &stranger).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app.patch_json(&path, &admin, json!({"title": "Moderated"})).await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_write_is_unauthorized() {
    let app = spawn_app().await;
    let response = authed(app.server.post(&api("/demos")), None)
        .json(&json!({"title": "T", "link": "https://e"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_creating_for_someone_else_is_forbidden() {
    let app = spawn_app().await;
    let user = app.register("maker").await;
    let other = app.register("other").await;
    let response = app
        .post_json(
            "/demos",
            &user,
            json!({"title": "T", "link": "https://e", "userID": other.id}),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_demo_fields() {
    let app = spawn_app().await;
    let user = app.register("maker").await;

    let response = app
        .post_json("/demos", &user, json!({"title": "T", "link": "not a url"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .post_json(
            "/demos",
            &user,
            json!({"title": "x".repeat(91), "link": "https://e"}),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["title"].is_array());
}

#[tokio::test]
async fn test_views_are_counted() {
    let app = spawn_app().await;
    let user = app.register("maker").await;
    let demo = app.publish_demo(&user, "Popular").await;
    let path = format!("/demos/{}", demo["id"]);

    let first: Value = app.get(&path).await.json();
    let second: Value = app.get(&path).await.json();
    assert_eq!(
        second["views"].as_i64().unwrap(),
        first["views"].as_i64().unwrap() + 1
    );
    assert_eq!(first["version"], second["version"]);
}

#[tokio::test]
async fn test_delete_demo_removes_thread() {
    let app = spawn_app().await;
    let user = app.register("maker").await;
    let demo = app.publish_demo(&user, "Short lived").await;
    let thread_id = demo["threadID"].as_i64().unwrap();

    let response = app.delete(&format!("/demos/{}", demo["id"]), &user).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = app.get(&format!("/demos/{}", demo["id"])).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let response = app.get(&format!("/threads/{thread_id}")).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_demo_thread_cannot_be_deleted_directly() {
    let app = spawn_app().await;
    let user = app.register("maker").await;
    let demo = app.publish_demo(&user, "Bound").await;

    let response = app
        .delete(&format!("/threads/{}", demo["threadID"]), &user)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_search_by_keyword_tag_and_limit() {
    let app = spawn_app().await;
    let user = app.register("maker").await;

    let first = app
        .post_json(
            "/demos",
            &user,
            json!({
                "title": "Knock Knock",
                "link": "https://e/1",
                "description": "a loud стук at the door",
                "tags": ["horror"]
            }),
        )
        .await
        .json::<Value>();
    let second = app
        .post_json(
            "/demos",
            &user,
            json!({
                "title": "Seven Seas",
                "link": "https://e/2",
                "description": "sail the seven seas, hear a стук",
                "tags": ["pirates"]
            }),
        )
        .await
        .json::<Value>();

    let hits: Vec<Value> = app.search("/demos", &[("q", "seven")]).await.json();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], second["id"]);

    let hits: Vec<Value> = app.search("/demos", &[("q", "horror")]).await.json();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], first["id"]);

    // Touch the first demo so it is the most recently updated.
    let response = app
        .patch_json(
            &format!("/demos/{}", first["id"]),
            &user,
            json!({"description": "a louder стук at the door"}),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let hits: Vec<Value> = app.search("/demos", &[("q", "стук")]).await.json();
    assert_eq!(hits.len(), 2);

    let hits: Vec<Value> = app
        .search("/demos", &[("q", "стук"), ("l", "1"), ("o", "newest-updated")])
        .await
        .json();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], first["id"]);

    let all: Vec<Value> = app.get("/demos").await.json();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_highest_rated_order() {
    let app = spawn_app().await;
    let user = app.register("maker").await;
    let low = app.publish_demo(&user, "Low").await;
    let high = app.publish_demo(&user, "High").await;

    app.patch_json(
        &format!("/demos/{}", high["id"]),
        &user,
        json!({"upvotes": 10, "downvotes": 1}),
    )
    .await;
    app.patch_json(
        &format!("/demos/{}", low["id"]),
        &user,
        json!({"upvotes": 2, "downvotes": 5}),
    )
    .await;

    let hits: Vec<Value> = app.search("/demos", &[("o", "highest-rated")]).await.json();
    assert_eq!(hits[0]["id"], high["id"]);
    assert_eq!(hits[0]["rating"], 9);
    assert_eq!(hits[1]["rating"], -3);
}
