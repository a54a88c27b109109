//! Topic, thread and message handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{resolve_owner, AppState};
use crate::forum::{Message, Thread, Topic};
use crate::web::dto::{
    CreateMessageRequest, CreateThreadRequest, CreateTopicRequest, ListQuery,
    UpdateMessageRequest, UpdateThreadRequest, UpdateTopicRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

// ============================================================================
// Topics
// ============================================================================

/// GET /topics - Search topics by name.
#[utoipa::path(
    get,
    path = "/topics",
    tag = "forum",
    params(ListQuery),
    responses((status = 200, description = "Matching topics", body = Vec<Topic>))
)]
pub async fn list_topics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Topic>>, ApiError> {
    Ok(Json(state.forum.find_topics(&query.to_search()).await?))
}

/// GET /topics/{id} - Get a topic.
#[utoipa::path(
    get,
    path = "/topics/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Topic ID")),
    responses(
        (status = 200, description = "Topic", body = Topic),
        (status = 404, description = "Topic not found")
    )
)]
pub async fn get_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Topic>, ApiError> {
    Ok(Json(state.forum.find_topic(id).await?))
}

/// POST /topics - Create a topic.
#[utoipa::path(
    post,
    path = "/topics",
    tag = "forum",
    request_body = CreateTopicRequest,
    responses(
        (status = 201, description = "Topic created", body = Topic),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_topic(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateTopicRequest>,
) -> Result<(StatusCode, Json<Topic>), ApiError> {
    let topic = state.forum.create_topic(&req.into()).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

/// PATCH /topics/{id} - Rename a topic.
#[utoipa::path(
    patch,
    path = "/topics/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Topic ID")),
    request_body = UpdateTopicRequest,
    responses(
        (status = 200, description = "Topic updated", body = Topic),
        (status = 404, description = "Topic not found"),
        (status = 409, description = "Stale version"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateTopicRequest>,
) -> Result<Json<Topic>, ApiError> {
    Ok(Json(state.forum.update_topic(id, &req.into()).await?))
}

/// DELETE /topics/{id} - Delete a topic with its threads and messages.
#[utoipa::path(
    delete,
    path = "/topics/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Topic ID")),
    responses(
        (status = 200, description = "Topic deleted"),
        (status = 404, description = "Topic not found"),
        (status = 422, description = "The demo topic cannot be deleted")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.forum.delete_topic(id).await?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Threads
// ============================================================================

/// GET /threads - Search threads.
#[utoipa::path(
    get,
    path = "/threads",
    tag = "forum",
    params(ListQuery),
    responses((status = 200, description = "Matching threads", body = Vec<Thread>))
)]
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Thread>>, ApiError> {
    Ok(Json(state.forum.find_threads(&query.to_search()).await?))
}

/// GET /threads/{id} - Get a thread, counting a view.
#[utoipa::path(
    get,
    path = "/threads/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Thread ID")),
    responses(
        (status = 200, description = "Thread", body = Thread),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Thread>, ApiError> {
    Ok(Json(state.forum.find_thread(id).await?))
}

/// POST /threads - Open a thread.
#[utoipa::path(
    post,
    path = "/threads",
    tag = "forum",
    request_body = CreateThreadRequest,
    responses(
        (status = 201, description = "Thread created", body = Thread),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Topic not found"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateThreadRequest>,
) -> Result<(StatusCode, Json<Thread>), ApiError> {
    let owner = resolve_owner(&ctx, req.user_id)?;
    let thread = state.forum.create_thread(&req.into_new(owner)).await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

/// PATCH /threads/{id} - Update a thread.
#[utoipa::path(
    patch,
    path = "/threads/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Thread ID")),
    request_body = UpdateThreadRequest,
    responses(
        (status = 200, description = "Thread updated", body = Thread),
        (status = 404, description = "Thread not found"),
        (status = 409, description = "Stale version"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_thread(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateThreadRequest>,
) -> Result<Json<Thread>, ApiError> {
    Ok(Json(state.forum.update_thread(id, &req.into()).await?))
}

/// DELETE /threads/{id} - Delete a thread and its messages.
#[utoipa::path(
    delete,
    path = "/threads/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Thread ID")),
    responses(
        (status = 200, description = "Thread deleted"),
        (status = 404, description = "Thread not found"),
        (status = 422, description = "Demo threads are deleted with their demo")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_thread(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.forum.delete_thread(id).await?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Messages
// ============================================================================

/// GET /messages - Search messages.
#[utoipa::path(
    get,
    path = "/messages",
    tag = "forum",
    params(ListQuery),
    responses((status = 200, description = "Matching messages", body = Vec<Message>))
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.forum.find_messages(&query.to_search()).await?))
}

/// GET /messages/thread/{id} - Search the messages of one thread.
#[utoipa::path(
    get,
    path = "/messages/thread/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Thread ID"), ListQuery),
    responses(
        (status = 200, description = "Messages of the thread", body = Vec<Message>),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn list_thread_messages(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state
        .forum
        .messages_by_thread(thread_id, &query.to_search())
        .await?;
    Ok(Json(messages))
}

/// GET /messages/{id} - Get a message, counting a view.
#[utoipa::path(
    get,
    path = "/messages/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message", body = Message),
        (status = 404, description = "Message not found")
    )
)]
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(state.forum.find_message(id).await?))
}

/// POST /messages - Post a message to a thread.
#[utoipa::path(
    post,
    path = "/messages",
    tag = "forum",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message created", body = Message),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Thread not found"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let owner = resolve_owner(&ctx, req.user_id)?;
    let message = state.forum.create_message(&req.into_new(owner)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// PATCH /messages/{id} - Update a message.
#[utoipa::path(
    patch,
    path = "/messages/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Message ID")),
    request_body = UpdateMessageRequest,
    responses(
        (status = 200, description = "Message updated", body = Message),
        (status = 404, description = "Message not found"),
        (status = 409, description = "Stale version"),
        (status = 422, description = "Invalid field")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(state.forum.update_message(id, &req.into()).await?))
}

/// DELETE /messages/{id} - Delete a message.
#[utoipa::path(
    delete,
    path = "/messages/{id}",
    tag = "forum",
    params(("id" = i64, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message deleted"),
        (status = 404, description = "Message not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.forum.delete_message(id).await?;
    Ok(StatusCode::OK)
}
