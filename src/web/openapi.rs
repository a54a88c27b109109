//! OpenAPI document served by Swagger UI.

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use super::dto::{
    CreateAssetRequest, CreateDemoRequest, CreateMessageRequest, CreateRoleRequest,
    CreateThreadRequest, CreateTopicRequest, LoginRequest, RegisterRequest, UpdateAssetRequest,
    UpdateDemoRequest, UpdateMessageRequest, UpdateRoleRequest, UpdateThreadRequest,
    UpdateTopicRequest, UpdateUserRequest,
};
use super::handlers::{assets, auth, demos, forum, users};
use crate::asset::Asset;
use crate::demo::Demo;
use crate::forum::{Message, Thread, Topic};
use crate::user::{Role, Session, User};

/// Adds the `sessionID` cookie as a security scheme.
struct SessionCookie;

impl Modify for SessionCookie {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("sessionID"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Game Hangar API", description = "Assets, demos, forum and accounts"),
    servers((url = "/game-hangar/v1")),
    paths(
        assets::list_assets,
        assets::get_asset,
        assets::create_asset,
        assets::update_asset,
        assets::delete_asset,
        demos::list_demos,
        demos::get_demo,
        demos::create_demo,
        demos::update_demo,
        demos::delete_demo,
        forum::list_topics,
        forum::get_topic,
        forum::create_topic,
        forum::update_topic,
        forum::delete_topic,
        forum::list_threads,
        forum::get_thread,
        forum::create_thread,
        forum::update_thread,
        forum::delete_thread,
        forum::list_messages,
        forum::list_thread_messages,
        forum::get_message,
        forum::create_message,
        forum::update_message,
        forum::delete_message,
        users::list_users,
        users::get_user,
        users::update_user,
        users::upload_picture,
        users::delete_user,
        users::get_session,
        users::list_roles,
        users::get_role,
        users::create_role,
        users::update_role,
        users::delete_role,
        auth::register,
        auth::login,
        auth::verify,
        auth::reset_password,
        auth::logout,
    ),
    components(schemas(
        Asset,
        Demo,
        Topic,
        Thread,
        Message,
        User,
        Role,
        Session,
        CreateAssetRequest,
        UpdateAssetRequest,
        CreateDemoRequest,
        UpdateDemoRequest,
        CreateTopicRequest,
        UpdateTopicRequest,
        CreateThreadRequest,
        UpdateThreadRequest,
        CreateMessageRequest,
        UpdateMessageRequest,
        RegisterRequest,
        LoginRequest,
        UpdateUserRequest,
        CreateRoleRequest,
        UpdateRoleRequest,
    )),
    modifiers(&SessionCookie),
    tags(
        (name = "assets", description = "Downloadable game assets"),
        (name = "demos", description = "Playable demos, each with a forum thread"),
        (name = "forum", description = "Topics, threads and messages"),
        (name = "users", description = "Accounts and sessions"),
        (name = "roles", description = "Permission roles"),
        (name = "auth", description = "Registration and login")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/demos/{id}"));
        assert!(doc.paths.paths.contains_key("/messages/thread/{id}"));
        assert!(doc.paths.paths.contains_key("/logout/{id}"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("session_cookie"));
    }
}
