//! API handlers.

pub mod assets;
pub mod auth;
pub mod demos;
pub mod forum;
pub mod users;

use std::sync::Arc;

use axum::extract::Multipart;
use uuid::Uuid;

use crate::asset::{AssetRepository, AssetStore};
use crate::auth::{AuthContext, UserAuthorizer, UserIdentifier};
use crate::demo::{DemoRepository, DemoStore};
use crate::forum::{ForumRepository, ForumStore};
use crate::policy::PolicyEngine;
use crate::storage::{ObjectStore, Upload};
use crate::sync::ThreadSyncer;
use crate::user::{UserRepository, UserStore};
use crate::web::error::ApiError;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub assets: AssetRepository,
    pub demos: DemoRepository,
    pub forum: ForumRepository,
    pub users: UserRepository,
    pub syncer: ThreadSyncer,
    pub authorizer: UserAuthorizer,
    pub identifier: UserIdentifier,
    pub policy: Arc<PolicyEngine>,
}

impl AppState {
    /// Wire the repositories over one store backend.
    pub fn new<S>(store: Arc<S>, policy: Arc<PolicyEngine>, objects: Arc<dyn ObjectStore>) -> Self
    where
        S: AssetStore + DemoStore + ForumStore + UserStore + 'static,
    {
        let assets = AssetRepository::new(store.clone(), policy.clone(), objects.clone());
        let demos = DemoRepository::new(store.clone(), policy.clone());
        let forum = ForumRepository::new(store.clone(), policy.clone());
        let users = UserRepository::new(store, policy.clone(), objects);
        Self {
            syncer: ThreadSyncer::new(demos.clone(), forum.clone()),
            authorizer: UserAuthorizer::new(users.clone()),
            identifier: UserIdentifier::new(users.clone()),
            assets,
            demos,
            forum,
            users,
            policy,
        }
    }
}

/// Owner of a row created by `ctx`.
///
/// Only administrators may create rows on behalf of someone else.
pub(crate) fn resolve_owner(ctx: &AuthContext, requested: Option<Uuid>) -> Result<Uuid, ApiError> {
    match requested {
        Some(id) if id != ctx.user_id && !ctx.is_admin() => Err(ApiError::forbidden(
            "Cannot create content on behalf of another user",
        )),
        Some(id) => Ok(id),
        None => Ok(ctx.user_id),
    }
}

/// Parts of an upload form.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    /// JSON text of the `metadata` part.
    pub metadata: Option<String>,
    /// Contents of the `file` part.
    pub file: Option<Upload>,
}

/// Read a `multipart/form-data` body with `metadata` and `file` parts.
///
/// The file type comes from the part header, else from the file name.
pub(crate) async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {}", e)))?
    {
        match field.name() {
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid metadata: {}", e)))?;
                form.metadata = Some(text);
            }
            Some("file") => {
                let content_type = field.content_type().map(str::to_string).or_else(|| {
                    field
                        .file_name()
                        .and_then(|name| mime_guess::from_path(name).first_raw())
                        .map(str::to_string)
                });
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
                form.file = Some(Upload::new(data.to_vec(), content_type));
            }
            _ => {}
        }
    }

    Ok(form)
}
