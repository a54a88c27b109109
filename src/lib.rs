//! Game Hangar - community backend for game assets, demos and a forum.
//!
//! Assets and profile pictures are stored in an S3-compatible bucket, rows
//! in PostgreSQL. Every demo has a discussion thread in the demo topic of the
//! forum. Access is controlled by session cookies and a tuple-based policy
//! engine.

pub mod asset;
pub mod auth;
pub mod config;
pub mod db;
pub mod demo;
pub mod error;
pub mod forum;
pub mod logging;
pub mod memory;
pub mod policy;
pub mod storage;
pub mod sync;
pub mod user;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use error::{HangarError, Result};
pub use memory::{MemoryObjectStore, MemoryStore};
pub use policy::PolicyEngine;
pub use sync::ThreadSyncer;
pub use web::{AppState, WebServer};
