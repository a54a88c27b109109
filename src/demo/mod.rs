//! Playable demos, each paired with a forum thread.

mod repository;
mod store;
mod types;

pub use repository::DemoRepository;
pub use store::DemoStore;
pub use types::{Demo, DemoUpdate, NewDemo};
