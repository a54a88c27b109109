//! Forum: topics contain threads, threads contain messages.
//!
//! Demo threads live in the topic [`DEMO_TOPIC_ID`], which is created by the
//! schema migrations.

mod message;
mod repository;
mod store;
mod thread;
mod topic;

pub use message::{Message, MessageUpdate, NewMessage};
pub use repository::ForumRepository;
pub use store::{ForumStore, TopicRemoval};
pub use thread::{NewThread, Thread, ThreadUpdate};
pub use topic::{NewTopic, Topic, TopicUpdate, DEMO_TOPIC_ID};
