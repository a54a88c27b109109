//! Accounts, roles and login sessions.

mod repository;
mod store;
mod types;

pub use repository::UserRepository;
pub use store::UserStore;
pub use types::{NewUser, Role, RoleUpdate, Session, User, UserUpdate};
