//! Authentication for Game Hangar.
//!
//! Password hashing, identity lookup for login, and resolution of the
//! `sessionID` cookie to the user behind a request.

mod authorizer;
mod identifier;
mod password;

pub use authorizer::UserAuthorizer;
pub use identifier::{AuthContext, UserIdentifier};
pub use password::{
    hash_password, validate_password, validate_reset_password, verify_password, PasswordError,
    MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH,
};
