//! Data Transfer Objects for the Web API.

pub mod request;
pub mod validation;

pub use request::*;
pub use validation::ValidatedJson;
