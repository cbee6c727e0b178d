//! Request middleware

pub mod auth;

pub use auth::{auth_middleware, encode_token, CurrentUser};
