//! API handlers.

pub mod auth;
pub mod file;
pub mod link;
pub mod user;

pub use auth::*;
pub use file::*;
pub use link::*;
pub use user::*;
