//! Administration module for MyCloud.
//!
//! - User management (list, get, create, update, delete)
//! - Administrator bootstrap from configuration
//!
//! Listing and reading are scoped for non-admins; every mutation requires
//! the administrator flag.

mod bootstrap;
mod user;

pub use bootstrap::ensure_admin;
pub use user::{AccountUpdate, UserAdminService};
