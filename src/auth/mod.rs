//! Authentication module for MyCloud.
//!
//! Password hashing, account registration and login, and the principal
//! with its authorization predicates.

mod password;
mod principal;
mod registration;
pub mod validation;

pub use password::{hash_password, validate_password, verify_password, PasswordError};
pub use principal::Principal;
pub use registration::{
    authenticate, register, register_with_admin, resolve_principal, RegistrationRequest,
};
pub use validation::ValidationError;
