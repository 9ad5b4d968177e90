//! MyCloud - personal cloud file storage
//!
//! Users upload, organise and download their own files; administrators
//! manage every account and file; any file can also be fetched anonymously
//! through its unguessable public link.

pub mod admin;
pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use auth::{
    authenticate, hash_password, register, validate_password, verify_password, PasswordError,
    Principal, RegistrationRequest, ValidationError,
};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository, UserUpdate};
pub use error::{CloudError, Result};
pub use file::{BlobStore, FileRecord, FileService, FsBlobStore, LinkToken};
