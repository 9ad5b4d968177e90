//! Web API module for MyCloud.
//!
//! REST API over the file and account services: JWT authentication,
//! multipart uploads, streamed downloads and public links.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_router, ApiDoc};
pub use server::WebServer;
