//! Shared HTTP plumbing for axum services: the standard error response
//! shape, liveness routing, and graceful shutdown.

pub mod errors;
pub mod health;
pub mod server;
pub mod shutdown;

pub use errors::{AppError, ErrorResponse};
pub use health::health_router;
pub use server::create_app;
pub use shutdown::shutdown_signal;
