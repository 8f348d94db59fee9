//! Domain layer - Pure client abstractions
//!
//! This layer holds no transport logic (no requests, no sockets).
//! Only trait definitions and the client error type.

pub mod errors;
pub mod repositories;

pub use errors::ClientError;
pub use repositories::*;
