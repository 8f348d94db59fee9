//! Infrastructure layer - Transport implementations
//!
//! This layer contains:
//! - Configuration loading (config)
//! - HTTP client for the library API (http)
//! - Login and token decoding (auth)
//! - Repository implementations (repositories)
//! - Application state (state)

pub mod auth;
pub mod config;
pub mod http;
pub mod repositories;
pub mod state;

pub use repositories::*;
pub use state::AppState;
