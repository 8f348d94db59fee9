//! Client error types
//!
//! Every remote failure is mapped into one of these variants at the call
//! site. None of them is fatal: callers log and fall back to stale state or a
//! generic message.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Request could not be sent or the connection broke mid-flight
    Network(String),
    /// 401/403 from a protected endpoint
    Unauthorized,
    /// 409 from the borrow endpoint (e.g. no copies left server-side)
    Conflict,
    /// Any other non-2xx status
    Status(u16),
    /// Payload did not have the expected shape
    DataShape(String),
    /// Push subscription could not be established or was lost
    Subscription(String),
    /// Operation not allowed in the current workflow/notifier state
    InvalidState(String),
    /// Login request or token decoding failed
    LoginFailed(String),
    /// Token carried a role this client does not route
    UnknownRole(String),
    /// Invalid configuration value
    Config(String),
}

impl ClientError {
    /// Message shown to the user. Failures are never distinguished beyond
    /// these strings.
    pub fn user_message(&self) -> &'static str {
        match self {
            ClientError::LoginFailed(_) => "Login failed. Please check your credentials",
            ClientError::UnknownRole(_) => "Unknown role",
            _ => "Something went wrong. Please try again.",
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ClientError::Unauthorized => write!(f, "Unauthorized"),
            ClientError::Conflict => write!(f, "Conflict"),
            ClientError::Status(code) => write!(f, "Server returned status {}", code),
            ClientError::DataShape(msg) => write!(f, "Unexpected payload: {}", msg),
            ClientError::Subscription(msg) => write!(f, "Subscription error: {}", msg),
            ClientError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            ClientError::LoginFailed(msg) => write!(f, "Login failed: {}", msg),
            ClientError::UnknownRole(role) => write!(f, "Unknown role: {}", role),
            ClientError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

// Conversions from transport errors (used in infrastructure layer)
impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::DataShape(e.to_string())
        } else if let Some(status) = e.status() {
            ClientError::Status(status.as_u16())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::DataShape(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Subscription(e.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        ClientError::Config(e.to_string())
    }
}
