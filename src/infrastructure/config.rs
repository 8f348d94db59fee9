use std::env;
use std::time::Duration;

use url::Url;

use crate::domain::ClientError;
use crate::utils::dates::DEFAULT_LOAN_PERIOD_DAYS;

pub const DEFAULT_API_BASE_URL: &str = "https://localhost:7158";
pub const HUB_PATH: &str = "notificationHub";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub hub_url: String,
    pub loan_period_days: u32,
    /// No timeout unless explicitly configured
    pub request_timeout: Option<Duration>,
    pub hub_skip_negotiation: bool,
    pub profile: String,
}

impl Config {
    pub fn from_env() -> Self {
        let profile = env::var("PROFILE").unwrap_or_else(|_| "default".to_string());

        let api_base_url = env::var("API_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        let hub_url = env::var("NOTIFICATION_HUB_URL")
            .unwrap_or_else(|_| format!("{}/{}", api_base_url, HUB_PATH));

        Self {
            hub_url,
            loan_period_days: env::var("LOAN_PERIOD_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(DEFAULT_LOAN_PERIOD_DAYS),
            request_timeout: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            hub_skip_negotiation: env::var("HUB_SKIP_NEGOTIATION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            api_base_url,
            profile,
        }
    }

    /// Defaults pointed at a specific API host (hub on the same host)
    pub fn with_base_url(base_url: &str) -> Self {
        let api_base_url = base_url.trim_end_matches('/').to_string();
        Self {
            hub_url: format!("{}/{}", api_base_url, HUB_PATH),
            api_base_url,
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
            request_timeout: None,
            hub_skip_negotiation: false,
            profile: "default".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let api = Url::parse(&self.api_base_url)?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "API_BASE_URL must be http(s), got {}",
                api.scheme()
            )));
        }

        let hub = Url::parse(&self.hub_url)?;
        if !matches!(hub.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(ClientError::Config(format!(
                "NOTIFICATION_HUB_URL has unsupported scheme {}",
                hub.scheme()
            )));
        }

        if self.loan_period_days == 0 {
            return Err(ClientError::Config(
                "LOAN_PERIOD_DAYS must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
