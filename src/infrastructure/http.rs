//! Thin JSON client over the library API

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::config::Config;
use crate::domain::ClientError;

const USER_AGENT: &str = concat!("bibliodesk/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<T, ClientError> {
        let request = with_bearer(self.http.get(self.endpoint(path)), bearer);
        let body = send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST a JSON body. Returns the raw response text so callers can decide
    /// how strict to be about the response shape.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<String, ClientError> {
        let request = with_bearer(self.http.post(self.endpoint(path)), bearer).json(body);
        send(request).await
    }
}

fn with_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn send(request: RequestBuilder) -> Result<String, ClientError> {
    let resp = ensure_success(request.send().await?)?;
    resp.text()
        .await
        .map_err(|e| ClientError::Network(format!("Failed to read response body: {}", e)))
}

fn ensure_success(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    tracing::debug!("API {} returned {}", resp.url().path(), status);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized,
        StatusCode::CONFLICT => ClientError::Conflict,
        other => ClientError::Status(other.as_u16()),
    })
}
