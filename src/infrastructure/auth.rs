use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Deserializer, Serialize};

use super::http::ApiClient;
use crate::domain::ClientError;
use crate::models::{Destination, Role, Session, SessionContext};
use crate::utils::wire::null_as_default;

pub const LOGIN_PATH: &str = "/api/user/login";

/// Claims the client reads out of the login token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(deserialize_with = "string_or_number")]
    pub sub: String, // user id
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub exp: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Decode the token payload.
///
/// The signature is not checked: the client has no key and the API verifies
/// the token on every protected call anyway.
pub fn decode_claims(token: &str) -> Result<Claims, ClientError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| ClientError::LoginFailed(format!("Invalid token: {}", e)))
}

/// Sign in and route by role.
///
/// On success the session is stored in `sessions` and the destination for the
/// role is returned. A token with an unrecognised role clears `sessions`.
/// Request failures leave `sessions` untouched.
pub async fn login(
    api: &ApiClient,
    sessions: &mut SessionContext,
    credentials: &LoginRequest,
) -> Result<Destination, ClientError> {
    tracing::info!("Login attempt for user: {}", credentials.email);

    let body = api
        .post_json(LOGIN_PATH, None, credentials)
        .await
        .map_err(|e| {
            tracing::warn!("Login request failed for {}: {}", credentials.email, e);
            ClientError::LoginFailed(e.to_string())
        })?;

    let response: LoginResponse = serde_json::from_str(&body)
        .map_err(|e| ClientError::LoginFailed(format!("Unexpected login response: {}", e)))?;

    let token = response
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClientError::LoginFailed("No token returned from API".to_string()))?;

    let claims = decode_claims(&token)?;

    // A missing role claim is routed like an unrecognised one
    let Some(role) = claims.role.as_deref().and_then(Role::parse) else {
        let raw = claims.role.unwrap_or_default();
        tracing::warn!("Unknown role '{}' for {}", raw, claims.email);
        sessions.clear();
        return Err(ClientError::UnknownRole(raw));
    };

    tracing::info!("Signed in {} as {}", claims.email, role);
    sessions.establish(Session {
        user_id: claims.sub,
        token,
        email: claims.email,
        role,
    });

    Ok(role.destination())
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
