//! IAM Authentication
//!
//! Exchanges an API key for an IAM access token.

use super::http::{ApiHttpClient, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::secret::ApiKey;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

const API_KEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Client id/secret the IAM service expects for API key exchanges
const IAM_CLIENT_CREDENTIALS: (&str, &str) = ("bx", "bx");

/// Prefix carried by stored tokens
pub const BEARER_PREFIX: &str = "Bearer ";

/// IAM access token, stored as `"<token_type> <token>"`
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        if self.value.starts_with(BEARER_PREFIX) {
            self.value.clone()
        } else {
            format!("{}{}", BEARER_PREFIX, self.value)
        }
    }

    /// The token as stored, prefix included
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::ZERO)
    }

    /// True when the token is expired or expires within `buffer`
    pub fn expires_within(&self, buffer: Duration) -> bool {
        let buffer = TimeDelta::from_std(buffer).unwrap_or_else(|_| TimeDelta::zero());
        self.expires_at.is_some_and(|at| at <= Utc::now() + buffer)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Turns an API key into an access token
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, api_key: &ApiKey) -> Result<AccessToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expiration: Option<i64>,
}

impl TokenResponse {
    fn into_token(self) -> AccessToken {
        let expires_at = self
            .expiration
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .and_then(TimeDelta::try_seconds)
                    .map(|ttl| Utc::now() + ttl)
            });
        let token_type = self.token_type.unwrap_or_else(|| "Bearer".to_string());

        AccessToken::new(format!("{} {}", token_type, self.access_token), expires_at)
    }
}

/// Authenticator backed by the IAM token endpoint
#[derive(Clone)]
pub struct IamAuthenticator {
    http: ApiHttpClient,
    endpoint: String,
}

impl IamAuthenticator {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Authenticator whose token exchange gives up after `timeout`
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: ApiHttpClient::with_timeout(timeout, false)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/identity/token", self.endpoint)
    }
}

#[async_trait]
impl Authenticator for IamAuthenticator {
    async fn authenticate(&self, api_key: &ApiKey) -> Result<AccessToken> {
        let form = [
            ("grant_type", API_KEY_GRANT_TYPE),
            ("apikey", api_key.expose()),
            ("response_type", "cloud_iam"),
        ];

        let response = self
            .http
            .post_form(&self.token_url(), IAM_CLIENT_CREDENTIALS, &form)
            .await
            .map_err(|e| Error::Authentication(e.to_string()))?;

        let token: TokenResponse = serde_json::from_value(response)
            .map_err(|e| Error::Authentication(format!("invalid token response: {}", e)))?;

        let token = token.into_token();
        tracing::debug!("Obtained IAM access token, expires at {:?}", token.expires_at());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_keeps_bearer_prefix() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "abc.def.ghi",
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
        .unwrap();

        let token = response.into_token();
        assert_eq!(token.as_str(), "Bearer abc.def.ghi");
        assert_eq!(token.authorization(), "Bearer abc.def.ghi");
        assert!(!token.is_expired());
    }

    #[test]
    fn test_expiration_timestamp_wins() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "t",
            "expires_in": 3600,
            "expiration": 1,
        }))
        .unwrap();

        assert!(response.into_token().is_expired());
    }

    #[test]
    fn test_authorization_adds_missing_prefix() {
        let token = AccessToken::new("raw", None);
        assert_eq!(token.authorization(), "Bearer raw");
        assert!(!token.is_expired());
    }

    #[test]
    fn test_expires_within_buffer() {
        let soon = AccessToken::new("Bearer t", Some(Utc::now() + TimeDelta::seconds(30)));
        assert!(!soon.is_expired());
        assert!(soon.expires_within(Duration::from_secs(60)));

        let later = AccessToken::new("Bearer t", Some(Utc::now() + TimeDelta::minutes(10)));
        assert!(!later.expires_within(Duration::from_secs(60)));
        assert!(!AccessToken::new("Bearer t", None).expires_within(Duration::from_secs(60)));
    }

    #[test]
    fn test_debug_hides_token() {
        let token = AccessToken::new("Bearer secret-token", None);
        assert!(!format!("{:?}", token).contains("secret-token"));
    }
}
