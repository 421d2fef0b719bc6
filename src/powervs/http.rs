//! HTTP utilities for IBM Cloud REST API calls

use crate::error::{Error, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Request timeout of account-level calls (IAM, Resource Controller)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull a human readable message out of an IBM Cloud error body
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        ["description", "message", "errorMessage", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(|m| m.as_str()))
            .map(str::to_string)
            .or_else(|| {
                v.get("errors")
                    .and_then(|e| e.get(0))
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
    });

    message.unwrap_or_else(|| sanitize_for_log(body))
}

/// HTTP client wrapper for IBM Cloud API calls
#[derive(Clone)]
pub struct ApiHttpClient {
    client: Client,
    debug: bool,
}

impl ApiHttpClient {
    /// Create a new HTTP client with [`DEFAULT_REQUEST_TIMEOUT`]
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT, false)
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration, debug: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, debug })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, authorization: &str, headers: &[(&str, &str)]) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let request = self.client.get(url).header(AUTHORIZATION, authorization);
        self.send(with_headers(request, headers)).await
    }

    /// Make a POST request with a JSON body
    pub async fn post(
        &self,
        url: &str,
        authorization: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, authorization)
            .json(body);
        self.send(with_headers(request, headers)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, authorization: &str, headers: &[(&str, &str)]) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        let request = self.client.delete(url).header(AUTHORIZATION, authorization);
        self.send(with_headers(request, headers)).await
    }

    /// Make a form POST without bearer authorization (token exchange)
    pub async fn post_form(
        &self,
        url: &str,
        basic_auth: (&str, &str),
        form: &[(&str, &str)],
    ) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let request = self
            .client
            .post(url)
            .basic_auth(basic_auth.0, Some(basic_auth.1))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form);
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if self.debug {
            tracing::debug!("Response {}: {}", status, sanitize_for_log(&body));
        }

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(Error::Provider {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        // Handle empty response
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&str, &str)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}
