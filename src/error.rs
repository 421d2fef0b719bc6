//! Error types for the Power VS client

use crate::client::SessionStage;
use thiserror::Error;

/// Errors raised while bootstrapping a session or talking to the provider
#[derive(Error, Debug)]
pub enum Error {
    #[error("powervs credentials secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("invalid secret for powervs credentials: {0}")]
    SecretInvalid(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("failed to decode access token: {0}")]
    IdentityDecode(String),

    #[error("region not found for the zone: {0}")]
    UnknownRegion(String),

    #[error("failed to bind power session: {0}")]
    SessionBind(String),

    /// Name lookup found nothing. Callers branch on this one.
    #[error("instance Not Found")]
    InstanceNotFound,

    #[error("failed to get the {what} list: {source}")]
    Listing {
        what: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("API request failed: {status} {message}")]
    Provider { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("empty {0} payload")]
    EmptyPayload(&'static str),

    #[error("listing still had more results after {0} pages")]
    PageLimit(usize),

    #[error("session is {actual:?}, operation requires {expected:?}")]
    Stage {
        expected: SessionStage,
        actual: SessionStage,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_instance_not_found(&self) -> bool {
        matches!(self, Error::InstanceNotFound)
    }

    pub fn is_secret_not_found(&self) -> bool {
        matches!(self, Error::SecretNotFound { .. })
    }

    /// HTTP status of a provider error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Provider { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
