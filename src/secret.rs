//! Credential retrieval
//!
//! The API key lives in a secret addressed by `(name, namespace)`. Stores only
//! hand back raw key material; [`get_api_key`] turns that into an [`ApiKey`] and
//! keeps "secret missing" apart from every other failure.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Key inside the secret that carries the API key
pub const API_KEY_SECRET_KEY: &str = "ibmcloud_api_key";

/// IBM Cloud API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Raw secret content, key -> bytes
#[derive(Debug, Clone, Default)]
pub struct Secret {
    pub data: HashMap<String, Vec<u8>>,
}

impl Secret {
    pub fn with_entry(mut self, key: &str, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// Source of secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when the secret does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;
}

/// Secrets mounted as files: `<root>/<namespace>/<name>/<key>`
#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Path components must stay inside the store root
fn valid_component(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[async_trait]
impl SecretStore for DirectorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        if !valid_component(namespace) || !valid_component(name) {
            return Err(Error::InvalidConfiguration(format!(
                "invalid secret reference {}/{}",
                namespace, name
            )));
        }

        let dir = self.root.join(namespace).join(name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut secret = Secret::default();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let value = tokio::fs::read(entry.path()).await?;
            secret.data.insert(key, value);
        }

        tracing::debug!("Loaded secret {}/{} ({} keys)", namespace, name, secret.data.len());
        Ok(Some(secret))
    }
}

fn api_key_from_secret(secret: &Secret) -> Result<ApiKey> {
    match secret.data.get(API_KEY_SECRET_KEY) {
        Some(value) if !value.is_empty() => {
            let key = String::from_utf8(value.clone())
                .map_err(|_| Error::SecretInvalid("api key is not valid UTF-8".into()))?;
            Ok(ApiKey::new(key.trim()))
        }
        _ => Err(Error::SecretInvalid(format!("missing {}", API_KEY_SECRET_KEY))),
    }
}

/// Read the API key from the given secret
pub async fn get_api_key(store: &dyn SecretStore, name: &str, namespace: &str) -> Result<ApiKey> {
    if name.is_empty() {
        return Err(Error::InvalidConfiguration("empty secret name".into()));
    }

    let Some(secret) = store.get(namespace, name).await? else {
        return Err(Error::SecretNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
    };

    api_key_from_secret(&secret)
}
