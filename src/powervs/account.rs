//! Account session
//!
//! Holds the API key and caches the access token obtained for it. Listing calls
//! made through the session authenticate lazily on first use.

use super::auth::{AccessToken, Authenticator};
use super::resource_controller::{
    filter_service_instances, ResourceControllerClient, ResourceInstance, POWER_SERVICE_TYPE,
    SERVICE_INSTANCE_TYPE,
};
use crate::error::{Error, Result};
use crate::secret::ApiKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Refresh tokens this long before they expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Account-scoped session with token caching
#[derive(Clone)]
pub struct AccountSession {
    api_key: ApiKey,
    authenticator: Arc<dyn Authenticator>,
    token_cache: Arc<RwLock<Option<AccessToken>>>,
    resources: ResourceControllerClient,
}

impl AccountSession {
    pub fn new(
        api_key: ApiKey,
        authenticator: Arc<dyn Authenticator>,
        resources: ResourceControllerClient,
    ) -> Self {
        Self {
            api_key,
            authenticator,
            token_cache: Arc::new(RwLock::new(None)),
            resources,
        }
    }

    /// Exchange the API key for a fresh token and cache it
    pub async fn authenticate(&self) -> Result<AccessToken> {
        let token = self.authenticator.authenticate(&self.api_key).await?;

        let mut cache = self.token_cache.write().await;
        *cache = Some(token.clone());
        tracing::debug!("Access token cached");

        Ok(token)
    }

    /// Cached token, if any
    pub async fn cached_token(&self) -> Option<AccessToken> {
        self.token_cache.read().await.clone()
    }

    /// Cached token, authenticating if nothing is cached or it is about to expire
    pub async fn access_token(&self) -> Result<AccessToken> {
        {
            let cache = self.token_cache.read().await;
            if let Some(token) = cache.as_ref() {
                if !token.expires_within(TOKEN_EXPIRY_BUFFER) {
                    return Ok(token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        self.authenticate().await
    }

    /// Metadata of one service instance
    pub async fn resource_instance(&self, id: &str) -> Result<ResourceInstance> {
        let token = self.access_token().await?;
        self.resources
            .get_instance(&token.authorization(), id)
            .await
    }

    /// All Power VS service instances in the account
    pub async fn power_service_instances(&self) -> Result<Vec<ResourceInstance>> {
        let all = self
            .service_instances()
            .await
            .map_err(|e| Error::Listing {
                what: "service instance",
                source: Box::new(e),
            })?;

        Ok(filter_service_instances(all, POWER_SERVICE_TYPE))
    }

    async fn service_instances(&self) -> Result<Vec<ResourceInstance>> {
        let token = self.access_token().await?;
        self.resources
            .list_instances(&token.authorization(), SERVICE_INSTANCE_TYPE)
            .await
    }
}
