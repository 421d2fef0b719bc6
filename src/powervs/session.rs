//! Resource Session Binder
//!
//! A [`PowerSession`] addresses the regional Power Cloud endpoint with the
//! account's token, and scopes every call to one cloud instance through the
//! `CRN` header.

use super::auth::AccessToken;
use super::http::ApiHttpClient;
use super::region::ResourceLocation;
use crate::config::Endpoints;
use crate::error::{Error, Result};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Region- and account-scoped Power Cloud session
#[derive(Clone)]
pub struct PowerSession {
    http: ApiHttpClient,
    base_url: Url,
    token: AccessToken,
    location: ResourceLocation,
    account: String,
}

fn valid_region(region: &str) -> bool {
    !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl PowerSession {
    /// Bind a session; any failure is a [`Error::SessionBind`]
    pub fn new(
        token: AccessToken,
        location: &ResourceLocation,
        account: &str,
        endpoints: &Endpoints,
        timeout: Duration,
        debug: bool,
    ) -> Result<Self> {
        if token.is_expired() {
            return Err(Error::SessionBind("access token has expired".into()));
        }
        if account.is_empty() {
            return Err(Error::SessionBind("empty account id".into()));
        }
        if !valid_region(&location.region) {
            return Err(Error::SessionBind(format!(
                "malformed region `{}`",
                location.region
            )));
        }
        if location.zone.is_empty() {
            return Err(Error::SessionBind("empty zone".into()));
        }

        let endpoint = endpoints.power_for_region(&location.region);
        let base_url = Url::parse(&endpoint)
            .map_err(|e| Error::SessionBind(format!("invalid endpoint {}: {}", endpoint, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::SessionBind(format!("invalid endpoint {}", endpoint)));
        }

        let http = ApiHttpClient::with_timeout(timeout, debug)
            .map_err(|e| Error::SessionBind(e.to_string()))?;

        tracing::debug!(
            "Power session bound to {} (region {}, zone {})",
            base_url,
            location.region,
            location.zone
        );

        Ok(Self {
            http,
            base_url,
            token,
            location: location.clone(),
            account: account.to_string(),
        })
    }

    pub fn location(&self) -> &ResourceLocation {
        &self.location
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// CRN that scopes requests to `cloud_instance_id`
    pub fn crn(&self, cloud_instance_id: &str) -> String {
        format!(
            "crn:v1:bluemix:public:power-iaas:{}:a/{}:{}::",
            self.location.zone, self.account, cloud_instance_id
        )
    }

    fn url(&self, cloud_instance_id: &str, path: &str) -> String {
        format!(
            "{}/pcloud/v1/cloud-instances/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(cloud_instance_id),
            path
        )
    }

    pub async fn get(&self, cloud_instance_id: &str, path: &str) -> Result<Value> {
        let crn = self.crn(cloud_instance_id);
        self.http
            .get(
                &self.url(cloud_instance_id, path),
                &self.token.authorization(),
                &[("CRN", crn.as_str())],
            )
            .await
    }

    pub async fn post(&self, cloud_instance_id: &str, path: &str, body: &Value) -> Result<Value> {
        let crn = self.crn(cloud_instance_id);
        self.http
            .post(
                &self.url(cloud_instance_id, path),
                &self.token.authorization(),
                &[("CRN", crn.as_str())],
                body,
            )
            .await
    }

    pub async fn delete(&self, cloud_instance_id: &str, path: &str) -> Result<Value> {
        let crn = self.crn(cloud_instance_id);
        self.http
            .delete(
                &self.url(cloud_instance_id, path),
                &self.token.authorization(),
                &[("CRN", crn.as_str())],
            )
            .await
    }
}
