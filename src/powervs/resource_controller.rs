//! Resource Controller
//!
//! Account-level lookups of service instances.

use super::crn::Crn;
use super::http::ApiHttpClient;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Service name of Power Virtual Server instances
pub const POWER_SERVICE_TYPE: &str = "power-iaas";

/// Resource kind listed by [`ResourceControllerClient::list_instances`]
pub const SERVICE_INSTANCE_TYPE: &str = "service_instance";

/// Upper bound on followed `next_url` links
const MAX_PAGES: usize = 100;

/// A provisioned service instance in the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: String,
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub crn: Crn,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region_id: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceInstancePage {
    #[serde(default)]
    rows: Vec<ResourceInstance>,
    #[serde(default)]
    next_url: Option<String>,
}

/// Keep only instances of `service_type`
pub fn filter_service_instances(
    instances: Vec<ResourceInstance>,
    service_type: &str,
) -> Vec<ResourceInstance> {
    instances
        .into_iter()
        .filter(|svc| svc.crn.service_name == service_type)
        .collect()
}

/// Resource Controller v2 client
#[derive(Clone)]
pub struct ResourceControllerClient {
    http: ApiHttpClient,
    endpoint: String,
}

impl ResourceControllerClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::from_http(endpoint, ApiHttpClient::new()?)
    }

    /// Client whose requests give up after `timeout`
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        Self::from_http(endpoint, ApiHttpClient::with_timeout(timeout, false)?)
    }

    fn from_http(endpoint: &str, http: ApiHttpClient) -> Result<Self> {
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Get a single service instance by id, GUID or CRN
    pub async fn get_instance(&self, authorization: &str, id: &str) -> Result<ResourceInstance> {
        let url = self.url(&format!(
            "/v2/resource_instances/{}",
            urlencoding::encode(id)
        ));
        let response = self.http.get(&url, authorization, &[]).await?;
        if response.is_null() {
            return Err(Error::EmptyPayload("resource instance"));
        }
        Ok(serde_json::from_value(response)?)
    }

    /// List every instance of `kind` in the account, following pagination
    pub async fn list_instances(&self, authorization: &str, kind: &str) -> Result<Vec<ResourceInstance>> {
        let mut all = Vec::new();
        let mut next = Some(format!(
            "/v2/resource_instances?type={}",
            urlencoding::encode(kind)
        ));
        let mut pages = 0;

        while let Some(path) = next {
            if pages == MAX_PAGES {
                tracing::warn!("Resource instance listing exceeded {} pages", MAX_PAGES);
                return Err(Error::PageLimit(MAX_PAGES));
            }
            pages += 1;

            let response = self.http.get(&self.url(&path), authorization, &[]).await?;
            let page: ResourceInstancePage = match response {
                Value::Null => break,
                value => serde_json::from_value(value)?,
            };
            all.extend(page.rows);
            next = page.next_url.filter(|url| !url.is_empty());
        }

        tracing::debug!("Listed {} resource instances", all.len());
        Ok(all)
    }
}
