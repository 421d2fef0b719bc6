//! Configuration Management
//!
//! Endpoint overrides and default credential location, read from
//! `~/.config/powervs/config.json` and the usual IBM Cloud environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Namespace holding the credentials secret unless told otherwise
pub const DEFAULT_CREDENTIAL_NAMESPACE: &str = "openshift-machine-api";
/// Secret name holding the API key unless told otherwise
pub const DEFAULT_CREDENTIAL_SECRET: &str = "powervs-credentials";

pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.cloud.ibm.com";
pub const DEFAULT_RESOURCE_CONTROLLER_ENDPOINT: &str = "https://resource-controller.cloud.ibm.com";
/// `{region}` is replaced by the resolved region
pub const DEFAULT_POWER_ENDPOINT_TEMPLATE: &str = "https://{region}.power-iaas.cloud.ibm.com";

const IAM_ENDPOINT_ENV: &str = "IBMCLOUD_IAM_API_ENDPOINT";
const RESOURCE_CONTROLLER_ENDPOINT_ENV: &str = "IBMCLOUD_RESOURCE_CONTROLLER_API_ENDPOINT";
const POWER_ENDPOINT_ENV: &str = "IBMCLOUD_POWER_API_ENDPOINT";

/// Remote endpoints used by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub iam: String,
    pub resource_controller: String,
    /// Fixed Power endpoint; `None` derives it from the region
    #[serde(default)]
    pub power: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            iam: DEFAULT_IAM_ENDPOINT.to_string(),
            resource_controller: DEFAULT_RESOURCE_CONTROLLER_ENDPOINT.to_string(),
            power: None,
        }
    }
}

impl Endpoints {
    /// Power endpoint for a region
    pub fn power_for_region(&self, region: &str) -> String {
        match &self.power {
            Some(url) => url.clone(),
            None => DEFAULT_POWER_ENDPOINT_TEMPLATE.replace("{region}", region),
        }
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub iam_endpoint: Option<String>,
    #[serde(default)]
    pub resource_controller_endpoint: Option<String>,
    #[serde(default)]
    pub power_endpoint: Option<String>,
    /// Directory holding mounted secrets
    #[serde(default)]
    pub secrets_dir: Option<PathBuf>,
    #[serde(default)]
    pub secret_name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("powervs").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config file {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Effective endpoints (env > config > default)
    pub fn endpoints(&self) -> Endpoints {
        self.endpoints_with(|key| std::env::var(key).ok())
    }

    fn endpoints_with(&self, env: impl Fn(&str) -> Option<String>) -> Endpoints {
        let defaults = Endpoints::default();
        Endpoints {
            iam: env(IAM_ENDPOINT_ENV)
                .or_else(|| self.iam_endpoint.clone())
                .unwrap_or(defaults.iam),
            resource_controller: env(RESOURCE_CONTROLLER_ENDPOINT_ENV)
                .or_else(|| self.resource_controller_endpoint.clone())
                .unwrap_or(defaults.resource_controller),
            power: env(POWER_ENDPOINT_ENV).or_else(|| self.power_endpoint.clone()),
        }
    }

    /// Effective secret name (CLI > config > default)
    pub fn effective_secret_name(&self) -> String {
        self.secret_name
            .clone()
            .unwrap_or_else(|| DEFAULT_CREDENTIAL_SECRET.to_string())
    }

    /// Effective namespace (CLI > config > default)
    pub fn effective_namespace(&self) -> String {
        self.namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_CREDENTIAL_NAMESPACE.to_string())
    }
}
