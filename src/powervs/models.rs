//! Power Cloud API models
//!
//! Only the fields this client reads are typed; the rest of each payload is kept
//! in `extra` so nothing is lost when a model is printed or passed on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Instance status strings reported by the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceState {
    Shutoff,
    Active,
    Build,
    Other(String),
}

impl InstanceState {
    pub const SHUTOFF: &'static str = "SHUTOFF";
    pub const ACTIVE: &'static str = "ACTIVE";
    pub const BUILD: &'static str = "BUILD";

    pub fn parse(status: &str) -> Self {
        match status {
            Self::SHUTOFF => InstanceState::Shutoff,
            Self::ACTIVE => InstanceState::Active,
            Self::BUILD => InstanceState::Build,
            other => InstanceState::Other(other.to_string()),
        }
    }
}

/// Network attachment of an instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstanceNetwork {
    #[serde(rename = "networkID", default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub network_name: Option<String>,
    #[serde(rename = "ipAddress", alias = "ip", default)]
    pub ip_address: Option<String>,
    #[serde(rename = "externalIP", default)]
    pub external_ip: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
}

/// Full instance, as returned by a single get
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstance {
    #[serde(rename = "pvmInstanceID")]
    pub pvm_instance_id: String,
    pub server_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "imageID", default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub processors: Option<f64>,
    #[serde(default)]
    pub memory: Option<f64>,
    #[serde(default)]
    pub proc_type: Option<String>,
    #[serde(default)]
    pub sys_type: Option<String>,
    #[serde(default)]
    pub networks: Vec<PvmInstanceNetwork>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PvmInstance {
    pub fn state(&self) -> Option<InstanceState> {
        self.status.as_deref().map(InstanceState::parse)
    }
}

/// Instance entry in a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstanceReference {
    #[serde(rename = "pvmInstanceID")]
    pub pvm_instance_id: String,
    pub server_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstances {
    #[serde(default)]
    pub pvm_instances: Vec<PvmInstanceReference>,
}

/// Result of a create call; one entry per created instance
pub type PvmInstanceList = Vec<PvmInstance>;

/// Network to attach at creation time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstanceAddNetwork {
    #[serde(rename = "networkID")]
    pub network_id: String,
    #[serde(rename = "ipAddress", skip_serializing_if = "Option::is_none", default)]
    pub ip_address: Option<String>,
}

/// Body of a create call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstanceCreate {
    pub server_name: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub processors: f64,
    pub memory: f64,
    pub proc_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sys_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key_pair_name: Option<String>,
    #[serde(default)]
    pub networks: Vec<PvmInstanceAddNetwork>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub storage_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkReference {
    #[serde(rename = "networkID")]
    pub network_id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub network_type: Option<String>,
    #[serde(rename = "vlanID", default)]
    pub vlan_id: Option<f64>,
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub networks: Vec<NetworkReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Images {
    #[serde(default)]
    pub images: Vec<ImageReference>,
}
