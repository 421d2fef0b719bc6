//! Instance, network and image clients
//!
//! Narrow clients over a bound [`PowerSession`], each scoped to one cloud
//! instance. Provider errors pass through untouched.

use super::models::{Images, Networks, PvmInstance, PvmInstanceCreate, PvmInstanceList, PvmInstances};
use super::session::PowerSession;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

fn parse_payload<T: DeserializeOwned>(response: Value, what: &'static str) -> Result<T> {
    if response.is_null() {
        return Err(Error::EmptyPayload(what));
    }
    Ok(serde_json::from_value(response)?)
}

/// PVM instance operations
#[derive(Clone)]
pub struct InstanceClient {
    session: Arc<PowerSession>,
    cloud_instance_id: String,
}

impl InstanceClient {
    pub fn new(session: Arc<PowerSession>, cloud_instance_id: &str) -> Self {
        Self {
            session,
            cloud_instance_id: cloud_instance_id.to_string(),
        }
    }

    pub async fn get_all(&self) -> Result<PvmInstances> {
        let response = self.session.get(&self.cloud_instance_id, "pvm-instances").await?;
        parse_payload(response, "pvm-instances")
    }

    pub async fn get(&self, id: &str) -> Result<PvmInstance> {
        let path = format!("pvm-instances/{}", urlencoding::encode(id));
        let response = self.session.get(&self.cloud_instance_id, &path).await?;
        parse_payload(response, "pvm-instance")
    }

    pub async fn create(&self, params: &PvmInstanceCreate) -> Result<PvmInstanceList> {
        tracing::info!("Creating instance {}", params.server_name);
        let body = serde_json::to_value(params)?;
        let response = self
            .session
            .post(&self.cloud_instance_id, "pvm-instances", &body)
            .await?;
        parse_payload(response, "pvm-instance list")
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting instance {}", id);
        let path = format!("pvm-instances/{}", urlencoding::encode(id));
        self.session.delete(&self.cloud_instance_id, &path).await?;
        Ok(())
    }
}

/// Network listing
#[derive(Clone)]
pub struct NetworkClient {
    session: Arc<PowerSession>,
    cloud_instance_id: String,
}

impl NetworkClient {
    pub fn new(session: Arc<PowerSession>, cloud_instance_id: &str) -> Self {
        Self {
            session,
            cloud_instance_id: cloud_instance_id.to_string(),
        }
    }

    /// `{"networks": []}` is an empty result; a body-less reply is [`Error::EmptyPayload`]
    pub async fn get_all(&self) -> Result<Networks> {
        let response = self.session.get(&self.cloud_instance_id, "networks").await?;
        parse_payload(response, "networks")
    }
}

/// Image listing
#[derive(Clone)]
pub struct ImageClient {
    session: Arc<PowerSession>,
    cloud_instance_id: String,
}

impl ImageClient {
    pub fn new(session: Arc<PowerSession>, cloud_instance_id: &str) -> Self {
        Self {
            session,
            cloud_instance_id: cloud_instance_id.to_string(),
        }
    }

    pub async fn get_all(&self) -> Result<Images> {
        let response = self.session.get(&self.cloud_instance_id, "images").await?;
        parse_payload(response, "images")
    }
}
