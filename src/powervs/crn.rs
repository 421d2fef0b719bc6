//! Cloud Resource Names
//!
//! `crn:v1:<cname>:<ctype>:<service-name>:<location>:<scope>:<service-instance>:<resource-type>:<resource>`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const CRN_PREFIX: &str = "crn";
const CRN_SEGMENTS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Crn {
    pub version: String,
    pub cname: String,
    pub ctype: String,
    pub service_name: String,
    pub location: String,
    pub scope: String,
    pub service_instance: String,
    pub resource_type: String,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed CRN: {0}")]
pub struct CrnParseError(String);

impl FromStr for Crn {
    type Err = CrnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }

        // The resource segment may itself contain ':'
        let parts: Vec<&str> = s.splitn(CRN_SEGMENTS, ':').collect();
        if parts.len() != CRN_SEGMENTS || parts[0] != CRN_PREFIX {
            return Err(CrnParseError(s.to_string()));
        }

        Ok(Self {
            version: parts[1].to_string(),
            cname: parts[2].to_string(),
            ctype: parts[3].to_string(),
            service_name: parts[4].to_string(),
            location: parts[5].to_string(),
            scope: parts[6].to_string(),
            service_instance: parts[7].to_string(),
            resource_type: parts[8].to_string(),
            resource: parts[9].to_string(),
        })
    }
}

impl fmt::Display for Crn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::default() {
            return Ok(());
        }
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}:{}:{}:{}",
            CRN_PREFIX,
            self.version,
            self.cname,
            self.ctype,
            self.service_name,
            self.location,
            self.scope,
            self.service_instance,
            self.resource_type,
            self.resource
        )
    }
}

impl Serialize for Crn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Crn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
