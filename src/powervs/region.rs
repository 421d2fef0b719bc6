//! Region Resolver
//!
//! Maps the zone a Power VS service instance lives in to the region that
//! serves its API.

use crate::error::{Error, Result};
use serde::Serialize;

/// Where a service instance lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceLocation {
    /// Canonical region, used to address the regional endpoint
    pub region: String,
    /// The raw region id reported for the instance
    pub zone: String,
}

/// Resolves a raw region id to its region
pub trait RegionResolver: Send + Sync {
    fn resolve(&self, raw_region_id: &str) -> Result<String>;
}

/// Known Power VS zones and their regions
const ZONE_REGIONS: &[(&str, &str)] = &[
    ("us-south", "us-south"),
    ("dal10", "us-south"),
    ("dal12", "us-south"),
    ("us-east", "us-east"),
    ("wdc04", "us-east"),
    ("wdc06", "us-east"),
    ("wdc07", "us-east"),
    ("sao01", "sao"),
    ("sao04", "sao"),
    ("tor01", "tor"),
    ("mon01", "mon"),
    ("eu-de-1", "eu-de"),
    ("eu-de-2", "eu-de"),
    ("lon04", "lon"),
    ("lon06", "lon"),
    ("mad02", "mad"),
    ("mad04", "mad"),
    ("syd04", "syd"),
    ("syd05", "syd"),
    ("tok04", "tok"),
    ("osa21", "osa"),
    ("che01", "che"),
];

/// Table-driven resolver over [`ZONE_REGIONS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRegionTable;

impl StaticRegionTable {
    /// All zones the table knows about
    pub fn zones() -> impl Iterator<Item = &'static str> {
        ZONE_REGIONS.iter().map(|(zone, _)| *zone)
    }
}

impl RegionResolver for StaticRegionTable {
    fn resolve(&self, raw_region_id: &str) -> Result<String> {
        ZONE_REGIONS
            .iter()
            .find(|(zone, _)| *zone == raw_region_id)
            .map(|(_, region)| region.to_string())
            .ok_or_else(|| Error::UnknownRegion(raw_region_id.to_string()))
    }
}

/// Resolve `raw_region_id` into a full location
pub fn locate(resolver: &dyn RegionResolver, raw_region_id: &str) -> Result<ResourceLocation> {
    let region = resolver.resolve(raw_region_id)?;
    Ok(ResourceLocation {
        region,
        zone: raw_region_id.to_string(),
    })
}
