//! IBM Cloud Power VS API interaction module
//!
//! Building blocks of a session: token exchange, identity, region lookup,
//! the regional Power Cloud session and its narrow resource clients.
//!
//! # Module Structure
//!
//! - [`auth`] - API key to IAM access token exchange
//! - [`account`] - Account session with token caching
//! - [`identity`] - Identity claims read from the access token
//! - [`region`] - Zone to region resolution
//! - [`resource_controller`] - Account-level service instance lookups
//! - [`session`] - Region-bound Power Cloud session
//! - [`pcloud`] - Instance, network and image clients
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use powervs_client::client::Bootstrapper;
//!
//! async fn example(api_key: ApiKey) -> powervs_client::Result<()> {
//!     let session = Bootstrapper::new(Endpoints::default())?
//!         .full(api_key, "cloud-instance-guid")
//!         .await?;
//!     let instances = session.get_instances().await?;
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod auth;
pub mod crn;
pub mod http;
pub mod identity;
pub mod models;
pub mod pcloud;
pub mod region;
pub mod resource_controller;
pub mod session;
