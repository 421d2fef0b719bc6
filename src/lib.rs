//! Power VS client
//!
//! Turns an IBM Cloud API key into an authenticated, region-bound session for
//! one Power Virtual Server cloud instance, and exposes the instance, network
//! and image operations machine controllers need.
//!
//! # Module Structure
//!
//! - [`client`] - Staged [`ClientSession`], [`Bootstrapper`] and the [`Client`] operations
//! - [`powervs`] - Token exchange, identity, region lookup and API clients
//! - [`secret`] - API key retrieval from a secret store
//! - [`config`] - Endpoint configuration
//! - [`error`] - Error types

pub mod client;
pub mod config;
pub mod error;
pub mod powervs;
pub mod secret;

pub use client::{
    format_provider_id, new_client_minimal, new_validated_client, Bootstrapper, Client,
    ClientSession, SessionStage, TIMEOUT,
};
pub use error::{Error, Result};
