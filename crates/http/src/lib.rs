//! Dealdesk HTTP client for the marketplace merchant API
//!
//! [`client::ApiClient`] attaches the stored bearer token to every request and
//! renews an expired session transparently. Concurrent requests that hit an
//! expired token share a single refresh call.

pub mod client;
pub mod types;

pub use client::{ApiClient, ApiClientBuilder, ApiRequest, error::ClientError};
