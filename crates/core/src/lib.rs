//! Dealdesk core types and utilities

pub mod config;
pub mod credentials;
pub mod error;

pub use config::ClientConfig;
pub use credentials::{
    CredentialPair, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use error::{CoreError, CoreResult};
