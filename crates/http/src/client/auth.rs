//! Authentication API client methods

use super::{ApiClient, ApiRequest, ClientError};
use dealdesk_core::CredentialPair;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Token endpoint issuing a credential pair for username/password
pub const LOGIN_PATH: &str = "/token/";

/// Token endpoint exchanging a refresh token for a new pair
pub const REFRESH_PATH: &str = "/token/refresh/";

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Token pair as returned by the token endpoints
///
/// The refresh endpoint may omit `refresh` when rotation is disabled.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl ApiClient {
    /// Log in and store the issued credential pair
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthenticationFailed`] for rejected credentials
    /// and [`ClientError::Storage`] if the pair cannot be stored
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post(LOGIN_PATH)
            .json(&LoginRequest { username, password })?
            .without_auth();
        let tokens: TokenPair = self.execute(&request).await?;

        let refresh = tokens.refresh.ok_or_else(|| {
            ClientError::AuthenticationFailed("login response carried no refresh token".into())
        })?;
        self.credentials()
            .store_pair(&CredentialPair::new(tokens.access, refresh))?;

        info!(username, "Logged in");
        Ok(())
    }

    /// Forget the stored credentials
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the store cannot be cleared
    pub fn logout(&self) -> Result<(), ClientError> {
        self.credentials().clear()?;
        info!("Logged out");
        Ok(())
    }
}
