//! Dealdesk API client

pub mod auth;
pub mod error;
pub mod merchant;
pub mod refresh;
pub mod request;
pub mod session;

pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use request::ApiRequest;
pub use session::{LogReload, SessionReload};

use dealdesk_core::{ClientConfig, CredentialStore, MemoryCredentialStore};
use error::{ClientError, SignOutReason};
use refresh::{RefreshLease, Turn};
use request::RequestContext;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

struct ClientInner {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    reload: Arc<dyn SessionReload>,
}

/// Merchant API client with bearer authentication and session renewal
///
/// Cloning is cheap; clones share the credential store and the refresh
/// coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.credentials
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.coordinator
    }

    /// Whether an access token is currently stored
    pub fn is_authenticated(&self) -> bool {
        self.inner.credentials.access_token().is_some()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.inner.base_url, path)
        } else {
            format!("{}/{}", self.inner.base_url, path)
        }
    }

    /// Issue a request and return the raw response
    ///
    /// A 401 triggers at most one session renewal followed by one retry. Every
    /// other status, including a 401 on the retry, is returned unchanged.
    ///
    /// # Errors
    ///
    /// Network failures are returned as [`ClientError::Request`]. A session
    /// that cannot be renewed yields [`ClientError::SessionExpired`].
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let mut ctx = RequestContext::default();

        if !request.authenticated {
            return self.dispatch(request, &mut ctx).await;
        }

        if let Some(outcome) = self.inner.coordinator.wait_idle().await {
            debug!(?outcome, path = %request.path, "Resuming after session refresh");
        }

        loop {
            let response = self.dispatch(request, &mut ctx).await?;
            if response.status() != StatusCode::UNAUTHORIZED || ctx.retried {
                return Ok(response);
            }

            ctx.retried = true;
            self.renew_session(ctx.generation).await?;
        }
    }

    /// Issue a request built from its parts
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send)
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Response, ClientError> {
        let mut request = ApiRequest::new(method, path);
        if let Some(body) = body {
            request = request.body(body);
        }
        if let Some(headers) = headers {
            request = request.headers(headers);
        }
        self.send(&request).await
    }

    /// Execute a request and decode a JSON success body
    ///
    /// # Errors
    ///
    /// Non-success statuses are mapped with [`ClientError::from_status`]
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(status_error(response).await)
        }
    }

    /// Execute a request whose success body is ignored
    ///
    /// # Errors
    ///
    /// Non-success statuses are mapped with [`ClientError::from_status`]
    pub async fn execute_empty(&self, request: &ApiRequest) -> Result<(), ClientError> {
        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }

    /// `GET` a JSON resource
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute)
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(&ApiRequest::get(path)).await
    }

    /// `POST` a JSON body
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute)
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(&ApiRequest::post(path).json(body)?).await
    }

    /// `PATCH` a JSON body
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute)
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(&ApiRequest::patch(path).json(body)?).await
    }

    /// `DELETE` a resource
    ///
    /// # Errors
    ///
    /// See [`execute_empty`](Self::execute_empty)
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.execute_empty(&ApiRequest::delete(path)).await
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        ctx: &mut RequestContext,
    ) -> Result<Response, ClientError> {
        let mut headers = request.headers.clone();
        if headers.remove(header::AUTHORIZATION).is_some() {
            warn!(path = %request.path, "Ignoring caller supplied Authorization header");
        }

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), self.url(&request.path))
            .headers(headers);

        if request.authenticated {
            ctx.generation = self.inner.coordinator.generation();
            if let Some(token) = self.inner.credentials.access_token() {
                builder = builder.bearer_auth(token);
            }
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            retry = ctx.retried,
            "Dispatching request"
        );
        Ok(builder.send().await?)
    }

    /// Make sure fresh credentials are stored before a retry
    async fn renew_session(&self, observed_generation: u64) -> Result<(), ClientError> {
        match self.inner.coordinator.begin(observed_generation) {
            Turn::Stale => {
                debug!("Credentials renewed since dispatch, retrying");
                Ok(())
            }
            Turn::Wait(queued) => match queued.outcome().await {
                RefreshOutcome::Failed => Err(ClientError::SessionExpired(
                    SignOutReason::SessionTerminated,
                )),
                outcome => {
                    debug!(?outcome, "Replaying queued request");
                    Ok(())
                }
            },
            Turn::Lead(lease) => match self.refresh_session().await {
                Ok(()) => {
                    lease.finish(RefreshOutcome::Refreshed);
                    Ok(())
                }
                Err(reason) => Err(self.force_sign_out(lease, reason)),
            },
        }
    }

    /// Exchange the stored refresh token for a new credential pair
    async fn refresh_session(&self) -> Result<(), SignOutReason> {
        let refresh_token = self
            .inner
            .credentials
            .refresh_token()
            .ok_or(SignOutReason::NoRefreshToken)?;

        info!("Access token rejected, refreshing session");
        let response = self
            .inner
            .http
            .post(self.url(auth::REFRESH_PATH))
            .json(&auth::RefreshRequest {
                refresh: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| SignOutReason::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignOutReason::RefreshRejected(status.as_u16()));
        }

        let tokens: auth::TokenPair = response
            .json()
            .await
            .map_err(|e| SignOutReason::RefreshFailed(e.to_string()))?;

        let credentials = &self.inner.credentials;
        credentials
            .set_access_token(&tokens.access)
            .map_err(|e| SignOutReason::RefreshFailed(e.to_string()))?;
        if let Some(refresh) = &tokens.refresh {
            credentials
                .set_refresh_token(refresh)
                .map_err(|e| SignOutReason::RefreshFailed(e.to_string()))?;
        }

        info!("Session refreshed");
        Ok(())
    }

    fn force_sign_out(&self, lease: RefreshLease, reason: SignOutReason) -> ClientError {
        warn!(%reason, "Session renewal failed, signing out");
        if let Err(e) = self.inner.credentials.clear() {
            warn!("Failed to clear stored credentials: {e}");
        }
        lease.finish(RefreshOutcome::Failed);
        self.inner.reload.reload(&reason);
        ClientError::SessionExpired(reason)
    }
}

async fn status_error(response: Response) -> ClientError {
    let status = response.status();
    let message = response.text().await.unwrap_or_else(|_| status.to_string());
    ClientError::from_status(status, message)
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    credentials: Option<Arc<dyn CredentialStore>>,
    coordinator: Option<Arc<RefreshCoordinator>>,
    reload: Option<Arc<dyn SessionReload>>,
}

impl ApiClientBuilder {
    /// Start from loaded configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::default()
            .base_url(config.base_url.clone())
            .user_agent(config.user_agent.clone());
        builder.timeout = config.timeout();
        builder
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use the given credential store (in-memory by default)
    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Share a refresh coordinator (a fresh one by default)
    pub fn coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Hook invoked after a forced sign-out
    pub fn on_sign_out(mut self, reload: impl SessionReload + 'static) -> Self {
        self.reload = Some(Arc::new(reload));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is empty".into()));
        }

        let mut client_builder = ClientBuilder::new();
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| concat!("dealdesk/", env!("CARGO_PKG_VERSION")).to_string()),
        );

        let http = client_builder.build()?;

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                credentials: self
                    .credentials
                    .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new())),
                coordinator: self.coordinator.unwrap_or_default(),
                reload: self.reload.unwrap_or_else(|| Arc::new(LogReload)),
            }),
        })
    }
}
