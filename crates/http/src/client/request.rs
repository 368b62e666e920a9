//! Request description and per-request retry state

use super::error::ClientError;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;

/// A replayable API request
///
/// The body is kept as JSON so the same request can be sent again after a
/// session refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<Value>,
    pub(crate) headers: HeaderMap,
    pub(crate) authenticated: bool,
}

impl ApiRequest {
    /// Request against `path`, relative to the client base URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if `body` cannot be encoded
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach an already encoded JSON body
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header. `Authorization` is always replaced by the client.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merge a header map. `Authorization` is always replaced by the client.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Send without a bearer token and without session renewal
    #[must_use]
    pub fn without_auth(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Retry bookkeeping for one logical request
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RequestContext {
    /// The request has already been replayed after a 401
    pub retried: bool,
    /// Refresh generation seen when the latest attempt was dispatched
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header;
    use serde_json::json;

    #[test]
    fn test_builder_helpers() {
        let request = ApiRequest::patch("/store/")
            .json(&json!({ "name": "Corner Bakery" }))
            .unwrap()
            .header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("fa"));

        assert_eq!(*request.method(), Method::PATCH);
        assert_eq!(request.path(), "/store/");
        assert_eq!(request.body, Some(json!({ "name": "Corner Bakery" })));
        assert_eq!(request.headers.get(header::ACCEPT_LANGUAGE).unwrap(), "fa");
        assert!(request.authenticated);
    }

    #[test]
    fn test_without_auth() {
        let request = ApiRequest::post("/token/").without_auth();
        assert!(!request.authenticated);
    }
}
