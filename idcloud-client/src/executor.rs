//! Request execution.
//!
//! [`RequestExecutor`] is the seam between the data store and the network.
//! [`HttpRequestExecutor`] is the reqwest implementation used in production;
//! tests substitute a scripted executor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use idcloud_core::{ApiKeyConfig, ClientConfig, ClientError, ConfigError, IdCloudResult, Query, RemoteError};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

/// HTTP method of a resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request to the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub uri: String,
    pub method: Method,
    pub query: Option<Query>,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn get(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: Method::Get,
            query: None,
            body: None,
        }
    }

    pub fn post(uri: impl Into<String>, body: Value) -> Self {
        Self {
            uri: uri.into(),
            method: Method::Post,
            query: None,
            body: Some(body),
        }
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: Method::Delete,
            query: None,
            body: None,
        }
    }

    /// Attach query parameters. Empty queries are dropped.
    pub fn with_query(mut self, query: Option<Query>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    /// `METHOD uri` for logs and errors.
    pub fn summary(&self) -> String {
        format!("{} {}", self.method, self.uri)
    }
}

/// Executes requests against the remote API.
///
/// Returns the decoded response body, or `None` when the response had no
/// body. Non-success responses become [`ClientError::Remote`].
#[async_trait]
pub trait RequestExecutor: Send + Sync + fmt::Debug {
    async fn execute(&self, request: RequestDescriptor) -> IdCloudResult<Option<Value>>;
}

/// Applies credentials to an outgoing request.
pub trait Authenticator: Send + Sync + fmt::Debug {
    fn authenticate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder;
}

/// HTTP Basic authentication with an API key id and secret.
pub struct BasicAuthenticator {
    id: String,
    secret: SecretString,
}

impl BasicAuthenticator {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    pub fn from_api_key(api_key: &ApiKeyConfig) -> Self {
        Self::new(api_key.id.clone(), api_key.secret())
    }
}

impl fmt::Debug for BasicAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthenticator")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl Authenticator for BasicAuthenticator {
    fn authenticate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.id, Some(self.secret.expose_secret()))
    }
}

/// reqwest-backed executor.
#[derive(Debug, Clone)]
pub struct HttpRequestExecutor {
    client: reqwest::Client,
    base_url: String,
    authenticator: Arc<dyn Authenticator>,
}

impl HttpRequestExecutor {
    /// Build an executor using the config's base URL, timeout and API key.
    pub fn new(config: &ClientConfig) -> IdCloudResult<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("idcloud-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "request_timeout_ms".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authenticator: Arc::new(BasicAuthenticator::from_api_key(&config.api_key)),
        })
    }

    /// Replace the request authenticator.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Absolute URL for `uri`. Absolute hrefs pass through unchanged.
    pub fn resolve_url(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else if uri.starts_with('/') {
            format!("{}{}", self.base_url, uri)
        } else {
            format!("{}/{}", self.base_url, uri)
        }
    }

    async fn parse_response(
        &self,
        request: &RequestDescriptor,
        response: reqwest::Response,
    ) -> IdCloudResult<Option<Value>> {
        let status = response.status();
        let text = response.text().await.map_err(|e| ClientError::Transport {
            request: request.summary(),
            reason: e.to_string(),
        })?;

        if status.is_success() || status.is_redirection() {
            if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
                return Ok(None);
            }
            let body = serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse {
                reason: format!("{} returned invalid JSON: {}", request.summary(), e),
            })?;
            return Ok(Some(body));
        }

        Err(ClientError::Remote(remote_error(status.as_u16(), &text)).into())
    }
}

/// Decode an error body, falling back to the raw text.
fn remote_error(status: u16, text: &str) -> RemoteError {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut body)) => {
            body.entry("status").or_insert_with(|| Value::from(status));
            serde_json::from_value(Value::Object(body))
                .unwrap_or_else(|_| RemoteError::from_status(status, text))
        }
        _ => RemoteError::from_status(status, text),
    }
}

#[async_trait]
impl RequestExecutor for HttpRequestExecutor {
    async fn execute(&self, request: RequestDescriptor) -> IdCloudResult<Option<Value>> {
        let url = self.resolve_url(&request.uri);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        builder = builder.header(reqwest::header::ACCEPT, "application/json");
        if let Some(query) = &request.query {
            builder = builder.query(query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder = self.authenticator.authenticate(builder);

        tracing::debug!(method = %request.method, url = %url, "Executing request");
        let response = builder.send().await.map_err(|e| ClientError::Transport {
            request: request.summary(),
            reason: e.to_string(),
        })?;
        self.parse_response(&request, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor() -> HttpRequestExecutor {
        let config = ClientConfig::new(
            "https://api.idcloud.example/v1/",
            ApiKeyConfig::new("id", "secret"),
        );
        HttpRequestExecutor::new(&config).expect("executor")
    }

    #[test]
    fn test_resolve_url() {
        let executor = executor();
        assert_eq!(
            executor.resolve_url("/accounts/1"),
            "https://api.idcloud.example/v1/accounts/1"
        );
        assert_eq!(
            executor.resolve_url("tenants/current"),
            "https://api.idcloud.example/v1/tenants/current"
        );
        assert_eq!(
            executor.resolve_url("https://other.example/v1/groups/2"),
            "https://other.example/v1/groups/2"
        );
    }

    #[test]
    fn test_descriptor_builders() {
        let get = RequestDescriptor::get("/accounts/1").with_query(Some(Query::new()));
        assert_eq!(get.query, None);
        assert_eq!(get.summary(), "GET /accounts/1");

        let post = RequestDescriptor::post("/accounts", json!({"email": "a@b.com"}))
            .with_query(Some(Query::new().with_expand("directory")));
        assert_eq!(post.method, Method::Post);
        assert!(post.query.is_some());
        assert_eq!(RequestDescriptor::delete("/x").method.as_str(), "DELETE");
    }

    #[test]
    fn test_remote_error_decoding() {
        let err = remote_error(404, r#"{"code": 404, "message": "Not found"}"#);
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "Not found");

        let err = remote_error(502, "<html>Bad gateway</html>");
        assert_eq!(err.status, 502);
        assert_eq!(err.code, 502);
        assert!(err.message.contains("Bad gateway"));
    }

    #[test]
    fn test_basic_authenticator_redacts_secret() {
        let auth = BasicAuthenticator::new("key-id", "top-secret");
        let debug = format!("{:?}", auth);
        assert!(debug.contains("key-id"));
        assert!(!debug.contains("top-secret"));
    }
}
