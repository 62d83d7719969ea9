//! Error types for idcloud operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
///
/// Raised synchronously while building a client or data store; they are never
/// delivered through an operation result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (set {env_var})")]
    MissingConfigPath { env_var: &'static str },

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Cache layer errors.
///
/// These never reach the caller of a data store operation; they are logged
/// and counted on the population and invalidation paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store {store} failed: {reason}")]
    Store { store: String, reason: String },

    #[error("Cache entry serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Error body returned by the remote API for a non-success response.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("HTTP {status} (code {code}): {message}")]
pub struct RemoteError {
    pub status: u16,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_info: Option<String>,
}

impl RemoteError {
    /// Build an error for a response whose body could not be decoded.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            code: i64::from(status),
            message: body.into(),
            developer_message: None,
            more_info: None,
        }
    }
}

/// Data store and transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Transport error for {request}: {reason}")]
    Transport { request: String, reason: String },

    #[error("Invalid argument {argument}: {reason}")]
    InvalidArgument { argument: String, reason: String },

    #[error("Unexpected response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Resource is no longer attached to a data store")]
    DataStoreDropped,
}

/// Master error type for all idcloud errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdCloudError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

impl From<RemoteError> for IdCloudError {
    fn from(err: RemoteError) -> Self {
        IdCloudError::Client(ClientError::Remote(err))
    }
}

impl IdCloudError {
    /// The remote error carried by this error, if the service rejected the request.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            IdCloudError::Client(ClientError::Remote(err)) => Some(err),
            _ => None,
        }
    }

    /// Whether the error came from the cache layer.
    pub fn is_cache(&self) -> bool {
        matches!(self, IdCloudError::Cache(_))
    }
}

/// Result type alias for idcloud operations.
pub type IdCloudResult<T> = Result<T, IdCloudError>;

// =============================================================================
// TESTS
// =============================================================================
