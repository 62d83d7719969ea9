//! Configuration loading for the idcloud client.
//!
//! The file is TOML. `base_url` and `[api_key]` are required; everything in
//! `[cache]` has a default.

use crate::error::ConfigError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable naming the default configuration file.
pub const CONFIG_ENV_VAR: &str = "IDCLOUD_CONFIG";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_TTL_SECS: u64 = 300;
pub const DEFAULT_TTI_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: ApiKeyConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    pub id: String,
    pub secret: SecretString,
}

impl ApiKeyConfig {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

/// Which store backs every cache region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Disabled,
    Redis,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Disabled => "disabled",
            StoreKind::Redis => "redis",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub store: StoreKind,
    /// Seconds an entry lives after it was written.
    #[serde(default = "default_ttl")]
    pub ttl: u64,
    /// Seconds an entry lives after it was last read.
    #[serde(default = "default_tti")]
    pub tti: u64,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Per-region `ttl`/`tti` overrides keyed by region name.
    #[serde(default)]
    pub regions: BTreeMap<String, RegionOverride>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            ttl: DEFAULT_TTL_SECS,
            tti: DEFAULT_TTI_SECS,
            redis: None,
            regions: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tti(mut self, tti: u64) -> Self {
        self.tti = tti;
        self
    }

    pub fn with_region_override(mut self, region: impl Into<String>, over: RegionOverride) -> Self {
        self.regions.insert(region.into(), over);
        self
    }

    /// Effective `(ttl, tti)` for a region after applying overrides.
    pub fn timeouts_for(&self, region: &str) -> (u64, u64) {
        match self.regions.get(region) {
            Some(over) => (over.ttl.unwrap_or(self.ttl), over.tti.unwrap_or(self.tti)),
            None => (self.ttl, self.tti),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionOverride {
    pub ttl: Option<u64>,
    pub tti: Option<u64>,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_tti() -> u64 {
    DEFAULT_TTI_SECS
}

fn default_redis_prefix() -> String {
    "idcloud:".to_string()
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: ApiKeyConfig) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            cache: CacheConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Load the file named by [`CONFIG_ENV_VAR`].
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV_VAR).ok_or(ConfigError::MissingConfigPath {
            env_var: CONFIG_ENV_VAR,
        })?;
        Self::from_path(Path::new(&path))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        if self.api_key.id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_key.id".to_string(),
            });
        }
        if self.api_key.secret().trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_key.secret".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.cache.store == StoreKind::Redis {
            match &self.cache.redis {
                None => return Err(invalid("cache.redis", "required when cache.store = \"redis\"")),
                Some(redis) if redis.url.trim().is_empty() => {
                    return Err(invalid("cache.redis.url", "must not be empty"))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
