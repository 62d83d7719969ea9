//! Timestamped cache values.
//!
//! Timestamps are kept at millisecond precision so an entry written by an
//! external store as text comes back equal to the one that was stored.

use chrono::{DateTime, Utc};
use idcloud_core::{CacheError, IdCloudResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached value with its creation and last-access times.
///
/// `last_accessed_at >= created_at` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredEntry")]
pub struct CacheEntry {
    value: Value,
    #[serde(with = "rfc3339_millis")]
    created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_millis")]
    last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(value: Value) -> Self {
        Self::new_at(value, Utc::now())
    }

    /// Create an entry stamped with `now`.
    pub fn new_at(value: Value, now: DateTime<Utc>) -> Self {
        let now = truncate_millis(now);
        Self {
            value,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Rebuild an entry from stored timestamps.
    pub fn with_timestamps(
        value: Value,
        created_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
    ) -> Self {
        let created_at = truncate_millis(created_at);
        let last_accessed_at = truncate_millis(last_accessed_at).max(created_at);
        Self {
            value,
            created_at,
            last_accessed_at,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    /// Whether the entry is expired right now.
    pub fn is_expired(&self, ttl_secs: u64, tti_secs: u64) -> bool {
        self.is_expired_at(ttl_secs, tti_secs, Utc::now())
    }

    /// Expired iff `now >= created + ttl` or `now >= last_accessed + tti`.
    pub fn is_expired_at(&self, ttl_secs: u64, tti_secs: u64, now: DateTime<Utc>) -> bool {
        let now_ms = i128::from(now.timestamp_millis());
        let live_deadline =
            i128::from(self.created_at.timestamp_millis()) + i128::from(ttl_secs) * 1000;
        let idle_deadline =
            i128::from(self.last_accessed_at.timestamp_millis()) + i128::from(tti_secs) * 1000;
        now_ms >= live_deadline || now_ms >= idle_deadline
    }

    pub fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    /// Record an access at `now`. Never moves the access time before creation.
    pub fn touch_at(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = truncate_millis(now).max(self.created_at);
    }

    /// Text-friendly object form: `{value, createdAt, lastAccessedAt}` with
    /// RFC 3339 timestamps.
    pub fn to_object(&self) -> Value {
        serde_json::json!({
            "value": self.value,
            "createdAt": rfc3339_millis::format(&self.created_at),
            "lastAccessedAt": rfc3339_millis::format(&self.last_accessed_at),
        })
    }

    /// Inverse of [`CacheEntry::to_object`].
    pub fn parse(data: Value) -> IdCloudResult<Self> {
        serde_json::from_value(data).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn to_json_string(&self) -> IdCloudResult<String> {
        serde_json::to_string(&self.to_object()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn from_json_str(raw: &str) -> IdCloudResult<Self> {
        let data: Value = serde_json::from_str(raw).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        Self::parse(data)
    }
}

/// Wire form of an entry; converted through [`CacheEntry::with_timestamps`]
/// so a stored access time can never precede creation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    value: Value,
    #[serde(with = "rfc3339_millis")]
    created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_millis")]
    last_accessed_at: DateTime<Utc>,
}

impl From<StoredEntry> for CacheEntry {
    fn from(stored: StoredEntry) -> Self {
        CacheEntry::with_timestamps(stored.value, stored.created_at, stored.last_accessed_at)
    }
}

fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

mod rfc3339_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
