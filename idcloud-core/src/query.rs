//! Query parameters attached to resource requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EXPAND: &str = "expand";
const OFFSET: &str = "offset";
const LIMIT: &str = "limit";

/// Query-string parameters for a resource request.
///
/// Only `expand`, `offset` and `limit` have dedicated accessors; any other
/// parameter is passed through to the service untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(BTreeMap<String, String>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    /// Set the comma-separated `expand` list.
    pub fn with_expand(self, fields: &str) -> Self {
        self.with(EXPAND, fields)
    }

    pub fn with_offset(self, offset: u64) -> Self {
        self.with(OFFSET, offset)
    }

    pub fn with_limit(self, limit: u64) -> Self {
        self.with(LIMIT, limit)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn offset(&self) -> Option<u64> {
        self.get(OFFSET).and_then(|v| v.parse().ok())
    }

    pub fn limit(&self) -> Option<u64> {
        self.get(LIMIT).and_then(|v| v.parse().ok())
    }

    /// Field names listed in `expand`.
    ///
    /// Paging hints such as `groups(offset:0,limit:25)` are stripped down to
    /// the bare field name. Blank entries are ignored.
    pub fn expand_fields(&self) -> Vec<&str> {
        let Some(expand) = self.get(EXPAND) else {
            return Vec::new();
        };
        split_expand(expand)
    }
}

fn split_expand(expand: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in expand.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                push_field(&mut fields, &expand[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_field(&mut fields, &expand[start..]);
    fields
}

fn push_field<'a>(fields: &mut Vec<&'a str>, raw: &'a str) {
    let name = raw.split('(').next().unwrap_or(raw).trim();
    if !name.is_empty() {
        fields.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_fields_simple() {
        let query = Query::new().with_expand("account, directory ,customData");
        assert_eq!(query.expand_fields(), vec!["account", "directory", "customData"]);
    }

    #[test]
    fn test_expand_fields_with_paging_hints() {
        let query = Query::new().with_expand("groups(offset:0,limit:25),tenant");
        assert_eq!(query.expand_fields(), vec!["groups", "tenant"]);
    }

    #[test]
    fn test_expand_fields_absent_or_blank() {
        assert!(Query::new().expand_fields().is_empty());
        assert!(Query::new().with_expand(" , ").expand_fields().is_empty());
    }

    #[test]
    fn test_offset_and_limit() {
        let query = Query::new().with_offset(50).with_limit(25).with("email", "a@b.com");
        assert_eq!(query.offset(), Some(50));
        assert_eq!(query.limit(), Some(25));
        assert_eq!(query.get("email"), Some("a@b.com"));
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let query = Query::new().with_limit(10).with_expand("account");
        let json = serde_json::to_value(&query).expect("serialize");
        assert_eq!(json, serde_json::json!({"expand": "account", "limit": "10"}));
    }
}
