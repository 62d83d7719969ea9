//! Resource kinds and the field-name dispatch table.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The type a JSON payload is instantiated as.
///
/// Every kind except [`ResourceKind::Collection`] is an instance kind and may
/// be passed to [`DataStore::instantiate`](crate::DataStore::instantiate). Collection
/// pages are recognised from the payload shape, never requested by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// An untyped instance.
    Instance,
    Account,
    Application,
    Directory,
    Group,
    GroupMembership,
    Tenant,
    AccountStoreMapping,
    ApiKey,
    IdSiteNonce,
    CustomData,
    /// A factor whose concrete type is picked from its `type` field.
    Factor,
    SmsFactor,
    GoogleAuthenticatorFactor,
    Collection,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 15] = [
        ResourceKind::Instance,
        ResourceKind::Account,
        ResourceKind::Application,
        ResourceKind::Directory,
        ResourceKind::Group,
        ResourceKind::GroupMembership,
        ResourceKind::Tenant,
        ResourceKind::AccountStoreMapping,
        ResourceKind::ApiKey,
        ResourceKind::IdSiteNonce,
        ResourceKind::CustomData,
        ResourceKind::Factor,
        ResourceKind::SmsFactor,
        ResourceKind::GoogleAuthenticatorFactor,
        ResourceKind::Collection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "Instance",
            ResourceKind::Account => "Account",
            ResourceKind::Application => "Application",
            ResourceKind::Directory => "Directory",
            ResourceKind::Group => "Group",
            ResourceKind::GroupMembership => "GroupMembership",
            ResourceKind::Tenant => "Tenant",
            ResourceKind::AccountStoreMapping => "AccountStoreMapping",
            ResourceKind::ApiKey => "ApiKey",
            ResourceKind::IdSiteNonce => "IdSiteNonce",
            ResourceKind::CustomData => "CustomData",
            ResourceKind::Factor => "Factor",
            ResourceKind::SmsFactor => "SmsFactor",
            ResourceKind::GoogleAuthenticatorFactor => "GoogleAuthenticatorFactor",
            ResourceKind::Collection => "Collection",
        }
    }

    /// Whether values of this kind are single resources.
    pub fn is_instance(&self) -> bool {
        !matches!(self, ResourceKind::Collection)
    }

    /// Kind for an expanded field, by naming convention.
    ///
    /// The field name is capitalised and looked up as a kind name; plural
    /// names (`groups`, `directories`) fall back to their singular form.
    /// Returns `None` for fields with no matching kind.
    pub fn for_field(field: &str) -> Option<ResourceKind> {
        let name = capitalize(field)?;
        if let Ok(kind) = name.parse::<ResourceKind>() {
            return Some(kind).filter(ResourceKind::is_instance);
        }
        singular(&name)
            .and_then(|singular| singular.parse().ok())
            .filter(ResourceKind::is_instance)
    }

    /// Narrow a polymorphic kind using the payload it is built from.
    ///
    /// Only [`ResourceKind::Factor`] is polymorphic: its `type` field picks
    /// the SMS or Google Authenticator variant. Unknown types stay `Factor`.
    pub fn resolve(self, properties: &Map<String, Value>) -> ResourceKind {
        if self != ResourceKind::Factor {
            return self;
        }
        match properties.get("type").and_then(Value::as_str) {
            Some(t) if t.eq_ignore_ascii_case("sms") => ResourceKind::SmsFactor,
            Some(t) if t.eq_ignore_ascii_case("google-authenticator") => {
                ResourceKind::GoogleAuthenticatorFactor
            }
            _ => ResourceKind::Factor,
        }
    }
}

fn capitalize(field: &str) -> Option<String> {
    let mut chars = field.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

fn singular(name: &str) -> Option<String> {
    if let Some(stem) = name.strip_suffix("ies") {
        return Some(format!("{}y", stem));
    }
    name.strip_suffix('s').map(str::to_string)
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown resource kind '{}'", s))
    }
}
