//! Cache regions and href routing.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A named cache partition, one per resource collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    Applications,
    Directories,
    Accounts,
    Groups,
    GroupMemberships,
    Tenants,
    AccountStoreMappings,
    ApiKeys,
    IdSiteNonces,
    CustomData,
}

const CUSTOM_DATA_SEGMENT: &str = "customData";

impl Region {
    pub const ALL: [Region; 10] = [
        Region::Applications,
        Region::Directories,
        Region::Accounts,
        Region::Groups,
        Region::GroupMemberships,
        Region::Tenants,
        Region::AccountStoreMappings,
        Region::ApiKeys,
        Region::IdSiteNonces,
        Region::CustomData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Applications => "applications",
            Region::Directories => "directories",
            Region::Accounts => "accounts",
            Region::Groups => "groups",
            Region::GroupMemberships => "groupMemberships",
            Region::Tenants => "tenants",
            Region::AccountStoreMappings => "accountStoreMappings",
            Region::ApiKeys => "apiKeys",
            Region::IdSiteNonces => "idSiteNonces",
            Region::CustomData => "customData",
        }
    }

    /// Region an href belongs to.
    ///
    /// Any href with a `customData` path segment goes to
    /// [`Region::CustomData`]; otherwise the segment before the last one names
    /// the collection (`.../accounts/{id}` is `accounts`). `None` means the
    /// href has no cacheable region.
    pub fn for_href(href: &str) -> Option<Region> {
        let path = strip_query(href);
        if path.split('/').any(|segment| segment == CUSTOM_DATA_SEGMENT) {
            return Some(Region::CustomData);
        }
        path.rsplit('/').nth(1).and_then(|segment| segment.parse().ok())
    }
}

fn strip_query(href: &str) -> &str {
    match href.find('?') {
        Some(idx) => &href[..idx],
        None => href,
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .iter()
            .copied()
            .find(|region| region.as_str() == s)
            .ok_or_else(|| format!("unknown cache region '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: &str = "https://api.idcloud.example/v1";

    #[test]
    fn test_collection_segment_names_region() {
        assert_eq!(Region::for_href(&format!("{BASE}/accounts/123")), Some(Region::Accounts));
        assert_eq!(
            Region::for_href(&format!("{BASE}/applications/abc")),
            Some(Region::Applications)
        );
        assert_eq!(
            Region::for_href(&format!("{BASE}/groupMemberships/9")),
            Some(Region::GroupMemberships)
        );
        assert_eq!(Region::for_href("/accounts/42"), Some(Region::Accounts));
    }

    #[test]
    fn test_custom_data_wins() {
        assert_eq!(
            Region::for_href(&format!("{BASE}/groups/123/customData")),
            Some(Region::CustomData)
        );
        assert_eq!(
            Region::for_href(&format!("{BASE}/accounts/1/customData/favoriteColor")),
            Some(Region::CustomData)
        );
    }

    #[test]
    fn test_unknown_regions() {
        assert_eq!(Region::for_href(&format!("{BASE}/loginAttempts/1")), None);
        assert_eq!(Region::for_href(&format!("{BASE}/accounts/1/groups")), None);
        assert_eq!(Region::for_href(""), None);
        assert_eq!(Region::for_href("accounts"), None);
    }

    #[test]
    fn test_query_string_ignored() {
        assert_eq!(
            Region::for_href(&format!("{BASE}/accounts/1?expand=directory")),
            Some(Region::Accounts)
        );
    }

    #[test]
    fn test_names_round_trip() {
        for region in Region::ALL {
            assert_eq!(region.as_str().parse::<Region>(), Ok(region));
        }
        assert!("nope".parse::<Region>().is_err());
    }

    proptest! {
        #[test]
        fn prop_any_id_routes_to_collection_region(
            region in prop::sample::select(Region::ALL.to_vec()),
            id in "[A-Za-z0-9]{1,24}",
        ) {
            prop_assume!(region != Region::CustomData);
            let href = format!("{BASE}/{}/{}", region.as_str(), id);
            prop_assert_eq!(Region::for_href(&href), Some(region));
        }
    }
}
