//! Typed resource wrappers.

use idcloud_core::{ClientError, IdCloudResult};
use serde_json::Value;

define_resource!(
    /// A user account.
    Account, Account, {
        email => "email",
        username => "username",
        given_name => "givenName",
        surname => "surname",
        status => "status",
    }
);

define_resource!(
    /// An application that authenticates accounts against its account stores.
    Application, Application, { name => "name", status => "status" }
);

define_resource!(Directory, Directory, { name => "name", status => "status" });

define_resource!(Group, Group, { name => "name", status => "status" });

define_resource!(GroupMembership, GroupMembership);

define_resource!(Tenant, Tenant, { name => "name", key => "key" });

define_resource!(AccountStoreMapping, AccountStoreMapping);

define_resource!(ApiKey, ApiKey, { id => "id", status => "status" });

define_resource!(IdSiteNonce, IdSiteNonce, { value => "value" });

define_resource!(
    /// A multi-factor authentication factor whose type was not recognised.
    Factor, Factor, { factor_type => "type", status => "status" }
);

define_resource!(SmsFactor, SmsFactor, { status => "status" });

define_resource!(
    GoogleAuthenticatorFactor, GoogleAuthenticatorFactor, {
        account_name => "accountName",
        secret => "secret",
    }
);

define_resource!(
    /// Free-form key/value data attached to an account, group or other resource.
    CustomData, CustomData
);

impl CustomData {
    /// Properties managed by the service.
    pub const RESERVED: [&'static str; 3] = ["href", "createdAt", "modifiedAt"];

    /// User-defined keys, reserved properties excluded.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0
            .properties()
            .keys()
            .map(String::as_str)
            .filter(|key| !Self::RESERVED.contains(key))
    }

    /// Remove a user-defined key. It is deleted remotely on the next save.
    pub fn remove(&mut self, key: &str) -> IdCloudResult<Option<Value>> {
        if Self::RESERVED.contains(&key) {
            return Err(ClientError::InvalidArgument {
                argument: "key".to_string(),
                reason: format!("'{}' is a reserved custom data property", key),
            }
            .into());
        }
        Ok(self.0.remove(key))
    }
}
