//! Utility macros for reducing boilerplate

/// Define a typed wrapper over [`Resource`](crate::resource::Resource).
///
/// The wrapper derefs to the underlying resource and implements
/// [`InstanceType`](crate::resource::InstanceType) with the given kind.
/// Optional getters expose string properties by their wire name.
///
/// # Example
/// ```ignore
/// define_resource!(Tenant, Tenant, { name => "name", key => "key" });
/// // Expands to a `Tenant(Resource)` newtype with `KIND = ResourceKind::Tenant`
/// // plus `fn name(&self) -> Option<&str>` and `fn key(&self) -> Option<&str>`.
/// ```
macro_rules! define_resource {
    ($(#[$meta:meta])* $name:ident, $kind:ident $(, { $($getter:ident => $field:literal),* $(,)? })?) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name($crate::resource::Resource);

        impl $crate::resource::InstanceType for $name {
            const KIND: $crate::resource::ResourceKind = $crate::resource::ResourceKind::$kind;

            fn from_resource(resource: $crate::resource::Resource) -> Self {
                Self(resource)
            }

            fn resource(&self) -> &$crate::resource::Resource {
                &self.0
            }

            fn resource_mut(&mut self) -> &mut $crate::resource::Resource {
                &mut self.0
            }

            fn into_resource(self) -> $crate::resource::Resource {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::resource::Resource;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        $(
            impl $name {
                $(
                    pub fn $getter(&self) -> Option<&str> {
                        self.0.get_str($field)
                    }
                )*
            }
        )?
    };
}
