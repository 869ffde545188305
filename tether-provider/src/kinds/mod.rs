//! Resource kinds managed by the provider
//!
//! - `trust_provider` - attestation sources, variants encoded as match rules
//! - `credential_provider` - credential sources, variants embedded as a JSON blob
//! - `access_condition` - posture checks, variants encoded as flat fields
//! - `role` - permission sets, deactivated automatically before delete

use tether_core::schema::{AttributeSchema, AttributeType, types};

/// Attributes of the entity envelope every kind shares
pub(crate) fn entity_attributes() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("id", AttributeType::String)
            .with_description("Identifier assigned by the service (read-only)")
            .with_provider_name("externalId"),
        AttributeSchema::new("name", AttributeType::String)
            .required()
            .with_provider_name("name"),
        AttributeSchema::new("description", AttributeType::String)
            .with_provider_name("description"),
        AttributeSchema::new("is_active", AttributeType::Bool)
            .with_description("Whether the record is active. Must be false before deletion.")
            .with_provider_name("isActive"),
        AttributeSchema::new("tags", types::tags()).with_provider_name("tags"),
    ]
}

/// String field of a variant, matched on the wire as rule `wire_name`
pub(crate) fn rule_field(name: &str, wire_name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String).with_provider_name(wire_name)
}

/// Declares a variant struct made of optional string fields, with its block
/// conversions. Empty strings read as unset.
macro_rules! string_variant {
    ($(#[$meta:meta])* $name:ident { $($field:ident),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $(pub $field: Option<String>,)*
        }

        impl $name {
            pub(crate) fn from_block(attrs: &tether_core::Attributes) -> Self {
                use tether_core::AttributesExt;
                Self {
                    $($field: attrs.get_non_empty(stringify!($field)),)*
                }
            }

            pub(crate) fn write_block(&self, attrs: &mut tether_core::Attributes) {
                use tether_core::AttributesExt;
                $(attrs.set_opt_string(stringify!($field), self.$field.as_deref());)*
            }
        }
    };
}

pub(crate) use string_variant;

pub mod access_condition;
pub mod credential_provider;
pub mod role;
pub mod trust_provider;
