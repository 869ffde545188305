//! Role
//!
//! A role grants read and write access per resource kind. The service lists
//! permissions by display name ("Access Policies"); the model has one field
//! per kind. Roles are deactivated automatically before they are deleted.

use heck::{ToSnakeCase, ToTitleCase};
use log::warn;
use serde::{Deserialize, Serialize};
use tether_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tether_core::{
    AttributeCodec, Attributes, AttributesExt, ConversionError, DeletePolicy, EntityDto,
    EntityRecord, ModelConverter, ResourceKind, ValidationError, Value, WireRecord,
};

use super::entity_attributes;

pub const KIND: &str = "role";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permission {
    pub read: bool,
    pub write: bool,
}

impl Permission {
    pub fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }
}

macro_rules! permission_set {
    (read_write: [$($rw:ident),* $(,)?], read_only: [$($ro:ident),* $(,)?]) => {
        /// Access granted per resource kind
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct PermissionSet {
            $(pub $rw: Permission,)*
            $(pub $ro: Permission,)*
        }

        impl PermissionSet {
            /// Kinds that accept both read and write
            pub const READ_WRITE: &'static [&'static str] = &[$(stringify!($rw)),*];
            /// Kinds that can only be read; `write` is always false
            pub const READ_ONLY: &'static [&'static str] = &[$(stringify!($ro)),*];

            pub fn get(&self, kind: &str) -> Option<Permission> {
                match kind {
                    $(stringify!($rw) => Some(self.$rw),)*
                    $(stringify!($ro) => Some(self.$ro),)*
                    _ => None,
                }
            }

            /// Returns false when `kind` is not a known resource kind
            pub fn set(&mut self, kind: &str, permission: Permission) -> bool {
                match kind {
                    $(stringify!($rw) => self.$rw = permission,)*
                    $(stringify!($ro) => self.$ro = Permission::new(permission.read, false),)*
                    _ => return false,
                }
                true
            }
        }
    };
}

permission_set!(
    read_write: [
        access_policies,
        client_workloads,
        trust_providers,
        access_conditions,
        integrations,
        credential_providers,
        server_workloads,
        agent_controllers,
        users,
        roles,
        log_streams,
        identity_providers,
    ],
    read_only: [access_authorization_events, audit_logs, workload_events]
);

impl PermissionSet {
    /// Every known kind, read/write kinds first
    pub fn kinds() -> impl Iterator<Item = &'static str> {
        Self::READ_WRITE.iter().chain(Self::READ_ONLY).copied()
    }

    fn is_read_only(kind: &str) -> bool {
        Self::READ_ONLY.contains(&kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub record: EntityRecord,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDto {
    /// Display name (e.g., "Access Policies")
    pub name: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDto {
    #[serde(flatten)]
    pub entity: EntityDto,
    #[serde(default)]
    pub permissions: Vec<PermissionDto>,
}

impl WireRecord for RoleDto {
    fn entity(&self) -> &EntityDto {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut EntityDto {
        &mut self.entity
    }
}

pub struct RoleKind;

impl ModelConverter for RoleKind {
    type Model = Role;
    type Dto = RoleDto;

    fn to_dto(&self, model: &Role, prior_external_id: Option<&str>) -> Result<RoleDto, ConversionError> {
        let permissions = PermissionSet::kinds()
            .map(|kind| {
                let permission = model.permissions.get(kind).unwrap_or_default();
                PermissionDto {
                    name: kind.to_title_case(),
                    read: permission.read,
                    write: permission.write,
                }
            })
            .collect();

        Ok(RoleDto {
            entity: model.record.to_dto(prior_external_id),
            permissions,
        })
    }

    fn from_dto(&self, dto: RoleDto, _prior: Option<&Role>) -> Result<Role, ConversionError> {
        let mut permissions = PermissionSet::default();
        for p in &dto.permissions {
            let kind = p.name.to_snake_case();
            if !permissions.set(&kind, Permission::new(p.read, p.write)) {
                warn!("role '{}': ignoring unknown permission '{}'", dto.entity.name, p.name);
            }
        }

        Ok(Role {
            record: EntityRecord::from_dto(&dto.entity),
            permissions,
        })
    }
}

impl ResourceKind for RoleKind {
    const NAME: &'static str = KIND;

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::DisableFirst
    }

    fn record<'a>(&self, model: &'a Role) -> &'a EntityRecord {
        &model.record
    }
}

fn permission_block(kind: &str) -> AttributeSchema {
    let mut fields = vec![AttributeSchema::new("read", AttributeType::Bool)];
    if !PermissionSet::is_read_only(kind) {
        fields.push(AttributeSchema::new("write", AttributeType::Bool));
    }
    AttributeSchema::new(kind, AttributeType::Block(fields)).with_provider_name(kind.to_title_case())
}

impl AttributeCodec for RoleKind {
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(KIND)
            .with_description("Set of permissions granted to administrators")
            .attributes(entity_attributes())
            .attribute(
                AttributeSchema::new(
                    "permissions",
                    AttributeType::Block(PermissionSet::kinds().map(permission_block).collect()),
                )
                .required(),
            )
    }

    fn parse(&self, attrs: &Attributes) -> Result<Role, ValidationError> {
        let record = EntityRecord::from_attributes(attrs)?;
        let block = attrs
            .get_map("permissions")
            .ok_or_else(|| ValidationError::MissingRequired {
                name: "permissions".to_string(),
            })?;

        let mut permissions = PermissionSet::default();
        for kind in PermissionSet::kinds() {
            if let Some(p) = block.get_map(kind) {
                permissions.set(
                    kind,
                    Permission::new(
                        p.get_bool("read").unwrap_or(false),
                        p.get_bool("write").unwrap_or(false),
                    ),
                );
            }
        }

        Ok(Role {
            record,
            permissions,
        })
    }

    fn render(&self, model: &Role) -> Attributes {
        let mut attrs = Attributes::new();
        model.record.write_attributes(&mut attrs);

        let mut block = Attributes::new();
        for kind in PermissionSet::kinds() {
            let permission = model.permissions.get(kind).unwrap_or_default();
            let mut fields = Attributes::new();
            fields.insert("read".to_string(), Value::Bool(permission.read));
            if !PermissionSet::is_read_only(kind) {
                fields.insert("write".to_string(), Value::Bool(permission.write));
            }
            block.insert(kind.to_string(), Value::Map(fields));
        }
        attrs.insert("permissions".to_string(), Value::Map(block));
        attrs
    }
}
