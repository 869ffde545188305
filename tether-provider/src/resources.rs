//! Resource type registry
//!
//! This module defines:
//! - The API collection each resource kind lives under
//! - `TetherProvider`, which owns one handler per kind

use std::sync::Arc;

use tether_core::memory::InMemoryClient;
use tether_core::schema::ResourceSchema;
use tether_core::{KindHandler, ProviderError, ProviderResult, RemoteClient, ResourceHandler};

use crate::client::RestClient;
use crate::config::ProviderConfig;
use crate::kinds::access_condition::{AccessConditionDto, AccessConditionKind};
use crate::kinds::credential_provider::{CredentialProviderDto, CredentialProviderKind};
use crate::kinds::role::{RoleDto, RoleKind};
use crate::kinds::trust_provider::{TrustProviderDto, TrustProviderKind};

// =============================================================================
// Resource Configuration
// =============================================================================

/// Resource type configuration
pub struct ResourceConfig {
    /// Host resource name (e.g., "trust_provider")
    pub name: &'static str,
    /// API collection path under the base URL
    pub api_path: &'static str,
}

pub const TRUST_PROVIDER_CONFIG: ResourceConfig = ResourceConfig {
    name: crate::kinds::trust_provider::KIND,
    api_path: "trust-providers",
};

pub const CREDENTIAL_PROVIDER_CONFIG: ResourceConfig = ResourceConfig {
    name: crate::kinds::credential_provider::KIND,
    api_path: "credential-providers",
};

pub const ACCESS_CONDITION_CONFIG: ResourceConfig = ResourceConfig {
    name: crate::kinds::access_condition::KIND,
    api_path: "access-conditions",
};

pub const ROLE_CONFIG: ResourceConfig = ResourceConfig {
    name: crate::kinds::role::KIND,
    api_path: "roles",
};

/// Configurations for every supported resource kind
pub fn resource_configs() -> [&'static ResourceConfig; 4] {
    [
        &TRUST_PROVIDER_CONFIG,
        &CREDENTIAL_PROVIDER_CONFIG,
        &ACCESS_CONDITION_CONFIG,
        &ROLE_CONFIG,
    ]
}

/// Get resource configuration by host resource name
pub fn get_resource_config(name: &str) -> Option<&'static ResourceConfig> {
    resource_configs().into_iter().find(|c| c.name == name)
}

// =============================================================================
// Provider
// =============================================================================

/// All resource handlers, keyed by resource name
pub struct TetherProvider {
    handlers: Vec<Box<dyn ResourceHandler>>,
}

impl TetherProvider {
    /// Provider talking to the REST API described by `config`
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::new(e.to_string()).with_cause(e))?;
        let client = RestClient::new(config).map_err(|e| {
            ProviderError::new(format!("Failed to initialize client: {}", e)).with_cause(e)
        })?;

        Ok(Self::with_clients(
            client.endpoint::<TrustProviderDto>(TRUST_PROVIDER_CONFIG.api_path),
            client.endpoint::<CredentialProviderDto>(CREDENTIAL_PROVIDER_CONFIG.api_path),
            client.endpoint::<AccessConditionDto>(ACCESS_CONDITION_CONFIG.api_path),
            client.endpoint::<RoleDto>(ROLE_CONFIG.api_path),
        ))
    }

    /// Provider backed by the given per-kind clients
    pub fn with_clients<T, P, A, R>(
        trust_providers: T,
        credential_providers: P,
        access_conditions: A,
        roles: R,
    ) -> Self
    where
        T: RemoteClient<TrustProviderDto> + 'static,
        P: RemoteClient<CredentialProviderDto> + 'static,
        A: RemoteClient<AccessConditionDto> + 'static,
        R: RemoteClient<RoleDto> + 'static,
    {
        Self {
            handlers: vec![
                Box::new(KindHandler::new(TrustProviderKind::new(), trust_providers)),
                Box::new(KindHandler::new(
                    CredentialProviderKind::new(),
                    credential_providers,
                )),
                Box::new(KindHandler::new(AccessConditionKind::new(), access_conditions)),
                Box::new(KindHandler::new(RoleKind, roles)),
            ],
        }
    }

    /// Provider whose records live in process memory
    pub fn in_memory() -> Self {
        Self::with_clients(
            Arc::new(InMemoryClient::<TrustProviderDto>::new("tp")),
            Arc::new(InMemoryClient::<CredentialProviderDto>::new("cp")),
            Arc::new(InMemoryClient::<AccessConditionDto>::new("ac")),
            Arc::new(InMemoryClient::<RoleDto>::new("role")),
        )
    }

    pub fn name(&self) -> &'static str {
        "tether"
    }

    /// Names of every supported resource kind
    pub fn resource_types(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Handler for the resource kind `name`
    pub fn handler(&self, name: &str) -> Option<&dyn ResourceHandler> {
        self.handlers
            .iter()
            .find(|h| h.name() == name)
            .map(|h| h.as_ref())
    }

    /// Handler for `name`, or an error naming the unsupported kind
    pub fn require_handler(&self, name: &str) -> ProviderResult<&dyn ResourceHandler> {
        self.handler(name)
            .ok_or_else(|| ProviderError::new(format!("Unsupported resource type: {}", name)))
    }

    pub fn schemas(&self) -> Vec<ResourceSchema> {
        self.handlers.iter().map(|h| h.schema()).collect()
    }
}
