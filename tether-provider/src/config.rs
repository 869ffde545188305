//! Provider configuration
//!
//! Read from the host's provider block. Values missing from the block fall
//! back to `TETHER_*` environment variables.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tether_core::{Attributes, AttributesExt};
use thiserror::Error;

use crate::utils::validate_tenant;

pub const DEFAULT_STACK_DOMAIN: &str = "tether.cloud";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors in the provider configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required provider setting: {0}")]
    Missing(&'static str),

    #[error("Invalid provider setting '{name}': {message}")]
    Invalid { name: &'static str, message: String },
}

/// Connection settings for the remote service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderConfig {
    /// Tenant name; the first DNS label of the API host
    pub tenant: String,
    #[serde(default = "default_stack_domain")]
    pub stack_domain: String,
    /// Bearer token sent with every request
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Full API base URL, replacing the one derived from tenant and stack domain
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_stack_domain() -> String {
    DEFAULT_STACK_DOMAIN.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ProviderConfig {
    pub fn new(tenant: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            stack_domain: default_stack_domain(),
            token: token.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Build from the provider block, using the process environment for unset values
    pub fn from_attributes(attrs: &Attributes) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("TETHER_"))
            .collect();
        Self::from_sources(attrs, &env)
    }

    /// Build from the provider block and an explicit environment
    pub fn from_sources(
        attrs: &Attributes,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str, var: &str| -> Option<String> {
            attrs
                .get_non_empty(key)
                .or_else(|| env.get(var).filter(|v| !v.is_empty()).cloned())
        };

        let tenant = lookup("tenant", "TETHER_TENANT").ok_or(ConfigError::Missing("tenant"))?;
        let token = lookup("token", "TETHER_TOKEN").ok_or(ConfigError::Missing("token"))?;

        let timeout_secs = match attrs.get_int("timeout_secs") {
            Some(secs) if secs > 0 => secs as u64,
            Some(secs) => {
                return Err(ConfigError::Invalid {
                    name: "timeout_secs",
                    message: format!("must be positive, got {}", secs),
                });
            }
            None => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            tenant,
            stack_domain: lookup("stack_domain", "TETHER_STACK_DOMAIN")
                .unwrap_or_else(default_stack_domain),
            token,
            timeout_secs,
            endpoint: lookup("endpoint", "TETHER_ENDPOINT"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant.is_empty() {
            return Err(ConfigError::Missing("tenant"));
        }
        if self.token.is_empty() {
            return Err(ConfigError::Missing("token"));
        }
        if self.endpoint.is_none() {
            validate_tenant(&self.tenant).map_err(|message| ConfigError::Invalid {
                name: "tenant",
                message,
            })?;
        }
        Ok(())
    }

    /// API base URL without a trailing slash
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.api.{}/api/v1", self.tenant, self.stack_domain),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
