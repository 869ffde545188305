//! Tether Provider
//!
//! Resource kinds and REST client for the Tether workload identity service.
//!
//! ## Module Structure
//!
//! - `config` - Provider settings (tenant, token, endpoint)
//! - `client` - REST implementation of `RemoteClient`
//! - `kinds` - Trust provider, credential provider, access condition and role
//! - `resources` - TetherProvider and the resource type registry
//! - `utils` - Validation helpers

pub mod client;
pub mod config;
pub mod kinds;
pub mod resources;
pub mod utils;

// Re-export main types
pub use client::{RestClient, RestEndpoint};
pub use config::{ConfigError, ProviderConfig};
pub use resources::{TetherProvider, resource_configs};
