//! Tether Core
//!
//! Core library for mapping declarative resource configuration onto a remote
//! service's CRUD API. Every resource kind shares an entity envelope, may carry
//! exactly one of several variant configurations, and is driven through the
//! same create/read/update/delete controller.

pub mod client;
pub mod controller;
pub mod convert;
pub mod error;
pub mod memory;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod variant;

pub use client::{ClientError, ClientResult, RemoteClient, WireRecord};
pub use controller::{ControllerError, ControllerResult, DeletePolicy, ResourceController, ResourceKind};
pub use convert::{MatchRule, ModelConverter};
pub use error::{ConversionError, ValidationError};
pub use provider::{AttributeCodec, KindHandler, ProviderError, ProviderResult, ResourceHandler, State};
pub use resource::{Attributes, AttributesExt, EntityDto, EntityRecord, TagDto, Value};
pub use variant::{Variant, VariantRegistry, VariantShape};
