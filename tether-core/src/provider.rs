//! Provider - The adapter the declarative host drives
//!
//! The host speaks in attribute maps: planned attributes before create and
//! update, prior state before read and delete. `ResourceHandler` is the
//! object-safe surface it calls; `KindHandler` implements it for any kind by
//! parsing attributes into a model, running the controller, and rendering
//! the result back into attributes.

use std::future::Future;
use std::pin::Pin;

use log::warn;

use crate::client::RemoteClient;
use crate::controller::{ControllerError, ResourceController, ResourceKind};
use crate::error::ValidationError;
use crate::resource::{Attributes, AttributesExt};
use crate::schema::ResourceSchema;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    /// Resource kind and, when known, the remote identifier
    pub resource: Option<(String, Option<String>)>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resource {
            Some((kind, Some(id))) => write!(f, "[{}.{}] {}", kind, id, self.message),
            Some((kind, None)) => write!(f, "[{}] {}", kind, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, kind: impl Into<String>, id: Option<&str>) -> Self {
        self.resource = Some((kind.into(), id.map(|s| s.to_string())));
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The controller failure behind this error, if any
    pub fn controller_error(&self) -> Option<&ControllerError> {
        self.cause
            .as_ref()
            .and_then(|e| e.downcast_ref::<ControllerError>())
    }

    /// True for local configuration errors detected before any remote call
    pub fn is_validation(&self) -> bool {
        matches!(
            self.controller_error(),
            Some(ControllerError::Validation(_))
        )
    }
}

impl From<ControllerError> for ProviderError {
    fn from(err: ControllerError) -> Self {
        ProviderError::new(err.to_string()).with_cause(err)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// State handed back to the host
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// Remote identifier
    pub identifier: Option<String>,
    pub attributes: Attributes,
    /// False when the record is gone and the host should forget it
    pub exists: bool,
}

impl State {
    pub fn removed() -> Self {
        Self {
            identifier: None,
            attributes: Attributes::new(),
            exists: false,
        }
    }

    pub fn existing(attributes: Attributes) -> Self {
        Self {
            identifier: attributes.get_string("id").map(|s| s.to_string()),
            attributes,
            exists: true,
        }
    }
}

/// Conversion between host attributes and a kind's model
pub trait AttributeCodec: ResourceKind {
    /// Schema the host validates planned attributes against
    fn schema(&self) -> ResourceSchema;

    /// Build a model from host attributes. Variant selection happens here.
    fn parse(&self, attrs: &Attributes) -> Result<Self::Model, ValidationError>;

    /// Render a model as host attributes
    fn render(&self, model: &Self::Model) -> Attributes;
}

/// Object-safe operations the host calls for one resource kind
pub trait ResourceHandler: Send + Sync {
    /// Resource kind name (e.g., "trust_provider")
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Check planned attributes without touching the remote service
    fn validate(&self, planned: &Attributes) -> ProviderResult<()>;

    fn create(&self, planned: &Attributes) -> BoxFuture<'_, ProviderResult<State>>;

    /// Returns `State::removed()` if the record no longer exists
    fn read(&self, prior: &Attributes) -> BoxFuture<'_, ProviderResult<State>>;

    fn update(
        &self,
        prior: &Attributes,
        planned: &Attributes,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    fn delete(&self, prior: &Attributes) -> BoxFuture<'_, ProviderResult<()>>;

    /// Synthesize full state from a bare identifier
    fn import(&self, identifier: &str) -> BoxFuture<'_, ProviderResult<State>>;
}

/// `ResourceHandler` for a single kind backed by a controller
pub struct KindHandler<K, C> {
    controller: ResourceController<K, C>,
}

impl<K, C> KindHandler<K, C>
where
    K: AttributeCodec,
    C: RemoteClient<K::Dto>,
{
    pub fn new(kind: K, client: C) -> Self {
        Self {
            controller: ResourceController::new(kind, client),
        }
    }

    pub fn controller(&self) -> &ResourceController<K, C> {
        &self.controller
    }

    fn parse_planned(&self, planned: &Attributes) -> ProviderResult<K::Model> {
        let kind = self.controller.kind();
        kind.schema()
            .validate(planned)
            .map_err(ValidationError::Schema)
            .and_then(|_| kind.parse(planned))
            .map_err(|e| self.error(ControllerError::from(e), planned.get_string("id")))
    }

    fn error(&self, err: ControllerError, id: Option<&str>) -> ProviderError {
        ProviderError::from(err).for_resource(K::NAME, id)
    }
}

fn identifier(attrs: &Attributes) -> Option<String> {
    attrs.get_non_empty("id")
}

impl<K, C> ResourceHandler for KindHandler<K, C>
where
    K: AttributeCodec + 'static,
    C: RemoteClient<K::Dto> + 'static,
{
    fn name(&self) -> &'static str {
        K::NAME
    }

    fn schema(&self) -> ResourceSchema {
        self.controller.kind().schema()
    }

    fn validate(&self, planned: &Attributes) -> ProviderResult<()> {
        self.parse_planned(planned).map(|_| ())
    }

    fn create(&self, planned: &Attributes) -> BoxFuture<'_, ProviderResult<State>> {
        let parsed = self.parse_planned(planned);
        Box::pin(async move {
            let model = parsed?;
            let created = self
                .controller
                .create(&model)
                .await
                .map_err(|e| self.error(e, None))?;
            Ok(State::existing(self.controller.kind().render(&created)))
        })
    }

    fn read(&self, prior: &Attributes) -> BoxFuture<'_, ProviderResult<State>> {
        let id = identifier(prior);
        let prior_model = match self.controller.kind().parse(prior) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(
                    "{}: prior state does not parse, secrets will not be carried over: {}",
                    K::NAME,
                    e
                );
                None
            }
        };
        Box::pin(async move {
            let Some(id) = id else {
                return Ok(State::removed());
            };
            match self.controller.read(&id, prior_model.as_ref()).await {
                Ok(model) => Ok(State::existing(self.controller.kind().render(&model))),
                Err(e) if e.is_not_found() => {
                    warn!("{} '{}' was deleted outside of this provider", K::NAME, id);
                    Ok(State::removed())
                }
                Err(e) => Err(self.error(e, Some(&id))),
            }
        })
    }

    fn update(
        &self,
        prior: &Attributes,
        planned: &Attributes,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = identifier(prior);
        let parsed = self.parse_planned(planned);
        Box::pin(async move {
            let model = parsed?;
            let id = id.unwrap_or_default();
            let updated = self
                .controller
                .update(&id, &model)
                .await
                .map_err(|e| self.error(e, Some(&id)))?;
            Ok(State::existing(self.controller.kind().render(&updated)))
        })
    }

    fn delete(&self, prior: &Attributes) -> BoxFuture<'_, ProviderResult<()>> {
        let id = identifier(prior);
        let is_active = prior.get_bool("is_active").unwrap_or(false);
        Box::pin(async move {
            let Some(id) = id else {
                return Ok(());
            };
            self.controller
                .delete(&id, is_active)
                .await
                .map_err(|e| self.error(e, Some(&id)))
        })
    }

    fn import(&self, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = identifier.to_string();
        Box::pin(async move {
            let model = self
                .controller
                .import(&id)
                .await
                .map_err(|e| self.error(e, Some(&id)))?;
            Ok(State::existing(self.controller.kind().render(&model)))
        })
    }
}
