//! Controller - Create/read/update/delete sequencing for one resource kind
//!
//! The controller owns its remote client and performs a single remote call per
//! operation (two for a delete that deactivates first). It never retries, and
//! a failed call leaves the caller's model untouched.

use log::{debug, info};
use thiserror::Error;

use crate::client::{ClientError, RemoteClient, WireRecord};
use crate::convert::ModelConverter;
use crate::error::{ConversionError, ValidationError};
use crate::resource::EntityRecord;

/// How a kind handles deletion of a record that is still active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse; the user must deactivate the record first
    RequireInactive,
    /// Issue a disable call, then delete
    DisableFirst,
}

/// A resource kind the controller can manage
pub trait ResourceKind:
    ModelConverter<Model: Clone + Send + Sync, Dto: WireRecord + Send + Sync + 'static> + Send + Sync
{
    /// Resource kind name (e.g., "trust_provider")
    const NAME: &'static str;

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::RequireInactive
    }

    /// Entity envelope of a model
    fn record<'a>(&self, model: &'a Self::Model) -> &'a EntityRecord;
}

/// Errors surfaced by controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The record was deleted outside of this provider
    #[error("{kind} '{id}' no longer exists")]
    NotFound { kind: String, id: String },

    #[error("{kind}: {source}")]
    Remote {
        kind: String,
        #[source]
        source: ClientError,
    },

    #[error("{kind} '{id}' is active; set is_active = false and apply before deleting it")]
    ActiveRecordDelete { kind: String, id: String },

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl ControllerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControllerError::NotFound { .. })
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Lifecycle operations for kind `K` against client `C`
pub struct ResourceController<K, C> {
    kind: K,
    client: C,
}

impl<K, C> ResourceController<K, C>
where
    K: ResourceKind,
    C: RemoteClient<K::Dto>,
{
    pub fn new(kind: K, client: C) -> Self {
        Self { kind, client }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Create the record and return the model as the service stored it
    pub async fn create(&self, model: &K::Model) -> ControllerResult<K::Model> {
        let dto = self.kind.to_dto(model, None)?;
        debug!("creating {} '{}'", K::NAME, self.kind.record(model).name);

        let response = self
            .client
            .create(&dto)
            .await
            .map_err(|e| self.remote(e))?;
        let created = self.kind.from_dto(response, Some(model))?;

        info!(
            "created {} '{}' ({})",
            K::NAME,
            self.kind.record(&created).name,
            self.kind.record(&created).external_id
        );
        Ok(created)
    }

    /// Refresh the record from the service
    ///
    /// Returns `ControllerError::NotFound` when the identifier no longer
    /// exists, so the host can drop its local copy.
    pub async fn read(&self, id: &str, prior: Option<&K::Model>) -> ControllerResult<K::Model> {
        debug!("reading {} '{}'", K::NAME, id);
        let response = self.client.get(id).await.map_err(|e| match e {
            ClientError::NotFound { .. } => ControllerError::NotFound {
                kind: K::NAME.to_string(),
                id: id.to_string(),
            },
            other => self.remote(other),
        })?;
        Ok(self.kind.from_dto(response, prior)?)
    }

    /// Replace the record named by `id` with `model`
    pub async fn update(&self, id: &str, model: &K::Model) -> ControllerResult<K::Model> {
        if id.is_empty() {
            return Err(ValidationError::MissingIdentifier {
                kind: K::NAME.to_string(),
            }
            .into());
        }

        let dto = self.kind.to_dto(model, Some(id))?;
        debug!("updating {} '{}'", K::NAME, id);

        let response = self
            .client
            .update(&dto)
            .await
            .map_err(|e| self.remote(e))?;
        let updated = self.kind.from_dto(response, Some(model))?;

        info!("updated {} '{}'", K::NAME, id);
        Ok(updated)
    }

    /// Delete the record, honoring the kind's policy for active records
    pub async fn delete(&self, id: &str, is_active: bool) -> ControllerResult<()> {
        if is_active {
            match self.kind.delete_policy() {
                DeletePolicy::RequireInactive => {
                    return Err(ControllerError::ActiveRecordDelete {
                        kind: K::NAME.to_string(),
                        id: id.to_string(),
                    });
                }
                DeletePolicy::DisableFirst => {
                    debug!("disabling {} '{}' before delete", K::NAME, id);
                    self.client
                        .disable(id)
                        .await
                        .map_err(|e| self.remote(e))?;
                }
            }
        }

        debug!("deleting {} '{}'", K::NAME, id);
        self.client.delete(id).await.map_err(|e| self.remote(e))?;
        info!("deleted {} '{}'", K::NAME, id);
        Ok(())
    }

    /// Build a complete model from a bare identifier
    pub async fn import(&self, id: &str) -> ControllerResult<K::Model> {
        self.read(id, None).await
    }

    fn remote(&self, source: ClientError) -> ControllerError {
        ControllerError::Remote {
            kind: K::NAME.to_string(),
            source,
        }
    }
}
