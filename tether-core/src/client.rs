//! Client - The remote API the controller drives
//!
//! One `RemoteClient<D>` exists per resource kind, parameterized by that
//! kind's DTO. Implementations perform exactly one request per call.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::resource::EntityDto;

/// A DTO that carries the common entity envelope
pub trait WireRecord {
    fn entity(&self) -> &EntityDto;
    fn entity_mut(&mut self) -> &mut EntityDto;

    fn external_id(&self) -> &str {
        &self.entity().external_id
    }
}

/// Errors returned by the remote API client
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// The identifier does not exist remotely
    #[error("Record not found: {id}")]
    NotFound { id: String },

    /// The service rejected the request
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request or response body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Result type for remote calls
pub type ClientResult<T> = Result<T, ClientError>;

/// Remote API for one resource kind
#[async_trait]
pub trait RemoteClient<D: Send + Sync + 'static>: Send + Sync {
    /// Create a record; the response carries the assigned identifier
    async fn create(&self, dto: &D) -> ClientResult<D>;

    /// Fetch a record by identifier
    async fn get(&self, id: &str) -> ClientResult<D>;

    /// Replace the record named by the DTO's identifier
    async fn update(&self, dto: &D) -> ClientResult<D>;

    /// Delete a record by identifier
    async fn delete(&self, id: &str) -> ClientResult<()>;

    /// Mark a record inactive
    async fn disable(&self, id: &str) -> ClientResult<D>;
}

/// Shared clients, so a caller can keep a handle to the same remote
#[async_trait]
impl<D, C> RemoteClient<D> for Arc<C>
where
    D: Send + Sync + 'static,
    C: RemoteClient<D> + ?Sized,
{
    async fn create(&self, dto: &D) -> ClientResult<D> {
        (**self).create(dto).await
    }

    async fn get(&self, id: &str) -> ClientResult<D> {
        (**self).get(id).await
    }

    async fn update(&self, dto: &D) -> ClientResult<D> {
        (**self).update(dto).await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        (**self).delete(id).await
    }

    async fn disable(&self, id: &str) -> ClientResult<D> {
        (**self).disable(id).await
    }
}
