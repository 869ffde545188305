//! In-memory remote
//!
//! Stores DTOs in process and records every call made against it. Used as
//! the mock remote in tests and by hosts that run without network access.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::client::{ClientError, ClientResult, RemoteClient, WireRecord};

/// A call received by the in-memory remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create,
    Get(String),
    Update(String),
    Delete(String),
    Disable(String),
}

/// In-memory implementation of `RemoteClient`
pub struct InMemoryClient<D> {
    prefix: String,
    default_active: bool,
    records: Mutex<BTreeMap<String, D>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    response_filter: Option<fn(D) -> D>,
    pending_failure: Mutex<Option<ClientError>>,
}

impl<D: WireRecord + Clone> InMemoryClient<D> {
    /// Identifiers are assigned as `"{prefix}-{n}"`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            default_active: false,
            records: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            response_filter: None,
            pending_failure: Mutex::new(None),
        }
    }

    /// Active flag given to records created without one
    pub fn with_default_active(mut self, is_active: bool) -> Self {
        self.default_active = is_active;
        self
    }

    /// Transform every response before it is returned (e.g. strip secrets)
    pub fn with_response_filter(mut self, filter: fn(D) -> D) -> Self {
        self.response_filter = Some(filter);
        self
    }

    /// Store a record directly, bypassing the call log
    pub fn insert(&self, dto: D) {
        let id = dto.external_id().to_string();
        lock(&self.records).insert(id, dto);
    }

    /// Stored copy of a record, unfiltered
    pub fn record(&self, id: &str) -> Option<D> {
        lock(&self.records).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: ClientError) {
        *lock(&self.pending_failure) = Some(error);
    }

    fn begin(&self, call: Call) -> ClientResult<()> {
        lock(&self.calls).push(call);
        match lock(&self.pending_failure).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn respond(&self, dto: D) -> D {
        match self.response_filter {
            Some(filter) => filter(dto),
            None => dto,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl<D> RemoteClient<D> for InMemoryClient<D>
where
    D: WireRecord + Clone + Send + Sync + 'static,
{
    async fn create(&self, dto: &D) -> ClientResult<D> {
        self.begin(Call::Create)?;

        let id = format!(
            "{}-{}",
            self.prefix,
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        let mut stored = dto.clone();
        let entity = stored.entity_mut();
        entity.external_id = id.clone();
        entity.is_active.get_or_insert(self.default_active);

        lock(&self.records).insert(id, stored.clone());
        Ok(self.respond(stored))
    }

    async fn get(&self, id: &str) -> ClientResult<D> {
        self.begin(Call::Get(id.to_string()))?;
        let stored = lock(&self.records)
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::not_found(id))?;
        Ok(self.respond(stored))
    }

    async fn update(&self, dto: &D) -> ClientResult<D> {
        let id = dto.external_id().to_string();
        self.begin(Call::Update(id.clone()))?;

        let mut records = lock(&self.records);
        let existing = records
            .get_mut(&id)
            .ok_or_else(|| ClientError::not_found(&id))?;
        let is_active = existing.entity().is_active;

        let mut stored = dto.clone();
        if stored.entity().is_active.is_none() {
            stored.entity_mut().is_active = is_active;
        }
        *existing = stored.clone();
        drop(records);

        Ok(self.respond(stored))
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        self.begin(Call::Delete(id.to_string()))?;
        lock(&self.records)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(id))
    }

    async fn disable(&self, id: &str) -> ClientResult<D> {
        self.begin(Call::Disable(id.to_string()))?;
        let mut records = lock(&self.records);
        let existing = records
            .get_mut(id)
            .ok_or_else(|| ClientError::not_found(id))?;
        existing.entity_mut().is_active = Some(false);
        let stored = existing.clone();
        drop(records);

        Ok(self.respond(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::EntityDto;

    #[derive(Debug, Clone, PartialEq)]
    struct Dto {
        entity: EntityDto,
        secret: String,
    }

    impl WireRecord for Dto {
        fn entity(&self) -> &EntityDto {
            &self.entity
        }

        fn entity_mut(&mut self) -> &mut EntityDto {
            &mut self.entity
        }
    }

    fn dto(name: &str) -> Dto {
        Dto {
            entity: EntityDto {
                name: name.to_string(),
                ..Default::default()
            },
            secret: "s3cr3t".to_string(),
        }
    }

    fn strip_secret(mut dto: Dto) -> Dto {
        dto.secret.clear();
        dto
    }

    #[tokio::test]
    async fn create_assigns_identifier_and_default_active() {
        let client = InMemoryClient::new("rec").with_default_active(true);
        let created = client.create(&dto("a")).await.unwrap();
        assert_eq!(created.entity.external_id, "rec-1");
        assert_eq!(created.entity.is_active, Some(true));

        let second = client.create(&dto("b")).await.unwrap();
        assert_eq!(second.entity.external_id, "rec-2");
        assert_eq!(client.len(), 2);
    }

    #[tokio::test]
    async fn response_filter_applies_to_responses_only() {
        let client = InMemoryClient::new("rec").with_response_filter(strip_secret);
        let created = client.create(&dto("a")).await.unwrap();
        assert_eq!(created.secret, "");
        assert_eq!(client.record("rec-1").unwrap().secret, "s3cr3t");
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let client: InMemoryClient<Dto> = InMemoryClient::new("rec");
        assert!(client.get("nope").await.unwrap_err().is_not_found());
        assert!(client.delete("nope").await.unwrap_err().is_not_found());
        assert_eq!(
            client.calls(),
            vec![Call::Get("nope".to_string()), Call::Delete("nope".to_string())]
        );
    }

    #[tokio::test]
    async fn update_keeps_active_flag_when_unset() {
        let client = InMemoryClient::new("rec").with_default_active(true);
        let mut created = client.create(&dto("a")).await.unwrap();
        created.entity.is_active = None;
        created.entity.name = "renamed".to_string();

        let updated = client.update(&created).await.unwrap();
        assert_eq!(updated.entity.name, "renamed");
        assert_eq!(updated.entity.is_active, Some(true));
    }

    #[tokio::test]
    async fn disable_clears_active_flag() {
        let client = InMemoryClient::new("rec").with_default_active(true);
        client.create(&dto("a")).await.unwrap();
        let disabled = client.disable("rec-1").await.unwrap();
        assert_eq!(disabled.entity.is_active, Some(false));
    }

    #[tokio::test]
    async fn fail_next_fails_once() {
        let client = InMemoryClient::new("rec");
        client.fail_next(ClientError::Transport("reset".to_string()));
        assert!(client.create(&dto("a")).await.is_err());
        assert!(client.create(&dto("a")).await.is_ok());
        assert_eq!(client.call_count(), 2);
    }
}
