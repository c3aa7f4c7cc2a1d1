use crate::config::{StoreBackendKind, StoreConfig};
use crate::models::{AccountRecord, ApplicationRecord, ClientRecord, TokenRecord, UserRecord};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod redis;
mod tokens;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,
    #[error("Record was already claimed")]
    Conflict,
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Absence of a record, as opposed to a failure talking to the backend
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Store trait defining the interface for all key-value backends.
///
/// Values are serialized to JSON before they reach the backend. Implementations
/// must be safe to share across request handlers (Send + Sync) and cheap to clone.
/// No caching is layered on top of a backend: every call reaches it.
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Store a value, optionally expiring it after `ttl`
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Retrieve a value
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError>;

    /// Atomically retrieve and remove a value.
    ///
    /// When several callers race on the same key, at most one of them
    /// observes the value.
    async fn take<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Performs a health check on the backend
    async fn health_check(&self) -> Result<(), String>;
}

/// Store implementation that provides a uniform interface regardless of backend.
///
/// The concrete backend is chosen at startup from the store configuration.
#[derive(Clone)]
pub enum Store {
    /// In-memory store using Moka
    InMemory(memory::InMemoryStore),
    /// Redis-based store
    Redis(redis::RedisStore),
}

#[async_trait::async_trait]
impl StoreBackend for Store {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        match self {
            Self::InMemory(store) => store.set(key, value, ttl).await,
            Self::Redis(store) => store.set(key, value, ttl).await,
        }
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self {
            Self::InMemory(store) => store.get(key).await,
            Self::Redis(store) => store.get(key).await,
        }
    }

    async fn take<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self {
            Self::InMemory(store) => store.take(key).await,
            Self::Redis(store) => store.take(key).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::InMemory(store) => store.delete(key).await,
            Self::Redis(store) => store.delete(key).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(store) => store.health_check().await,
            Self::Redis(store) => store.health_check().await,
        }
    }
}

/// Factory function to create the configured store backend.
pub async fn create_store(config: &StoreConfig) -> Result<Store, StoreError> {
    match config.backend {
        StoreBackendKind::InMemory => Ok(Store::InMemory(memory::InMemoryStore::new())),
        StoreBackendKind::Redis => {
            let url = match config.redis_url.as_deref() {
                Some(url) if !url.is_empty() => url,
                _ => {
                    return Err(StoreError::Config(
                        "Redis URL is required for the redis store".to_string(),
                    ))
                }
            };
            let store = redis::RedisStore::new(url)
                .await
                .map_err(StoreError::Config)?;
            Ok(Store::Redis(store))
        }
    }
}

/// A persisted record type with an opaque id and optional secondary indexes.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Key namespace for this record type
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Secondary lookups as (field, value) pairs. Values must be unique per field.
    fn indexes(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// How long the record may stay in the store; `None` keeps it until deleted
    fn ttl(&self) -> Option<Duration> {
        None
    }

    /// Invariants checked before the record is written
    fn validate(&self) -> Result<(), String> {
        if self.id().is_empty() {
            return Err(format!("{} id must not be empty", Self::KIND));
        }
        Ok(())
    }
}

/// Typed access to one record type on top of a store backend.
pub struct RecordStore<R> {
    backend: Store,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new(backend: Store) -> Self {
        Self {
            backend,
            _record: PhantomData,
        }
    }

    fn primary_key(id: &str) -> String {
        format!("{}:id:{}", R::KIND, id)
    }

    fn index_key(field: &str, value: &str) -> String {
        format!("{}:{}:{}", R::KIND, field, value)
    }

    /// Fetch a record by id; an unknown id is `StoreError::NotFound`
    pub async fn get_by_id(&self, id: &str) -> Result<R, StoreError> {
        self.backend
            .get(&Self::primary_key(id))
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// Insert or replace a record, keeping its index keys in step
    pub async fn set(&self, record: &R) -> Result<(), StoreError> {
        record.validate().map_err(StoreError::InvalidRecord)?;

        let key = Self::primary_key(record.id());
        let indexes = record.indexes();
        let ttl = record.ttl();

        if let Some(previous) = self.backend.get::<R>(&key).await? {
            for (field, value) in previous.indexes() {
                if !indexes.iter().any(|(f, v)| *f == field && *v == value) {
                    self.backend.delete(&Self::index_key(field, &value)).await?;
                }
            }
        }

        self.backend.set(&key, record, ttl).await?;
        for (field, value) in &indexes {
            self.backend
                .set(&Self::index_key(field, value), &record.id(), ttl)
                .await?;
        }
        Ok(())
    }

    /// Delete a record and its index keys. Deleting an unknown id is a no-op.
    pub async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let key = Self::primary_key(id);
        if let Some(record) = self.backend.get::<R>(&key).await? {
            for (field, value) in record.indexes() {
                self.backend.delete(&Self::index_key(field, &value)).await?;
            }
        }
        self.backend.delete(&key).await
    }

    /// Look a record up by one of its indexed fields
    pub async fn get_where(&self, field: &str, value: &str) -> Result<R, StoreError> {
        let id: String = self
            .backend
            .get(&Self::index_key(field, value))
            .await?
            .ok_or(StoreError::NotFound)?;
        let record = self.get_by_id(&id).await?;
        // The index may outlive a concurrent rewrite of the record
        if !record
            .indexes()
            .iter()
            .any(|(f, v)| *f == field && v == value)
        {
            return Err(StoreError::NotFound);
        }
        Ok(record)
    }

    /// Atomically claim a record through one of its indexed fields and delete it.
    ///
    /// Of several concurrent claims on the same value exactly one succeeds; the
    /// others see `StoreError::NotFound`.
    pub async fn take_where(&self, field: &str, value: &str) -> Result<R, StoreError> {
        let id: String = self
            .backend
            .take(&Self::index_key(field, value))
            .await?
            .ok_or(StoreError::NotFound)?;
        let record = self.get_by_id(&id).await?;
        self.delete_by_id(&id).await?;
        Ok(record)
    }
}

/// All record stores, sharing one backend
#[derive(Clone)]
pub struct Stores {
    pub clients: RecordStore<ClientRecord>,
    pub tokens: RecordStore<TokenRecord>,
    pub applications: RecordStore<ApplicationRecord>,
    pub users: RecordStore<UserRecord>,
    pub accounts: RecordStore<AccountRecord>,
    backend: Store,
}

impl Stores {
    pub fn new(backend: Store) -> Self {
        Self {
            clients: RecordStore::new(backend.clone()),
            tokens: RecordStore::new(backend.clone()),
            applications: RecordStore::new(backend.clone()),
            users: RecordStore::new(backend.clone()),
            accounts: RecordStore::new(backend.clone()),
            backend,
        }
    }

    /// Convenience constructor for an in-memory store
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(Store::InMemory(memory::InMemoryStore::new()))
    }

    /// The shared backend, for writing raw entries in tests
    #[cfg(test)]
    pub fn backend(&self) -> &Store {
        &self.backend
    }

    pub async fn health_check(&self) -> Result<(), String> {
        self.backend.health_check().await
    }
}
