use confique::Config;
use serde::Deserialize;

/// Specifies which store backend holds clients, tokens and identity records
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackendKind {
    InMemory,
    Redis,
}

/// Configuration for the persistence layer
#[derive(Debug, Config, Clone)]
pub struct StoreConfig {
    /// Store backend: "in-memory" (default) or "redis"
    #[config(env = "AUTH_STORE_BACKEND", default = "in-memory")]
    pub backend: StoreBackendKind,

    /// Redis connection string, required for the redis backend
    #[config(env = "AUTH_STORE_REDIS_URL")]
    pub redis_url: Option<String>,
}
