use crate::auth::PrincipalResolver;
use crate::config::Settings;
use crate::oauth::OAuthServer;
use crate::store::{create_store, StoreError, Stores};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub stores: Stores,
    pub oauth: Arc<OAuthServer>,
    pub resolver: Arc<PrincipalResolver>,
}

impl AppState {
    /// Connect the configured store backend and build the shared services on top of it
    pub async fn new(settings: Settings) -> Result<Self, StoreError> {
        let backend = create_store(&settings.store).await?;
        Ok(Self::with_stores(settings, Stores::new(backend)))
    }

    pub fn with_stores(settings: Settings, stores: Stores) -> Self {
        let oauth = OAuthServer::new(stores.clone(), settings.oauth.clone());
        let resolver = PrincipalResolver::new(stores.clone());
        Self {
            settings: Arc::new(settings),
            stores,
            oauth: Arc::new(oauth),
            resolver: Arc::new(resolver),
        }
    }

    /// Check if all components are healthy
    pub async fn health_check(&self) -> Result<(), String> {
        self.stores.health_check().await
    }
}
