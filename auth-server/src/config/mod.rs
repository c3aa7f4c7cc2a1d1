pub(crate) use crate::config::oauth::OAuthConfig;
pub(crate) use crate::config::store::{StoreBackendKind, StoreConfig};
use confique::Config;

pub mod oauth;
pub mod store;

/// Main configuration structure for the auth server
#[derive(Debug, Config, Clone)]
pub struct Settings {
    /// The port the server will listen to (default: 8080)
    #[config(env = "AUTH_PORT", default = 8080)]
    pub port: u16,

    /// OAuth 2.0 grant configuration
    #[config(nested)]
    pub oauth: OAuthConfig,

    /// Persistence configuration
    #[config(nested)]
    pub store: StoreConfig,
}

impl Settings {
    /// Creates a new Settings instance from defaults and environment variables
    pub fn new() -> Result<Self, confique::Error> {
        Settings::builder().env().load()
    }

    /// Settings with every default applied and no environment lookups
    #[cfg(test)]
    pub fn for_test() -> Self {
        let mut settings = Settings::builder()
            .load()
            .expect("default settings should load");
        settings.port = 0; // Let the OS choose a port
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::builder().load().unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.oauth.access_token_ttl, 7200);
        assert_eq!(settings.store.backend, StoreBackendKind::InMemory);
        assert!(settings.store.redis_url.is_none());
    }

    #[test]
    fn test_settings_from_env() {
        std::env::set_var("AUTH_PORT", "9090");
        std::env::set_var("AUTH_OAUTH_ACCESS_TOKEN_TTL", "60");
        std::env::set_var("AUTH_STORE_BACKEND", "redis");
        std::env::set_var("AUTH_STORE_REDIS_URL", "redis://localhost:6379");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.oauth.access_token_ttl, 60);
        assert_eq!(settings.store.backend, StoreBackendKind::Redis);
        assert_eq!(
            settings.store.redis_url.as_deref(),
            Some("redis://localhost:6379")
        );

        std::env::remove_var("AUTH_PORT");
        std::env::remove_var("AUTH_OAUTH_ACCESS_TOKEN_TTL");
        std::env::remove_var("AUTH_STORE_BACKEND");
        std::env::remove_var("AUTH_STORE_REDIS_URL");
    }
}
