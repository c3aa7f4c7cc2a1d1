//! OAuth 2.0 configuration

use confique::Config;
use std::time::Duration;

/// OAuth 2.0 grant configuration
#[derive(Debug, Config, Clone)]
pub struct OAuthConfig {
    /// Access token lifetime in seconds (default: 7200 = 2 hours)
    #[config(env = "AUTH_OAUTH_ACCESS_TOKEN_TTL", default = 7200)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds (default: 259200 = 72 hours)
    #[config(env = "AUTH_OAUTH_REFRESH_TOKEN_TTL", default = 259200)]
    pub refresh_token_ttl: u64,

    /// Authorization code lifetime in seconds (default: 600 = 10 minutes)
    #[config(env = "AUTH_OAUTH_CODE_TTL", default = 600)]
    pub code_ttl: u64,

    /// Issue refresh tokens alongside authorization-code access tokens (default: true)
    #[config(env = "AUTH_OAUTH_GENERATE_REFRESH", default = true)]
    pub generate_refresh: bool,

    /// Scopes granted to clients that don't declare their own, space separated (default: "read")
    #[config(env = "AUTH_OAUTH_DEFAULT_SCOPES", default = "read")]
    pub default_scopes: String,

    /// Where the authorize endpoint sends resource owners that haven't signed in yet
    #[config(env = "AUTH_OAUTH_SIGN_IN_PATH", default = "/auth/sign_in")]
    pub sign_in_path: String,
}

impl OAuthConfig {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl)
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl)
    }

    /// Get the default scopes as a vector
    pub fn get_default_scopes(&self) -> Vec<String> {
        self.default_scopes
            .split_whitespace()
            .map(|s| s.to_string())
            .collect()
    }
}
