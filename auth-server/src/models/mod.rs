use crate::store::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest lifetime a token record is written with, so an already expired
/// record stays visible long enough to be reported as expired
const MIN_TOKEN_TTL: Duration = Duration::from_secs(1);

/// A registered OAuth client, keyed by its client id
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientRecord {
    /// Client identifier handed out at registration
    pub id: String,
    /// Shared secret the client authenticates with
    pub secret: String,
    /// Redirect domain the client registered with
    pub domain: String,
    /// User that owns this client, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Scopes this client may be granted; empty means the server defaults
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Record for ClientRecord {
    const KIND: &'static str = "oauth_client";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("client id must not be empty".to_string());
        }
        if self.secret.is_empty() {
            return Err("client secret must not be empty".to_string());
        }
        Ok(())
    }
}

/// What a token record grants: a pending authorization code or an issued access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    AuthorizationCode {
        code: String,
        /// PKCE challenge, plain method only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code_challenge: Option<String>,
    },
    AccessToken {
        access: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh_expires_at: Option<DateTime<Utc>>,
    },
}

/// Token storage model. Never mutated after issuance; revocation deletes it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenRecord {
    pub id: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Resource owner; absent for client-credentials tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub redirect_uri: String,
    /// Granted scopes, in request order
    pub scope: Vec<String>,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn access_token(&self) -> Option<&str> {
        match &self.credential {
            Credential::AccessToken { access, .. } => Some(access),
            Credential::AuthorizationCode { .. } => None,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        match &self.credential {
            Credential::AccessToken { refresh, .. } => refresh.as_deref(),
            Credential::AuthorizationCode { .. } => None,
        }
    }

    /// When the last credential on this record stops being usable
    pub fn usable_until(&self) -> DateTime<Utc> {
        match &self.credential {
            Credential::AccessToken {
                refresh_expires_at: Some(refresh_expires_at),
                ..
            } => self.expires_at.max(*refresh_expires_at),
            _ => self.expires_at,
        }
    }

    /// Scopes joined the way they travel on the wire
    pub fn scope_string(&self) -> String {
        self.scope.join(" ")
    }
}

impl Record for TokenRecord {
    const KIND: &'static str = "oauth_token";

    fn id(&self) -> &str {
        &self.id
    }

    fn ttl(&self) -> Option<Duration> {
        let remaining = (self.usable_until() - Utc::now())
            .to_std()
            .unwrap_or_default();
        Some(remaining.max(MIN_TOKEN_TTL))
    }

    fn indexes(&self) -> Vec<(&'static str, String)> {
        match &self.credential {
            Credential::AuthorizationCode { code, .. } => vec![("code", code.clone())],
            Credential::AccessToken {
                access, refresh, ..
            } => {
                let mut indexes = vec![("access", access.clone())];
                if let Some(refresh) = refresh {
                    indexes.push(("refresh", refresh.clone()));
                }
                indexes
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() || self.client_id.is_empty() {
            return Err("token id and client id must not be empty".to_string());
        }
        let empty_secret = match &self.credential {
            Credential::AuthorizationCode { code, .. } => code.is_empty(),
            Credential::AccessToken { access, .. } => access.is_empty(),
        };
        if empty_secret {
            return Err("token credential must not be empty".to_string());
        }
        Ok(())
    }
}

/// Application metadata registered alongside a client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApplicationRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub redirect_uri: String,
    /// Client this application is bound to (1:1)
    pub client_id: String,
    pub scopes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vapid_key: Option<String>,
}

impl Record for ApplicationRecord {
    const KIND: &'static str = "application";

    fn id(&self) -> &str {
        &self.id
    }

    fn indexes(&self) -> Vec<(&'static str, String)> {
        vec![("client_id", self.client_id.clone())]
    }
}

/// Local user credentials, linked 1:1 to an account
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    /// Hash produced by the external password service
    pub encrypted_password: String,
    pub account_id: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Whether this user may act through the client API at all
    pub fn can_act(&self) -> bool {
        !self.disabled && self.approved
    }
}

impl Record for UserRecord {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }

    fn indexes(&self) -> Vec<(&'static str, String)> {
        vec![("email", self.email.clone())]
    }
}

/// Public profile identity of a local user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccountRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }
}

impl Record for AccountRecord {
    const KIND: &'static str = "account";

    fn id(&self) -> &str {
        &self.id
    }
}
