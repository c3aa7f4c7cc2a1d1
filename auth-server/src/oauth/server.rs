//! Grant flow engine: authorization-code and client-credentials grants

use super::{pkce, GrantError};
use crate::config::OAuthConfig;
use crate::models::{ClientRecord, Credential, TokenRecord};
use crate::store::Stores;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rand::Rng;
use subtle::ConstantTimeEq;
use url::Url;
use uuid::Uuid;

/// Step 1 of the authorization-code grant, after the resource owner signed in
#[derive(Debug, Clone, Default)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    /// Space separated; absent means everything the client may have
    pub scope: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Step 2 of the authorization-code grant
#[derive(Debug, Clone, Default)]
pub struct CodeExchange {
    pub client_id: String,
    pub client_secret: String,
    pub code: String,
    pub redirect_uri: String,
    pub code_verifier: Option<String>,
}

/// The one grant engine instance, built at startup and shared by handlers
#[derive(Clone)]
pub struct OAuthServer {
    stores: Stores,
    config: OAuthConfig,
}

impl OAuthServer {
    pub fn new(stores: Stores, config: OAuthConfig) -> Self {
        Self { stores, config }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Load the client and check `redirect_uri` against its registered domain.
    ///
    /// Nothing may be sent to `redirect_uri` before this succeeds.
    pub async fn validate_redirect(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<ClientRecord, GrantError> {
        let client = self
            .stores
            .clients
            .get_by_id(client_id)
            .await
            .map_err(GrantError::from_client_lookup)?;
        validate_redirect_uri(&client.domain, redirect_uri)?;
        Ok(client)
    }

    /// Issue a single-use authorization code for an authenticated resource owner
    pub async fn authorize(
        &self,
        user_id: &str,
        request: &AuthorizeRequest,
    ) -> Result<String, GrantError> {
        let client = self
            .validate_redirect(&request.client_id, &request.redirect_uri)
            .await?;
        let scope = self.resolve_scope(&client, request.scope.as_deref())?;

        let code_challenge = match request.code_challenge.as_deref() {
            Some(challenge) if !challenge.is_empty() => {
                pkce::CodeChallengeMethod::parse(request.code_challenge_method.as_deref())?;
                Some(challenge.to_string())
            }
            _ if request.code_challenge_method.is_some() => {
                return Err(GrantError::InvalidRequest(
                    "code_challenge_method given without code_challenge".to_string(),
                ))
            }
            _ => None,
        };

        let code = generate_secure_token();
        let now = Utc::now();
        let record = TokenRecord {
            id: Uuid::new_v4().to_string(),
            client_id: client.id.clone(),
            user_id: Some(user_id.to_string()),
            redirect_uri: request.redirect_uri.clone(),
            scope,
            credential: Credential::AuthorizationCode {
                code: code.clone(),
                code_challenge,
            },
            created_at: now,
            expires_at: now + lifetime(self.config.code_ttl()),
        };
        self.stores.tokens.set(&record).await?;

        info!(
            "Issued authorization code for client {} and user {}",
            client.id, user_id
        );
        Ok(code)
    }

    /// Redeem an authorization code for an access token.
    ///
    /// The code is claimed atomically before any of its bindings are checked,
    /// so a failed exchange also burns the code.
    pub async fn exchange(&self, request: &CodeExchange) -> Result<TokenRecord, GrantError> {
        let client = self
            .authenticate_client(&request.client_id, &request.client_secret)
            .await?;
        self.exchange_for_client(&client, request).await
    }

    async fn exchange_for_client(
        &self,
        client: &ClientRecord,
        request: &CodeExchange,
    ) -> Result<TokenRecord, GrantError> {
        let code = self
            .stores
            .tokens
            .redeem_code(&request.code, self.config.code_ttl())
            .await?;

        if code.client_id != client.id {
            warn!(
                "Client {} presented a code issued to client {}",
                client.id, code.client_id
            );
            return Err(GrantError::invalid_grant(
                "Authorization code was issued to another client",
            ));
        }
        if code.is_expired(Utc::now()) {
            return Err(GrantError::invalid_grant("Authorization code has expired"));
        }
        if code.redirect_uri != request.redirect_uri {
            return Err(GrantError::invalid_grant("Redirect URI mismatch"));
        }
        let challenge = match &code.credential {
            Credential::AuthorizationCode { code_challenge, .. } => code_challenge.as_deref(),
            Credential::AccessToken { .. } => None,
        };
        pkce::verify(challenge, request.code_verifier.as_deref())?;

        let token = self
            .issue_access_token(
                &client.id,
                code.user_id.clone(),
                &code.redirect_uri,
                code.scope.clone(),
                self.config.generate_refresh,
            )
            .await?;
        debug!("Authorization code exchanged for token {}", token.id);
        Ok(token)
    }

    /// Issue a token bound to the client itself, with no resource owner
    pub async fn client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: Option<&str>,
    ) -> Result<TokenRecord, GrantError> {
        let client = self.authenticate_client(client_id, client_secret).await?;
        let scope = self.resolve_scope(&client, scope)?;
        let token = self
            .issue_access_token(&client.id, None, &client.domain, scope, false)
            .await?;
        info!("Issued client credentials token for client {}", client.id);
        Ok(token)
    }

    /// Mint a user-bound token for an existing client without interactive sign-in.
    ///
    /// Either a usable token is returned or nothing is left behind: a code minted
    /// by the first step is discarded if the exchange fails.
    pub async fn generate_user_access_token(
        &self,
        client_id: &str,
        user_id: &str,
        redirect_uri: &str,
        scope: Option<&str>,
    ) -> Result<TokenRecord, GrantError> {
        let client = self
            .stores
            .clients
            .get_by_id(client_id)
            .await
            .map_err(GrantError::from_client_lookup)?;

        let code = self
            .authorize(
                user_id,
                &AuthorizeRequest {
                    client_id: client.id.clone(),
                    redirect_uri: redirect_uri.to_string(),
                    scope: scope.map(str::to_string),
                    ..Default::default()
                },
            )
            .await?;

        let exchange = CodeExchange {
            client_id: client.id.clone(),
            client_secret: client.secret.clone(),
            code,
            redirect_uri: redirect_uri.to_string(),
            code_verifier: None,
        };
        match self.exchange_for_client(&client, &exchange).await {
            Ok(token) => Ok(token),
            Err(err) => {
                self.discard_code(&exchange.code).await;
                Err(err)
            }
        }
    }

    /// Revoke an access or refresh token owned by the client.
    ///
    /// Unknown tokens and tokens of other clients are a successful no-op.
    pub async fn revoke(
        &self,
        client_id: &str,
        client_secret: &str,
        token: &str,
    ) -> Result<(), GrantError> {
        let client = self.authenticate_client(client_id, client_secret).await?;

        let record = match self.stores.tokens.get_by_access(token).await {
            Err(err) if err.is_not_found() => self.stores.tokens.get_by_refresh(token).await,
            other => other,
        };
        let record = match record {
            Ok(record) => record,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(GrantError::Server(err)),
        };

        if record.client_id != client.id {
            warn!(
                "Client {} tried to revoke a token of client {}",
                client.id, record.client_id
            );
            return Ok(());
        }
        self.stores.tokens.delete_by_id(&record.id).await?;
        info!("Revoked token {} for client {}", record.id, client.id);
        Ok(())
    }

    /// Look a client up and compare its secret in constant time
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<ClientRecord, GrantError> {
        let client = self
            .stores
            .clients
            .get_by_id(client_id)
            .await
            .map_err(GrantError::from_client_lookup)?;

        if !bool::from(client.secret.as_bytes().ct_eq(client_secret.as_bytes())) {
            debug!("Secret mismatch for client {}", client_id);
            return Err(GrantError::invalid_client());
        }
        Ok(client)
    }

    /// Requested scopes must be a subset of what the client may have
    fn resolve_scope(
        &self,
        client: &ClientRecord,
        requested: Option<&str>,
    ) -> Result<Vec<String>, GrantError> {
        let permitted = if client.scopes.is_empty() {
            self.config.get_default_scopes()
        } else {
            client.scopes.clone()
        };

        let mut granted: Vec<String> = Vec::new();
        for scope in requested.unwrap_or_default().split_whitespace() {
            if !permitted.iter().any(|p| p == scope) {
                return Err(GrantError::InvalidScope(format!(
                    "Scope '{}' is not permitted for this client",
                    scope
                )));
            }
            if !granted.iter().any(|g| g == scope) {
                granted.push(scope.to_string());
            }
        }

        if granted.is_empty() {
            Ok(permitted)
        } else {
            Ok(granted)
        }
    }

    async fn issue_access_token(
        &self,
        client_id: &str,
        user_id: Option<String>,
        redirect_uri: &str,
        scope: Vec<String>,
        with_refresh: bool,
    ) -> Result<TokenRecord, GrantError> {
        let now = Utc::now();
        let (refresh, refresh_expires_at) = if with_refresh {
            (
                Some(generate_secure_token()),
                Some(now + lifetime(self.config.refresh_token_ttl())),
            )
        } else {
            (None, None)
        };

        let record = TokenRecord {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            user_id,
            redirect_uri: redirect_uri.to_string(),
            scope,
            credential: Credential::AccessToken {
                access: generate_secure_token(),
                refresh,
                refresh_expires_at,
            },
            created_at: now,
            expires_at: now + lifetime(self.config.access_token_ttl()),
        };
        self.stores.tokens.set(&record).await?;
        Ok(record)
    }

    async fn discard_code(&self, code: &str) {
        match self.stores.tokens.take_where("code", code).await {
            Ok(record) => debug!("Discarded unredeemed code {}", record.id),
            Err(err) if err.is_not_found() => {}
            Err(err) => warn!("Failed to discard authorization code: {}", err),
        }
    }
}

/// Seconds remaining until `expires_at`, never negative
pub fn expires_in(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (expires_at - now).num_seconds().max(0) as u64
}

/// Upper bound for configured lifetimes, about a hundred years
const MAX_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

fn lifetime(ttl: std::time::Duration) -> Duration {
    let max = Duration::seconds(MAX_TTL_SECS);
    Duration::from_std(ttl).map_or(max, |ttl| ttl.min(max))
}

/// 256 random bits, base64url without padding
fn generate_secure_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The redirect URI must equal the registered domain or live on its host
/// (or a subdomain of it). A domain given as a full URL also pins the scheme
/// and port.
fn validate_redirect_uri(domain: &str, redirect_uri: &str) -> Result<(), GrantError> {
    let invalid = || GrantError::InvalidRedirectUri;

    let redirect = Url::parse(redirect_uri).map_err(|_| invalid())?;
    if redirect_uri == domain {
        return Ok(());
    }
    let host = redirect.host_str().ok_or_else(invalid)?;

    let registered_host = match Url::parse(domain) {
        Ok(registered) => {
            if registered.scheme() != redirect.scheme()
                || registered.port_or_known_default() != redirect.port_or_known_default()
            {
                return Err(invalid());
            }
            registered.host_str().ok_or_else(invalid)?.to_string()
        }
        Err(_) => domain.trim_end_matches('/').to_string(),
    };

    if host == registered_host || host.ends_with(&format!(".{}", registered_host)) {
        Ok(())
    } else {
        Err(invalid())
    }
}
