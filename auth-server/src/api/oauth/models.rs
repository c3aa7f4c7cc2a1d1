//! OAuth 2.0 request/response structures

use crate::models::TokenRecord;
use crate::oauth::{expires_in, GrantError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// OAuth 2.0 Authorization Request (Authorization Code Flow)
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorizationRequest {
    /// Response type - must be "code"
    #[serde(default)]
    pub response_type: String,
    /// Client identifier
    #[serde(default)]
    pub client_id: String,
    /// Redirect URI where authorization code will be sent
    #[serde(default)]
    pub redirect_uri: String,
    /// Requested scopes (space-separated)
    pub scope: Option<String>,
    /// State parameter for CSRF protection
    pub state: Option<String>,
    /// PKCE code challenge
    pub code_challenge: Option<String>,
    /// PKCE code challenge method, only "plain" is accepted
    pub code_challenge_method: Option<String>,
}

/// OAuth 2.0 Authorization Error Response
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizationError {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
    /// State parameter (if provided in request)
    pub state: Option<String>,
}

/// OAuth 2.0 Token Request (supports both Authorization Code and Client Credentials)
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type - "authorization_code" or "client_credentials"
    #[serde(default)]
    pub grant_type: String,
    /// Client identifier
    #[serde(default)]
    pub client_id: String,
    /// Client secret
    #[serde(default)]
    pub client_secret: String,
    /// Authorization code (for authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI (for authorization_code grant, must match authorization request)
    pub redirect_uri: Option<String>,
    /// PKCE code verifier (for authorization_code grant with PKCE)
    pub code_verifier: Option<String>,
    /// Optional requested scopes (space-separated)
    pub scope: Option<String>,
}

/// OAuth 2.0 Token Revocation Request (RFC 7009)
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevocationRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Access or refresh token to revoke
    #[serde(default)]
    pub token: String,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// The access token string
    pub access_token: String,
    /// Token type - always "Bearer"
    pub token_type: String,
    /// Token expiration in seconds
    pub expires_in: u64,
    /// Granted scopes (space-separated)
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Issue time (Unix time)
    pub created_at: i64,
}

impl TokenResponse {
    pub fn from_record(record: &TokenRecord, now: DateTime<Utc>) -> Self {
        Self {
            access_token: record.access_token().unwrap_or_default().to_string(),
            token_type: "Bearer".to_string(),
            expires_in: expires_in(record.expires_at, now),
            scope: record.scope_string(),
            refresh_token: record.refresh_token().map(str::to_string),
            created_at: record.created_at.timestamp(),
        }
    }
}

/// OAuth 2.0 Error Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OAuthError {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthError {
    /// Create an invalid_request error
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error: "invalid_request".to_string(),
            error_description: Some(description.to_string()),
        }
    }

    /// Create an unsupported_grant_type error
    pub fn unsupported_grant_type() -> Self {
        GrantError::UnsupportedGrantType.into()
    }
}

impl From<GrantError> for OAuthError {
    fn from(err: GrantError) -> Self {
        Self {
            error: err.error_code().to_string(),
            error_description: Some(err.description()),
        }
    }
}

impl AuthorizationError {
    pub fn from_grant_error(err: &GrantError, state: Option<String>) -> Self {
        Self {
            error: err.error_code().to_string(),
            error_description: Some(err.description()),
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credential;
    use chrono::Duration;

    #[test]
    fn test_token_response_from_record() {
        let now = Utc::now();
        let record = TokenRecord {
            id: "t1".to_string(),
            client_id: "c1".to_string(),
            user_id: None,
            redirect_uri: "http://localhost:8080".to_string(),
            scope: vec!["read".to_string(), "write".to_string()],
            credential: Credential::AccessToken {
                access: "access".to_string(),
                refresh: None,
                refresh_expires_at: None,
            },
            created_at: now,
            expires_at: now + Duration::seconds(7200),
        };

        let response = TokenResponse::from_record(&record, now);
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 7200);
        assert_eq!(response.scope, "read write");
        assert_eq!(response.created_at, now.timestamp());

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("refresh_token").is_none());
    }

    #[test]
    fn test_oauth_error_from_grant_error() {
        let error: OAuthError = GrantError::CodeAlreadyRedeemed.into();
        assert_eq!(error.error, "invalid_grant");
        assert_eq!(OAuthError::unsupported_grant_type().error, "unsupported_grant_type");
    }
}
