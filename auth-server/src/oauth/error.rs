use crate::store::StoreError;
use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the grant flow engine.
///
/// Store-level absence never leaks out of the engine: it is translated into
/// `InvalidClient` or `InvalidGrant` depending on what was being looked up.
#[derive(Debug, Error)]
pub enum GrantError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    InvalidClient(String),
    /// The redirect URI is malformed or not registered for the client
    #[error("Invalid redirect_uri")]
    InvalidRedirectUri,
    #[error("{0}")]
    InvalidGrant(String),
    #[error("Authorization code has already been redeemed")]
    CodeAlreadyRedeemed,
    #[error("{0}")]
    InvalidScope(String),
    #[error("Supported grant types: authorization_code, client_credentials")]
    UnsupportedGrantType,
    #[error("Only 'code' response type is supported")]
    UnsupportedResponseType,
    #[error("Store failure: {0}")]
    Server(#[source] StoreError),
}

impl GrantError {
    /// RFC 6749 error code sent on the wire
    pub fn error_code(&self) -> &'static str {
        match self {
            GrantError::InvalidRequest(_) | GrantError::InvalidRedirectUri => "invalid_request",
            GrantError::InvalidClient(_) => "invalid_client",
            GrantError::InvalidGrant(_) | GrantError::CodeAlreadyRedeemed => "invalid_grant",
            GrantError::InvalidScope(_) => "invalid_scope",
            GrantError::UnsupportedGrantType => "unsupported_grant_type",
            GrantError::UnsupportedResponseType => "unsupported_response_type",
            GrantError::Server(_) => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GrantError::InvalidClient(_) => StatusCode::UNAUTHORIZED,
            GrantError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Human readable description; store internals are not exposed
    pub fn description(&self) -> String {
        match self {
            GrantError::Server(_) => "The server encountered an internal error".to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn invalid_client() -> Self {
        GrantError::InvalidClient("Client authentication failed".to_string())
    }

    pub(crate) fn invalid_grant(description: &str) -> Self {
        GrantError::InvalidGrant(description.to_string())
    }

    /// Map a client lookup failure: absence means bad credentials
    pub(crate) fn from_client_lookup(err: StoreError) -> Self {
        if err.is_not_found() {
            Self::invalid_client()
        } else {
            GrantError::Server(err)
        }
    }
}

impl From<StoreError> for GrantError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => GrantError::invalid_grant("The provided grant is invalid"),
            StoreError::Conflict => GrantError::CodeAlreadyRedeemed,
            other => GrantError::Server(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_never_leak_absence() {
        let err: GrantError = StoreError::NotFound.into();
        assert_eq!(err.error_code(), "invalid_grant");

        let err = GrantError::from_client_lookup(StoreError::NotFound);
        assert_eq!(err.error_code(), "invalid_client");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_conflict_is_invalid_grant_on_the_wire() {
        let err: GrantError = StoreError::Conflict.into();
        assert!(matches!(err, GrantError::CodeAlreadyRedeemed));
        assert_eq!(err.error_code(), "invalid_grant");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_failure_is_server_error() {
        let err: GrantError = StoreError::Redis("connection refused".to_string()).into();
        assert_eq!(err.error_code(), "server_error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.description().contains("connection refused"));
    }
}
