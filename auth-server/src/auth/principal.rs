use crate::models::{AccountRecord, ApplicationRecord, TokenRecord, UserRecord};
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::convert::Infallible;
use std::fmt;
use thiserror::Error;

/// One piece of identity a request may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Token,
    Application,
    User,
    Account,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facet::Token => "token",
            Facet::Application => "application",
            Facet::User => "user",
            Facet::Account => "account",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("The request requires a resolved {0}")]
    MissingFacet(Facet),
    #[error("The access token is invalid")]
    Unauthenticated,
    #[error("The {0} behind the access token could not be loaded")]
    Unavailable(Facet),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// The identity resolved for the current request.
///
/// Written once by the resolver middleware and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Principal {
    pub token: Option<TokenRecord>,
    pub application: Option<ApplicationRecord>,
    pub user: Option<UserRecord>,
    pub account: Option<AccountRecord>,
    /// Facets left unset because the store failed while loading them
    pub unavailable: Vec<Facet>,
}

impl Principal {
    pub fn has(&self, facet: Facet) -> bool {
        match facet {
            Facet::Token => self.token.is_some(),
            Facet::Application => self.application.is_some(),
            Facet::User => self.user.is_some(),
            Facet::Account => self.account.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none()
            && self.application.is_none()
            && self.user.is_none()
            && self.account.is_none()
    }

    fn missing(&self, facet: Facet) -> AuthError {
        if self.unavailable.contains(&facet) {
            AuthError::Unavailable(facet)
        } else {
            AuthError::MissingFacet(facet)
        }
    }

    /// Succeeds only if every listed facet resolved. An empty list always passes.
    pub fn require(&self, facets: &[Facet]) -> Result<&Self, AuthError> {
        match facets.iter().find(|facet| !self.has(**facet)) {
            Some(missing) => Err(self.missing(*missing)),
            None => Ok(self),
        }
    }

    /// Succeeds if at least one facet resolved
    pub fn authenticated(&self) -> Result<&Self, AuthError> {
        if !self.is_empty() {
            return Ok(self);
        }
        match self.unavailable.first() {
            Some(facet) => Err(AuthError::Unavailable(*facet)),
            None => Err(AuthError::Unauthenticated),
        }
    }

    pub fn token(&self) -> Result<&TokenRecord, AuthError> {
        self.token.as_ref().ok_or_else(|| self.missing(Facet::Token))
    }

    pub fn application(&self) -> Result<&ApplicationRecord, AuthError> {
        self.application
            .as_ref()
            .ok_or_else(|| self.missing(Facet::Application))
    }

    pub fn user(&self) -> Result<&UserRecord, AuthError> {
        self.user.as_ref().ok_or_else(|| self.missing(Facet::User))
    }

    pub fn account(&self) -> Result<&AccountRecord, AuthError> {
        self.account.as_ref().ok_or_else(|| self.missing(Facet::Account))
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Principal>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credential;
    use chrono::{Duration, Utc};

    fn token_only() -> Principal {
        let now = Utc::now();
        Principal {
            token: Some(TokenRecord {
                id: "t1".to_string(),
                client_id: "c1".to_string(),
                user_id: Some("dangling".to_string()),
                redirect_uri: "http://localhost:8080".to_string(),
                scope: vec!["read".to_string()],
                credential: Credential::AccessToken {
                    access: "a".to_string(),
                    refresh: None,
                    refresh_expires_at: None,
                },
                created_at: now,
                expires_at: now + Duration::hours(1),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_require_user_fails_without_user() {
        let principal = token_only();
        assert_eq!(
            principal.require(&[Facet::Token, Facet::User]).unwrap_err(),
            AuthError::MissingFacet(Facet::User)
        );
        assert!(principal.require(&[Facet::Token]).is_ok());
        assert!(principal.require(&[]).is_ok());
    }

    #[test]
    fn test_authenticated_needs_any_facet() {
        assert_eq!(
            Principal::default().authenticated().unwrap_err(),
            AuthError::Unauthenticated
        );
        assert!(token_only().authenticated().is_ok());
        // The all-of gate with nothing required passes even for anonymous callers
        assert!(Principal::default().require(&[]).is_ok());
    }

    #[test]
    fn test_accessors() {
        let principal = token_only();
        assert_eq!(principal.token().unwrap().id, "t1");
        assert_eq!(
            principal.account().unwrap_err(),
            AuthError::MissingFacet(Facet::Account)
        );
    }

    #[test]
    fn test_auth_error_response() {
        let response = AuthError::MissingFacet(Facet::Account).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = AuthError::Unavailable(Facet::Account).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unavailable_facet_is_a_server_error() {
        let principal = Principal {
            unavailable: vec![Facet::User, Facet::Account],
            ..token_only()
        };
        assert_eq!(
            principal.require(&[Facet::Token, Facet::Account]).unwrap_err(),
            AuthError::Unavailable(Facet::Account)
        );
        assert!(principal.require(&[Facet::Token]).is_ok());
        assert_eq!(
            principal.user().unwrap_err(),
            AuthError::Unavailable(Facet::User)
        );
        assert_eq!(
            principal.application().unwrap_err(),
            AuthError::MissingFacet(Facet::Application)
        );

        let nothing_loaded = Principal {
            unavailable: vec![Facet::Token],
            ..Default::default()
        };
        assert_eq!(
            nothing_loaded.authenticated().unwrap_err(),
            AuthError::Unavailable(Facet::Token)
        );
    }

    #[tokio::test]
    async fn test_extractor_defaults_to_empty() {
        let (mut parts, _) = http::Request::builder()
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        let principal = Principal::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(principal.is_empty());

        parts.extensions.insert(token_only());
        let principal = Principal::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(principal.has(Facet::Token));
    }
}
