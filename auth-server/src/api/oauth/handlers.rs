//! OAuth 2.0 endpoint handlers

use crate::api::oauth::models::{
    AuthorizationError, AuthorizationRequest, OAuthError, RevocationRequest, TokenRequest,
    TokenResponse,
};
use crate::auth::ResourceOwner;
use crate::oauth::{AuthorizeRequest, CodeExchange, GrantError};
use crate::openapi::OAUTH_TAG;
use crate::state::AppState;
use axum::{
    extract::{Form, Query, Request, State},
    http::{
        header::{CACHE_CONTROL, PRAGMA},
        StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use log::{error, info, warn};
use url::Url;

/// OAuth 2.0 Authorization endpoint (RFC 6749 Section 4.1.1)
///
/// The resource owner must already be signed in; otherwise the request is
/// sent to the sign-in page.
#[utoipa::path(
    get,
    path = "/oauth/authorize",
    params(AuthorizationRequest),
    responses(
        (status = 303, description = "Redirect to sign-in, or to redirect_uri with a code or error"),
        (status = 400, description = "Invalid client or redirect_uri", body = OAuthError),
        (status = 500, description = "Internal server error", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn authorize(State(state): State<AppState>, request: Request) -> Response {
    let Query(params) = match Query::<AuthorizationRequest>::try_from_uri(request.uri()) {
        Ok(params) => params,
        Err(err) => {
            warn!("Malformed authorization request: {}", err);
            return error_response(
                StatusCode::BAD_REQUEST,
                OAuthError::invalid_request("Malformed authorization request"),
            );
        }
    };

    if params.client_id.is_empty() || params.redirect_uri.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("client_id and redirect_uri are required"),
        );
    }

    let Some(ResourceOwner(user_id)) = request.extensions().get::<ResourceOwner>().cloned() else {
        info!(
            "Authorization request from client {} without a signed-in user",
            params.client_id
        );
        return Redirect::to(&state.settings.oauth.sign_in_path).into_response();
    };

    if let Err(err) = state
        .oauth
        .validate_redirect(&params.client_id, &params.redirect_uri)
        .await
    {
        return unverified_redirect_response(err);
    }

    if params.response_type != "code" {
        return redirect_with_error(
            &params.redirect_uri,
            AuthorizationError::from_grant_error(&GrantError::UnsupportedResponseType, params.state),
        );
    }

    let grant = AuthorizeRequest {
        client_id: params.client_id,
        redirect_uri: params.redirect_uri,
        scope: params.scope,
        code_challenge: params.code_challenge,
        code_challenge_method: params.code_challenge_method,
    };

    match state.oauth.authorize(&user_id, &grant).await {
        Ok(code) => {
            // redirect_uri was validated against the client by the engine
            let mut url = match Url::parse(&grant.redirect_uri) {
                Ok(url) => url,
                Err(_) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        GrantError::InvalidRedirectUri.into(),
                    )
                }
            };
            url.query_pairs_mut().append_pair("code", &code);
            if let Some(state) = &params.state {
                url.query_pairs_mut().append_pair("state", state);
            }
            Redirect::to(url.as_str()).into_response()
        }
        // Never redirect to a URI that hasn't been checked against the client
        Err(
            err @ (GrantError::InvalidClient(_)
            | GrantError::InvalidRedirectUri
            | GrantError::Server(_)),
        ) => unverified_redirect_response(err),
        Err(err) => redirect_with_error(
            &grant.redirect_uri,
            AuthorizationError::from_grant_error(&err, params.state),
        ),
    }
}

/// OAuth 2.0 Token endpoint (RFC 6749)
/// Supports both Authorization Code and Client Credentials flows
#[utoipa::path(
    post,
    path = "/oauth/token",
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Access token issued successfully", body = TokenResponse),
        (status = 400, description = "Invalid request", body = OAuthError),
        (status = 401, description = "Invalid client credentials", body = OAuthError),
        (status = 500, description = "Internal server error", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn token(State(state): State<AppState>, Form(request): Form<TokenRequest>) -> Response {
    info!(
        "OAuth token request from client_id: {} with grant_type: {}",
        request.client_id, request.grant_type
    );

    if request.client_id.is_empty() || request.client_secret.is_empty() {
        warn!("Missing client credentials in token request");
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("client_id and client_secret are required"),
        );
    }

    let issued = match request.grant_type.as_str() {
        "authorization_code" => {
            let (Some(code), Some(redirect_uri)) = (request.code, request.redirect_uri) else {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    OAuthError::invalid_request("code and redirect_uri are required"),
                );
            };
            state
                .oauth
                .exchange(&CodeExchange {
                    client_id: request.client_id,
                    client_secret: request.client_secret,
                    code,
                    redirect_uri,
                    code_verifier: request.code_verifier,
                })
                .await
        }
        "client_credentials" => {
            state
                .oauth
                .client_credentials(
                    &request.client_id,
                    &request.client_secret,
                    request.scope.as_deref(),
                )
                .await
        }
        other => {
            warn!(
                "Unsupported grant type '{}' from client '{}'",
                other, request.client_id
            );
            return error_response(StatusCode::BAD_REQUEST, OAuthError::unsupported_grant_type());
        }
    };

    match issued {
        Ok(record) => (
            StatusCode::OK,
            [(CACHE_CONTROL, "no-store"), (PRAGMA, "no-cache")],
            Json(TokenResponse::from_record(&record, Utc::now())),
        )
            .into_response(),
        Err(err) => grant_error_response(err),
    }
}

/// OAuth 2.0 Token Revocation endpoint (RFC 7009)
#[utoipa::path(
    post,
    path = "/oauth/revoke",
    request_body(content = RevocationRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token revoked, or it was not known"),
        (status = 400, description = "Invalid request", body = OAuthError),
        (status = 401, description = "Invalid client credentials", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn revoke(
    State(state): State<AppState>,
    Form(request): Form<RevocationRequest>,
) -> Response {
    if request.token.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("token is required"),
        );
    }

    match state
        .oauth
        .revoke(&request.client_id, &request.client_secret, &request.token)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({}))).into_response(),
        Err(err) => grant_error_response(err),
    }
}

fn grant_error_response(err: GrantError) -> Response {
    match &err {
        GrantError::Server(source) => error!("Grant failed on store error: {}", source),
        other => warn!("Grant rejected: {}", other),
    }
    error_response(err.status_code(), err.into())
}

/// Errors from before the redirect URI is trusted are shown to the resource owner
fn unverified_redirect_response(err: GrantError) -> Response {
    match err {
        GrantError::Server(_) => grant_error_response(err),
        other => {
            warn!("Refusing to redirect authorization request: {}", other);
            error_response(StatusCode::BAD_REQUEST, other.into())
        }
    }
}

/// Helper function to create error responses
fn error_response(status: StatusCode, error: OAuthError) -> Response {
    (status, Json(error)).into_response()
}

/// Helper function to redirect with authorization error
fn redirect_with_error(redirect_uri: &str, error: AuthorizationError) -> Response {
    match Url::parse(redirect_uri) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("error", &error.error)
                .append_pair(
                    "error_description",
                    error.error_description.as_deref().unwrap_or(""),
                );

            if let Some(state) = &error.state {
                url.query_pairs_mut().append_pair("state", state);
            }

            Redirect::to(url.as_str()).into_response()
        }
        Err(_) => {
            // If redirect_uri is invalid, return error as JSON
            error_response(
                StatusCode::BAD_REQUEST,
                OAuthError::invalid_request("Invalid redirect_uri"),
            )
        }
    }
}
