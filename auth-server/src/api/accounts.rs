use crate::auth::{AuthError, Facet, Principal};
use crate::errors::ApiError;
use crate::openapi::ACCOUNTS_TAG;
use crate::state::AppState;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// The authenticated account as seen by its owner
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CredentialAccount {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    /// Scopes granted to the token used for this request
    pub scopes: Vec<String>,
}

/// Verify the token and return the account it acts for
#[utoipa::path(
    get,
    path = "/api/v1/accounts/verify_credentials",
    tag = ACCOUNTS_TAG,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The account behind the token", body = CredentialAccount),
        (status = 401, description = "No token, or the token has no account"),
        (status = 403, description = "The user or account may not act"),
        (status = 500, description = "The user or account could not be loaded")
    )
)]
pub(crate) async fn verify_credentials(principal: Principal) -> Result<Response, AuthError> {
    principal.require(&[Facet::Token, Facet::Account])?;
    let account = principal.account()?;
    let token = principal.token()?;

    if let Ok(user) = principal.user() {
        if !user.can_act() {
            return Ok(ApiError::forbidden("user is disabled or not yet approved").into_response());
        }
    }
    if account.is_suspended() {
        return Ok(ApiError::forbidden("account is suspended").into_response());
    }

    Ok(Json(CredentialAccount {
        id: account.id.clone(),
        username: account.username.clone(),
        display_name: account.display_name.clone(),
        locked: account.locked,
        created_at: account.created_at,
        scopes: token.scope.clone(),
    })
    .into_response())
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(verify_credentials))
}
