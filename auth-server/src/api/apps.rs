use crate::auth::{AuthError, Facet, Principal};
use crate::openapi::APPS_TAG;
use crate::state::AppState;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Public view of the application a token was issued to
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplicationView {
    pub name: String,
    pub website: Option<String>,
    pub vapid_key: Option<String>,
}

/// Verify the token and return the application it was issued to
#[utoipa::path(
    get,
    path = "/api/v1/apps/verify_credentials",
    tag = APPS_TAG,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The application behind the token", body = ApplicationView),
        (status = 401, description = "No token, or no application registered for its client"),
        (status = 500, description = "The application could not be loaded")
    )
)]
pub(crate) async fn verify_credentials(principal: Principal) -> Result<Json<ApplicationView>, AuthError> {
    principal.require(&[Facet::Token, Facet::Application])?;
    let application = principal.application()?;

    Ok(Json(ApplicationView {
        name: application.name.clone(),
        website: application.website.clone(),
        vapid_key: application.vapid_key.clone(),
    }))
}

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(verify_credentials))
}
