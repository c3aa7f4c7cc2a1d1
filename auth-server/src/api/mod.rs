pub(crate) mod accounts;
pub(crate) mod apps;
pub(crate) mod health;
pub(crate) mod oauth;

use crate::auth::resolve_principal;
use crate::state::AppState;
use axum::middleware;
use utoipa_axum::router::OpenApiRouter;

/// Combines all API routes into a single router
pub(super) fn router(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(health::router())
        .merge(oauth::router())
        .merge(accounts::router())
        .merge(apps::router())
        // Every request gets a principal; handlers decide what they require
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_principal,
        ))
}
