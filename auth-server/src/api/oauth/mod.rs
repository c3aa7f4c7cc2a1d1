//! OAuth 2.0 Authorization Server endpoints
//!
//! ## Supported OAuth 2.0 Flows
//! - Authorization Code Grant with optional PKCE, plain method only (RFC 6749 Section 4.1, RFC 7636)
//! - Client Credentials Grant (RFC 6749 Section 4.4)
//! - Token Revocation (RFC 7009)
//!
//! Sign-in and consent happen in front of this service; the authorize endpoint
//! expects the signed-in user as a [`ResourceOwner`](crate::auth::ResourceOwner)
//! request extension.

pub mod handlers;
pub mod models;

use crate::state::AppState;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates OAuth 2.0 routes
pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::authorize))
        .routes(routes!(handlers::token))
        .routes(routes!(handlers::revoke))
}
