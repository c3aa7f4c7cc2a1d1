use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const OAUTH_TAG: &str = "OAuth 2.0";
pub(crate) const ACCOUNTS_TAG: &str = "Accounts API";
pub(crate) const APPS_TAG: &str = "Apps API";

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi
            .components
            .get_or_insert_with(Default::default)
            .add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&BearerSecurity),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = OAUTH_TAG, description = "Token issuance and revocation"),
        (name = ACCOUNTS_TAG, description = "Endpoints acting for a signed-in account"),
        (name = APPS_TAG, description = "Endpoints acting for a registered application"),
    ),
    info(
        title = "Auth Server API",
        description = "OAuth 2.0 token issuance and bearer token authentication",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::config::Settings;
    use crate::state::AppState;
    use crate::store::Stores;
    use utoipa_axum::router::OpenApiRouter;

    #[test]
    fn test_openapi_lists_routes() {
        let state = AppState::with_stores(Settings::for_test(), Stores::in_memory());
        let (_, doc) = OpenApiRouter::with_openapi(ApiDoc::openapi())
            .merge(api::router(&state))
            .split_for_parts();

        for path in [
            "/health",
            "/ready",
            "/oauth/token",
            "/oauth/authorize",
            "/oauth/revoke",
            "/api/v1/accounts/verify_credentials",
            "/api/v1/apps/verify_credentials",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
        assert!(components.schemas.contains_key("TokenResponse"));
    }
}
