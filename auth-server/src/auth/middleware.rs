use super::{Facet, Principal};
use crate::models::{AccountRecord, ApplicationRecord, TokenRecord, UserRecord};
use crate::oauth::{BearerOutcome, BearerValidator};
use crate::state::AppState;
use crate::store::{StoreError, Stores};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::{HeaderMap, Uri};
use log::{debug, error, trace, warn};

/// Expands a bearer token into the identity facets it points at
#[derive(Clone)]
pub struct PrincipalResolver {
    validator: BearerValidator,
    stores: Stores,
}

impl PrincipalResolver {
    pub fn new(stores: Stores) -> Self {
        Self {
            validator: BearerValidator::new(stores.tokens.clone()),
            stores,
        }
    }

    /// Build the principal for one request.
    ///
    /// Every facet is resolved on its own. Missing records leave their facet
    /// unset; store failures leave it unset and mark it unavailable, so the
    /// gate can tell the two apart.
    pub async fn resolve(&self, headers: &HeaderMap, uri: &Uri) -> Principal {
        let token = match self.validator.validate(headers, uri).await {
            Ok(BearerOutcome::Valid(token)) => token,
            Ok(BearerOutcome::Absent) => return Principal::default(),
            Ok(BearerOutcome::Invalid) => {
                debug!("Request carries an invalid bearer token, continuing anonymously");
                return Principal::default();
            }
            Err(err) => {
                error!("Failed to look up bearer token: {}", err);
                return Principal {
                    unavailable: vec![Facet::Token, Facet::Application, Facet::User, Facet::Account],
                    ..Default::default()
                };
            }
        };
        trace!("Resolved token {} for client {}", token.id, token.client_id);

        let mut principal = Principal::default();

        match self.resolve_user(&token).await {
            Ok(Some(user)) => {
                match self.resolve_account(&user).await {
                    Ok(account) => principal.account = account,
                    Err(err) => {
                        error!("Failed to load account {}: {}", user.account_id, err);
                        principal.unavailable.push(Facet::Account);
                    }
                }
                principal.user = Some(user);
            }
            Ok(None) => {}
            Err(err) => {
                error!("Failed to load user for token {}: {}", token.id, err);
                principal.unavailable.extend([Facet::User, Facet::Account]);
            }
        }

        match self.resolve_application(&token).await {
            Ok(application) => principal.application = application,
            Err(err) => {
                error!("Failed to load application of client {}: {}", token.client_id, err);
                principal.unavailable.push(Facet::Application);
            }
        }

        principal.token = Some(token);
        principal
    }

    async fn resolve_user(&self, token: &TokenRecord) -> Result<Option<UserRecord>, StoreError> {
        let Some(user_id) = token.user_id.as_deref() else {
            return Ok(None);
        };
        match self.stores.users.get_by_id(user_id).await {
            Ok(user) => {
                trace!("Resolved user {}", user.id);
                Ok(Some(user))
            }
            Err(err) if err.is_not_found() => {
                warn!("Token {} references unknown user {}", token.id, user_id);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn resolve_account(&self, user: &UserRecord) -> Result<Option<AccountRecord>, StoreError> {
        match self.stores.accounts.get_by_id(&user.account_id).await {
            Ok(account) => {
                trace!("Resolved account {}", account.id);
                Ok(Some(account))
            }
            Err(err) if err.is_not_found() => {
                warn!("User {} references unknown account {}", user.id, user.account_id);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn resolve_application(
        &self,
        token: &TokenRecord,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        match self
            .stores
            .applications
            .get_where("client_id", &token.client_id)
            .await
        {
            Ok(application) => {
                trace!("Resolved application {}", application.id);
                Ok(Some(application))
            }
            Err(err) if err.is_not_found() => {
                warn!("No application registered for client {}", token.client_id);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Resolves the request's principal and stores it in the request extensions
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = state
        .resolver
        .resolve(request.headers(), request.uri())
        .await;

    request.extensions_mut().insert(principal);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::store::{Record, StoreBackend};
    use crate::test_utils::{seed_records, TEST_APPLICATION_ID, TEST_CLIENT_ID, TEST_USER_ID};
    use http::header::AUTHORIZATION;

    async fn resolver() -> (PrincipalResolver, Stores) {
        let stores = Stores::in_memory();
        seed_records(&stores).await;
        (PrincipalResolver::new(stores.clone()), stores)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
        headers
    }

    async fn issue(stores: &Stores, user_id: Option<&str>) -> String {
        let server = crate::oauth::OAuthServer::new(
            stores.clone(),
            crate::config::Settings::for_test().oauth,
        );
        let token = match user_id {
            Some(user_id) => server
                .generate_user_access_token(TEST_CLIENT_ID, user_id, "http://localhost:8080", None)
                .await
                .unwrap(),
            None => server
                .client_credentials(TEST_CLIENT_ID, crate::test_utils::TEST_CLIENT_SECRET, None)
                .await
                .unwrap(),
        };
        token.access_token().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_anonymous_request() {
        let (resolver, _) = resolver().await;
        let principal = resolver
            .resolve(&HeaderMap::new(), &Uri::from_static("/"))
            .await;
        assert!(principal.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_token_resolves_nothing() {
        let (resolver, _) = resolver().await;
        let principal = resolver
            .resolve(&bearer("not-a-token"), &Uri::from_static("/"))
            .await;
        assert!(principal.is_empty());
    }

    #[tokio::test]
    async fn test_full_resolution() {
        let (resolver, stores) = resolver().await;
        let access = issue(&stores, Some(TEST_USER_ID)).await;

        let principal = resolver
            .resolve(&bearer(&access), &Uri::from_static("/"))
            .await;
        assert!(principal.token.is_some());
        assert_eq!(principal.user.unwrap().id, TEST_USER_ID);
        assert!(principal.account.is_some());
        assert_eq!(principal.application.unwrap().client_id, TEST_CLIENT_ID);
    }

    #[tokio::test]
    async fn test_dangling_user_is_tolerated() {
        let (resolver, stores) = resolver().await;
        let access = issue(&stores, Some("user-that-does-not-exist")).await;

        let principal = resolver
            .resolve(&bearer(&access), &Uri::from_static("/"))
            .await;
        assert!(principal.token.is_some());
        assert!(principal.user.is_none());
        assert!(principal.account.is_none());
        assert!(principal.application.is_some());
        assert!(principal.unavailable.is_empty());
    }

    #[tokio::test]
    async fn test_user_store_failure_leaves_other_facets() {
        let (resolver, stores) = resolver().await;
        let access = issue(&stores, Some(TEST_USER_ID)).await;
        // An entry that no longer decodes fails the lookup itself
        stores
            .backend()
            .set(
                &format!("{}:id:{}", UserRecord::KIND, TEST_USER_ID),
                &"not a user",
                None,
            )
            .await
            .unwrap();

        let principal = resolver
            .resolve(&bearer(&access), &Uri::from_static("/"))
            .await;
        assert!(principal.token.is_some());
        assert!(principal.application.is_some());
        assert!(principal.user.is_none());
        assert!(principal.account.is_none());
        assert_eq!(principal.unavailable, vec![Facet::User, Facet::Account]);
        assert_eq!(
            principal.require(&[Facet::Token, Facet::Account]).unwrap_err(),
            AuthError::Unavailable(Facet::Account)
        );
        assert!(principal.require(&[Facet::Token, Facet::Application]).is_ok());
    }

    #[tokio::test]
    async fn test_application_store_failure_leaves_other_facets() {
        let (resolver, stores) = resolver().await;
        let access = issue(&stores, Some(TEST_USER_ID)).await;
        stores
            .backend()
            .set(
                &format!("{}:id:{}", ApplicationRecord::KIND, TEST_APPLICATION_ID),
                &42,
                None,
            )
            .await
            .unwrap();

        let principal = resolver
            .resolve(&bearer(&access), &Uri::from_static("/"))
            .await;
        assert!(principal.user.is_some());
        assert!(principal.account.is_some());
        assert!(principal.application.is_none());
        assert_eq!(principal.unavailable, vec![Facet::Application]);
    }

    #[tokio::test]
    async fn test_client_credentials_token_has_no_user() {
        let (resolver, stores) = resolver().await;
        let access = issue(&stores, None).await;

        let uri: Uri = format!("/?access_token={}", access).parse().unwrap();
        let principal = resolver.resolve(&HeaderMap::new(), &uri).await;
        assert!(principal.token.is_some());
        assert!(principal.user.is_none());
        assert!(principal.application.is_some());
    }

    #[tokio::test]
    async fn test_missing_application_is_tolerated() {
        let (resolver, stores) = resolver().await;
        let access = issue(&stores, Some(TEST_USER_ID)).await;
        let application = stores
            .applications
            .get_where("client_id", TEST_CLIENT_ID)
            .await
            .unwrap();
        stores.applications.delete_by_id(&application.id).await.unwrap();

        let principal = resolver
            .resolve(&bearer(&access), &Uri::from_static("/"))
            .await;
        assert!(principal.application.is_none());
        assert!(principal.user.is_some());
    }
}
