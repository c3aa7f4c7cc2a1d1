use crate::config::Settings;
use crate::create_app;
use crate::models::{AccountRecord, ApplicationRecord, ClientRecord, UserRecord};
use crate::state::AppState;
use crate::store::Stores;
use axum::body::Body;
use axum::Router;
use chrono::Utc;
use http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_CLIENT_ID: &str = "a-known-client-id";
pub const TEST_CLIENT_SECRET: &str = "some-secret";
pub const TEST_USER_ID: &str = "01F8MGVGPHQ2D3P3X0454H54Z5";
pub const TEST_ACCOUNT_ID: &str = "01F8MH1H7YV1Z7D2C8K2730QBF";
pub const TEST_APPLICATION_ID: &str = "01F8MGXQRHYF5QPMTMXP78QC2F";

/// Seed the standard test client, its application, and one signed-up user with
/// their account.
pub async fn seed_records(stores: &Stores) {
    let now = Utc::now();
    stores
        .clients
        .set(&ClientRecord {
            id: TEST_CLIENT_ID.to_string(),
            secret: TEST_CLIENT_SECRET.to_string(),
            domain: "http://localhost:8080".to_string(),
            user_id: None,
            scopes: vec![],
        })
        .await
        .expect("Failed to seed client");
    stores
        .applications
        .set(&ApplicationRecord {
            id: TEST_APPLICATION_ID.to_string(),
            name: "a test application".to_string(),
            website: Some("https://some-application-website.com".to_string()),
            redirect_uri: "http://localhost:8080".to_string(),
            client_id: TEST_CLIENT_ID.to_string(),
            scopes: "read write push".to_string(),
            vapid_key: Some("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb".to_string()),
        })
        .await
        .expect("Failed to seed application");
    stores
        .accounts
        .set(&AccountRecord {
            id: TEST_ACCOUNT_ID.to_string(),
            username: "the_mighty_zork".to_string(),
            display_name: "original zork (he/they)".to_string(),
            locked: false,
            created_at: now,
            suspended_at: None,
        })
        .await
        .expect("Failed to seed account");
    stores
        .users
        .set(&UserRecord {
            id: TEST_USER_ID.to_string(),
            email: "zork@example.org".to_string(),
            encrypted_password: "$2y$10$ggWz5QWwnx6kzb9g0tnIJurFtE0dhr5Zfeaqs9iFuUIXzafQlJVZS"
                .to_string(),
            account_id: TEST_ACCOUNT_ID.to_string(),
            disabled: false,
            approved: true,
            created_at: now,
        })
        .await
        .expect("Failed to seed user");
}

/// Test fixture wrapping the full application over an in-memory store.
///
/// The store is seeded with [`seed_records`]. Requests go through the whole
/// router, including principal resolution.
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     let token = fixture.user_token(TEST_USER_ID).await;
///
///     let response = fixture
///         .get_with_token("/api/v1/accounts/verify_credentials", &token)
///         .await;
///     response.assert_ok();
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Shared state, for seeding and inspecting records
    pub state: AppState,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let stores = Stores::in_memory();
        seed_records(&stores).await;

        let state = AppState::with_stores(Settings::for_test(), stores);
        let app = create_app(state.clone());

        Self { app, state }
    }

    /// Initializes the test logger with the given level. Repeated calls are ignored.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Mint an access token for `user_id` through the test client
    pub async fn user_token(&self, user_id: &str) -> String {
        let token = self
            .state
            .oauth
            .generate_user_access_token(TEST_CLIENT_ID, user_id, "http://localhost:8080", None)
            .await
            .expect("Failed to mint user token");
        token
            .access_token()
            .expect("Minted record has no access token")
            .to_string()
    }

    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.as_ref())
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a GET request with a bearer token
    pub async fn get_with_token(&self, uri: impl AsRef<str>, token: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.as_ref())
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a POST request with an already encoded form body
    pub async fn post_form(&self, uri: impl AsRef<str>, form: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a request and returns a TestResponse.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        TestResponse { status, json }
    }

    /// Sends a request and returns its status and `Location` header, for redirects
    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Option<String>) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        (response.status(), location)
    }
}

/// Response from a test request that provides convenient access to status and JSON body.
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    /// Asserts that the response status is OK (200).
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Converts the response body to the specified type.
    ///
    /// # Panics
    ///
    /// Panics if deserialization fails.
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
