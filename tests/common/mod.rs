#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use purchase_management_api::{
    auth::PasswordHasher,
    build_app,
    config::AppConfig,
    db,
    entities::{product, user::ROLE_ADMIN, vendor},
    errors::ServiceError,
    logging::discard_logger,
    services::{products::ProductInput, users::CreateUserInput, users::UserDto, vendors::VendorInput},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str =
    "k3Jq9vXw2LmN8pRt5YzB7cDf4GhS6uVa1EoIx0WnQkTrMyPsLbZe-test-signing-key";

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-secret";

/// Reversible stand-in for Argon2 so tests do not pay for key stretching
pub struct PlainTextHasher;

impl PasswordHasher for PlainTextHasher {
    fn hash(&self, password: &str) -> Result<String, ServiceError> {
        Ok(format!("plain${}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, ServiceError> {
        Ok(hash.strip_prefix("plain$") == Some(password))
    }
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_hasher(Arc::new(PlainTextHasher)).await
    }

    pub async fn with_hasher(hasher: Arc<dyn PasswordHasher>) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let logger = discard_logger();
        let state = AppState::with_hasher(Arc::new(pool), cfg, hasher, &logger)
            .expect("valid application state");
        let router = build_app(state.clone(), logger);

        Self { router, state }
    }

    pub async fn seed_user(&self, username: &str, password: &str, role: &str) -> UserDto {
        self.state
            .services
            .users
            .create(CreateUserInput {
                username: username.to_string(),
                password: password.to_string(),
                role: role.to_string(),
                is_active: true,
            })
            .await
            .expect("seed user")
    }

    pub async fn seed_admin(&self) -> UserDto {
        self.seed_user(ADMIN_USERNAME, ADMIN_PASSWORD, ROLE_ADMIN).await
    }

    pub async fn seed_vendor(&self, name: &str) -> vendor::Model {
        self.state
            .services
            .vendors
            .create(VendorInput {
                name: name.to_string(),
                address: None,
                contact_person: None,
                phone: None,
                email: None,
            })
            .await
            .expect("seed vendor")
    }

    pub async fn seed_product(&self, name: &str, code: &str, unit_price: Decimal) -> product::Model {
        self.state
            .services
            .products
            .create(ProductInput {
                name: name.to_string(),
                code: code.to_string(),
                unit: Some("pcs".to_string()),
                unit_price,
            })
            .await
            .expect("seed product")
    }

    pub async fn token_for(&self, username: &str, password: &str) -> String {
        self.state
            .auth
            .login(username, password)
            .await
            .expect("login query")
            .expect("valid credentials")
            .token
    }

    /// Seeds the default admin and returns a session token for it.
    pub async fn admin_token(&self) -> String {
        self.seed_admin().await;
        self.token_for(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
