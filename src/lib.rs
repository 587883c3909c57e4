//! Purchase Management API Library
//!
//! Products, vendors, purchase orders and user administration behind a
//! token-authenticated JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod middleware_helpers;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{http::HeaderValue, Router};
use chrono::Utc;
use serde::Serialize;
use slog::Logger;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::{Argon2PasswordHasher, AuthConfig, AuthService, PasswordHasher};
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::logging::component_logger;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires the services with the production Argon2 hasher
    pub fn new(
        db: Arc<DbPool>,
        config: config::AppConfig,
        logger: &Logger,
    ) -> Result<Self, ServiceError> {
        Self::with_hasher(db, config, Arc::new(Argon2PasswordHasher::new()), logger)
    }

    pub fn with_hasher(
        db: Arc<DbPool>,
        config: config::AppConfig,
        hasher: Arc<dyn PasswordHasher>,
        logger: &Logger,
    ) -> Result<Self, ServiceError> {
        let auth = Arc::new(AuthService::new(
            &AuthConfig::from(&config),
            db.clone(),
            hasher.clone(),
            component_logger(logger, "auth_service"),
        )?);
        let services = handlers::AppServices::new(db.clone(), hasher, logger);

        Ok(Self {
            db,
            config,
            services,
            auth,
        })
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Every `/api` resource, with auth and role guards applied per route group
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", handlers::auth::auth_router(state))
        .nest("/products", handlers::products::products_router(state))
        .nest("/vendors", handlers::vendors::vendors_router(state))
        .nest(
            "/purchase-orders",
            handlers::purchase_orders::purchase_orders_router(state),
        )
        .nest("/users", handlers::users::users_router(state))
}

/// Cross-origin policy: configured origins, permissive in development when
/// none are set, same-origin only otherwise
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_development() {
        ::tracing::info!("Using permissive CORS because no origins are configured in development");
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

/// Full application router: API, health, Swagger UI and the middleware stack
pub fn build_app(state: AppState, logger: Logger) -> Router {
    let cors = cors_layer(&state.config);
    let timeout = state.config.request_timeout();
    let db = state.db.clone();

    Router::new()
        .nest("/api", api_routes(&state))
        .with_state(state)
        .nest("/health", health::health_routes(db))
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn_with_state(
            component_logger(&logger, "http"),
            logging::logging_middleware,
        ))
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        // Outermost so every layer above sees the request id
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}
