/*!
 * # Authentication and Authorization Module
 *
 * Username/password login issuing short-lived signed session tokens, token
 * validation against the live user table, password changes, and the axum
 * middleware that guards routes by authentication and role.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::user::{self, ROLE_ADMIN};
use crate::errors::ServiceError;

mod password;
mod token;

pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use token::{Claims, IssuedToken, JwtCodec};

#[cfg(test)]
pub use password::MockPasswordHasher;

/// Identity of the caller, resolved from a valid session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub role: String,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration: Duration,
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_issuer: cfg.jwt_issuer.clone(),
            jwt_audience: cfg.jwt_audience.clone(),
            access_token_expiration: cfg.jwt_expiration(),
        }
    }
}

/// Credential service: login, token validation and password changes
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DbPool>,
    codec: JwtCodec,
    hasher: Arc<dyn PasswordHasher>,
    logger: Logger,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        db: Arc<DbPool>,
        hasher: Arc<dyn PasswordHasher>,
        logger: Logger,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            db,
            codec: JwtCodec::new(config)?,
            hasher,
            logger,
        })
    }

    /// Authenticates an active user. `None` covers unknown users, inactive
    /// users and wrong passwords alike.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<LoginResponse>, ServiceError> {
        let found = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .filter(user::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?;

        let Some(found) = found else {
            slog::warn!(self.logger, "Login rejected: no active user"; "username" => username);
            return Ok(None);
        };

        if !self.hasher.verify(password, &found.password_hash)? {
            slog::warn!(self.logger, "Login rejected: password mismatch"; "user_id" => found.id);
            return Ok(None);
        }

        let now = Utc::now();
        let mut active: user::ActiveModel = found.into();
        active.last_login_at = Set(Some(now));
        let updated = active.update(&*self.db).await?;

        let issued = self
            .codec
            .issue(updated.id, &updated.username, &updated.role, now)?;

        slog::info!(self.logger, "User logged in"; "user_id" => updated.id, "role" => &updated.role);

        Ok(Some(LoginResponse {
            token: issued.token,
            username: updated.username,
            role: updated.role,
            expires_at: issued.expires_at,
        }))
    }

    /// Verifies the token and re-loads its user; `None` when the token is
    /// bad or the user is gone or deactivated.
    #[instrument(skip(self, token))]
    pub async fn validate_token(&self, token: &str) -> Result<Option<AuthUser>, ServiceError> {
        match self.authenticate(token).await {
            Ok(user) => Ok(Some(user)),
            Err(ServiceError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`validate_token`](Self::validate_token) but keeps the reason a
    /// token was refused, so callers can tell an expired session apart.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let claims = self.codec.verify(token).map_err(|e| {
            slog::debug!(self.logger, "Token rejected"; "reason" => %e);
            ServiceError::from(e)
        })?;

        let user_id = claims.user_id().ok_or(AuthError::InvalidToken)?;

        let found = user::Entity::find_by_id(user_id).one(&*self.db).await?;
        found
            .filter(|u| u.is_active)
            .map(|u| AuthUser {
                id: u.id,
                username: u.username,
                role: u.role,
            })
            .ok_or_else(|| AuthError::InvalidToken.into())
    }

    /// Replaces the password hash when `current` verifies. `false` when the
    /// user does not exist or the current password is wrong.
    #[instrument(skip(self, current, new_password))]
    pub async fn change_password(
        &self,
        user_id: i32,
        current: &str,
        new_password: &str,
    ) -> Result<bool, ServiceError> {
        let Some(found) = user::Entity::find_by_id(user_id).one(&*self.db).await? else {
            return Ok(false);
        };

        if !self.hasher.verify(current, &found.password_hash)? {
            slog::warn!(self.logger, "Password change rejected"; "user_id" => user_id);
            return Ok(false);
        }

        let mut active: user::ActiveModel = found.into();
        active.password_hash = Set(self.hasher.hash(new_password)?);
        active.update(&*self.db).await?;

        slog::info!(self.logger, "Password changed"; "user_id" => user_id);
        Ok(true)
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            _ => ServiceError::Unauthorized(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the bearer token to an [`AuthUser`] and stores it in the request extensions
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return AuthError::MissingToken.into_response();
    };

    match auth.authenticate(token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;

    if !user.has_role(&required_role) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self, auth: Arc<AuthService>) -> Self;
    fn with_role(self, auth: Arc<AuthService>, role: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self, auth: Arc<AuthService>) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(auth, auth_middleware))
    }

    fn with_role(self, auth: Arc<AuthService>, role: &str) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            role.to_string(),
            role_middleware,
        ))
        .with_auth(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(
            ServiceError::from(AuthError::TokenExpired).status_code(),
            axum::http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientPermissions).status_code(),
            axum::http::StatusCode::FORBIDDEN
        );
    }

    fn test_auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "unit-test-secret-with-enough-length".to_string(),
            jwt_issuer: "purchase-management-api".to_string(),
            jwt_audience: "purchase-management-clients".to_string(),
            access_token_expiration: Duration::from_secs(600),
        }
    }

    async fn service_with(hasher: MockPasswordHasher) -> (AuthService, Arc<DbPool>) {
        let db = crate::db::establish_connection_with_config(&crate::db::DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        let db = Arc::new(db);

        let service = AuthService::new(
            &test_auth_config(),
            db.clone(),
            Arc::new(hasher),
            crate::logging::discard_logger(),
        )
        .unwrap();
        (service, db)
    }

    async fn insert_user(db: &DbPool, username: &str) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set("stored-hash".to_string()),
            role: Set(ROLE_ADMIN.to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            last_login_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn login_consults_hasher_with_stored_hash() {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_verify()
            .withf(|password, hash| password == "guess" && hash == "stored-hash")
            .times(1)
            .returning(|_, _| Ok(false));
        let (service, db) = service_with(hasher).await;
        let stored = insert_user(&db, "root").await;

        assert!(service.login("root", "guess").await.unwrap().is_none());

        let reloaded = user::Entity::find_by_id(stored.id)
            .one(&*db)
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.last_login_at.is_none());
    }

    #[tokio::test]
    async fn hasher_failure_surfaces_as_error() {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_verify()
            .returning(|_, _| Err(ServiceError::HashError("broken".into())));
        let (service, db) = service_with(hasher).await;
        insert_user(&db, "root").await;

        let result = service.login("root", "whatever").await;

        assert_matches!(result, Err(ServiceError::HashError(_)));
    }

    #[tokio::test]
    async fn expired_session_is_reported_as_expired() {
        let (service, db) = service_with(MockPasswordHasher::new()).await;
        let stored = insert_user(&db, "root").await;
        let codec = JwtCodec::new(&test_auth_config()).unwrap();
        let issued = codec
            .issue(
                stored.id,
                "root",
                ROLE_ADMIN,
                Utc::now() - chrono::Duration::hours(2),
            )
            .unwrap();

        assert_matches!(
            service.authenticate(&issued.token).await,
            Err(ServiceError::Unauthorized(msg)) if msg == AuthError::TokenExpired.to_string()
        );
        assert!(service.validate_token(&issued.token).await.unwrap().is_none());

        let fresh = codec.issue(stored.id, "root", ROLE_ADMIN, Utc::now()).unwrap();
        assert_eq!(
            service.authenticate(&fresh.token).await.unwrap().username,
            "root"
        );
    }

    #[test]
    fn admin_role_is_case_sensitive() {
        let user = AuthUser {
            id: 1,
            username: "root".into(),
            role: "admin".into(),
        };
        assert!(!user.is_admin());
    }
}
