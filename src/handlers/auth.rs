use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{AuthRouterExt, AuthUser, LoginResponse},
    errors::{ApiError, ServiceError},
    handlers::common::{message_response, success_response, validate_input},
    AppState,
};

/// Login request payload
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 6, max = 100))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, max = 100))]
    pub new_password: String,
    #[validate(must_match = "new_password")]
    pub confirm_password: String,
}

pub fn auth_router(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/change-password", post(change_password))
        .route("/logout", post(logout))
        .with_auth(state.auth.clone());

    Router::new().route("/login", post(login)).merge(protected)
}

/// Exchange credentials for a session token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = crate::ApiResponse<LoginResponse>),
        (status = 400, description = "Malformed request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    match state.auth.login(&payload.username, &payload.password).await? {
        Some(session) => {
            info!(username = %session.username, "login succeeded");
            Ok(success_response(session))
        }
        None => {
            warn!(username = %payload.username, "login failed");
            Err(ServiceError::Unauthorized("Invalid username or password".to_string()).into())
        }
    }
}

/// Change the caller's own password
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = crate::ApiResponse<bool>),
        (status = 400, description = "Current password incorrect or request invalid", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let changed = state
        .auth
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    if !changed {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    Ok(message_response(true, "Password changed successfully"))
}

/// Tokens are stateless; logout only acknowledges the caller
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = crate::ApiResponse<bool>),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(user: AuthUser) -> impl IntoResponse {
    info!(user_id = user.id, "logout");
    message_response(true, "Logged out successfully")
}
