use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::common::{
    created_response, no_content_response, not_found, success_response, validate_input,
};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    entities::user::ROLE_ADMIN,
    errors::ApiError,
    services::users::{CreateUserInput, UpdateUserInput, UserDto},
    AppState,
};

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be between 1 and 50 characters"))]
    pub username: String,
    #[validate(length(min = 6, max = 100, message = "Password must be between 6 and 100 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 20, message = "Role must be between 1 and 20 characters"))]
    pub role: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be between 1 and 50 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 20, message = "Role must be between 1 and 20 characters"))]
    pub role: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserStatusRequest {
    pub is_active: bool,
}

impl From<CreateUserRequest> for CreateUserInput {
    fn from(request: CreateUserRequest) -> Self {
        Self {
            username: request.username.trim().to_string(),
            password: request.password,
            role: request.role.trim().to_string(),
            is_active: request.is_active,
        }
    }
}

impl From<UpdateUserRequest> for UpdateUserInput {
    fn from(request: UpdateUserRequest) -> Self {
        Self {
            username: request.username.trim().to_string(),
            role: request.role.trim().to_string(),
            is_active: request.is_active,
        }
    }
}

pub fn users_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/status", patch(set_user_status))
        .with_role(state.auth.clone(), ROLE_ADMIN)
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Users ordered by username", body = crate::ApiResponse<Vec<UserDto>>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.users.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = crate::ApiResponse<UserDto>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .get(id)
        .await?
        .ok_or_else(|| not_found("User", id))?;
    Ok(success_response(user))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = crate::ApiResponse<UserDto>),
        (status = 400, description = "Invalid input or username taken", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = state.services.users.create(payload.into()).await?;
    info!(user_id = user.id, created_by = admin.id, "user created");
    Ok(created_response(user))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = crate::ApiResponse<UserDto>),
        (status = 400, description = "Invalid input, username taken or last active admin", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = state
        .services
        .users
        .update(id, payload.into())
        .await?
        .ok_or_else(|| not_found("User", id))?;
    info!(user_id = id, updated_by = admin.id, "user updated");
    Ok(success_response(user))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Last active admin", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.services.users.delete(id).await? {
        return Err(not_found("User", id));
    }
    info!(user_id = id, deleted_by = admin.id, "user deleted");
    Ok(no_content_response())
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/status",
    params(("id" = i32, Path, description = "User id")),
    request_body = UserStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = crate::ApiResponse<UserDto>),
        (status = 400, description = "Last active admin", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn set_user_status(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UserStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let users = &state.services.users;
    if !users.toggle_active(id, payload.is_active).await? {
        return Err(not_found("User", id));
    }

    info!(user_id = id, is_active = payload.is_active, changed_by = admin.id, "user status changed");
    let user = users.get(id).await?.ok_or_else(|| not_found("User", id))?;
    Ok(success_response(user))
}
