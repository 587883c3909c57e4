use crate::errors::{ApiError, ServiceError};
use crate::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::services::products::is_valid_unit_price;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Success response carrying a human-readable message
pub fn message_response<T: Serialize>(data: T, message: &str) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::success(data).with_message(message)),
    )
        .into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input.validate().map_err(ApiError::InvalidRequest)
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// Trims an optional text field, dropping it when nothing is left
pub fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if !is_valid_unit_price(price) {
        let mut error = ValidationError::new("range");
        error.message =
            Some("Unit price must be between 0.01 and 999999.99 with at most two decimals".into());
        return Err(error);
    }
    Ok(())
}

pub fn not_found(entity: &str, id: i32) -> ApiError {
    ApiError::NotFound(format!("{} with ID {} not found", entity, id))
}
