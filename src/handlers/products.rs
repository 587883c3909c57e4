use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::common::{
    created_response, no_content_response, not_found, success_response, trim_optional,
    validate_input, validate_unit_price,
};
use crate::{
    auth::AuthRouterExt,
    entities::{product, user::ROLE_ADMIN},
    errors::ApiError,
    services::products::ProductInput,
    AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub unit: Option<String>,
    pub unit_price: Decimal,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            unit: model.unit,
            unit_price: model.unit_price,
        }
    }
}

/// Body of product create and update requests
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Code must be between 1 and 50 characters"))]
    pub code: String,
    #[validate(length(max = 20, message = "Unit must be at most 20 characters"))]
    pub unit: Option<String>,
    #[validate(custom = "validate_unit_price")]
    pub unit_price: Decimal,
}

impl ProductRequest {
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            code: self.code.trim().to_string(),
            unit: trim_optional(self.unit),
            unit_price: self.unit_price,
        }
    }
}

impl From<ProductRequest> for ProductInput {
    fn from(request: ProductRequest) -> Self {
        Self {
            name: request.name,
            code: request.code,
            unit: request.unit,
            unit_price: request.unit_price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExistsResponse {
    pub exists: bool,
}

pub fn products_router(state: &AppState) -> Router<AppState> {
    let read = Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
        .route("/exists/:id", get(product_exists))
        .with_auth(state.auth.clone());

    let admin = Router::new()
        .route("/", axum::routing::post(create_product))
        .route(
            "/:id",
            axum::routing::put(update_product).delete(delete_product),
        )
        .with_role(state.auth.clone(), ROLE_ADMIN);

    read.merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Products ordered by name", body = crate::ApiResponse<Vec<ProductResponse>>),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = state.services.products.list().await?;
    let body: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(success_response(body))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product found", body = crate::ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get(id)
        .await?
        .ok_or_else(|| not_found("Product", id))?;
    Ok(success_response(ProductResponse::from(product)))
}

#[utoipa::path(
    get,
    path = "/api/products/exists/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Existence flag", body = crate::ApiResponse<ExistsResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn product_exists(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let exists = state.services.products.exists(id).await?;
    Ok(success_response(ExistsResponse { exists }))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = crate::ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid input or duplicate code", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.normalized();
    validate_input(&payload)?;

    let product = state.services.products.create(payload.into()).await?;
    info!(product_id = product.id, "product created");
    Ok(created_response(ProductResponse::from(product)))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = crate::ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid input or duplicate code", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.normalized();
    validate_input(&payload)?;

    let product = state.services.products.update(id, payload.into()).await?;
    info!(product_id = id, "product updated");
    Ok(success_response(ProductResponse::from(product)))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, description = "Product is referenced by purchase orders", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.services.products.delete(id).await? {
        return Err(not_found("Product", id));
    }
    info!(product_id = id, "product deleted");
    Ok(no_content_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(name: &str, code: &str, price: Decimal) -> ProductRequest {
        ProductRequest {
            name: name.into(),
            code: code.into(),
            unit: Some("  ".into()),
            unit_price: price,
        }
    }

    #[test]
    fn normalized_request_trims_and_drops_blank_unit() {
        let normalized = request("  Bolt ", " B-1 ", dec!(1.25)).normalized();
        assert_eq!(normalized.name, "Bolt");
        assert_eq!(normalized.code, "B-1");
        assert_eq!(normalized.unit, None);
        assert!(normalized.validate().is_ok());
    }

    #[test]
    fn whitespace_only_name_fails_after_normalizing() {
        let normalized = request("   ", "B-1", dec!(1.25)).normalized();
        let errors = normalized.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn zero_price_is_rejected() {
        let errors = request("Bolt", "B-1", Decimal::ZERO).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("unit_price"));
    }
}
