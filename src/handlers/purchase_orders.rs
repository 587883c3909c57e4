use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::common::{
    created_response, map_service_error, no_content_response, success_response, trim_optional,
    validate_input, validate_unit_price,
};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    entities::user::ROLE_ADMIN,
    errors::ApiError,
    services::purchase_orders::{
        CreatePurchaseOrder, OrderLineInput, PricedLineInput, PurchaseOrderView,
        UpdatePurchaseOrder,
    },
    AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    #[validate(range(min = 1, message = "Product id must be positive"))]
    pub product_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    #[validate(range(min = 1, message = "Vendor id must be positive"))]
    pub vendor_id: i32,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PricedItemRequest {
    #[validate(range(min = 1, message = "Product id must be positive"))]
    pub product_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "validate_unit_price")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePurchaseOrderRequest {
    #[validate(range(min = 1, message = "Vendor id must be positive"))]
    pub vendor_id: i32,
    #[validate(length(max = 50, message = "Status must be at most 50 characters"))]
    pub status: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<PricedItemRequest>,
}

impl CreatePurchaseOrderRequest {
    fn validated(&self) -> Result<(), ApiError> {
        validate_input(self)?;
        self.items.iter().try_for_each(validate_input)
    }
}

impl UpdatePurchaseOrderRequest {
    fn validated(&self) -> Result<(), ApiError> {
        validate_input(self)?;
        self.items.iter().try_for_each(validate_input)
    }
}

impl From<CreatePurchaseOrderRequest> for CreatePurchaseOrder {
    fn from(request: CreatePurchaseOrderRequest) -> Self {
        Self {
            vendor_id: request.vendor_id,
            items: request
                .items
                .into_iter()
                .map(|item| OrderLineInput {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

impl From<UpdatePurchaseOrderRequest> for UpdatePurchaseOrder {
    fn from(request: UpdatePurchaseOrderRequest) -> Self {
        Self {
            vendor_id: request.vendor_id,
            status: trim_optional(request.status),
            items: request
                .items
                .into_iter()
                .map(|item| PricedLineInput {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }
}

/// Orders are read and deleted by admins; any signed-in user may place or amend them
pub fn purchase_orders_router(state: &AppState) -> Router<AppState> {
    let write = Router::new()
        .route("/", post(create_purchase_order))
        .route("/:id", put(update_purchase_order))
        .with_auth(state.auth.clone());

    let admin = Router::new()
        .route("/", get(list_purchase_orders))
        .route(
            "/:id",
            get(get_purchase_order).delete(delete_purchase_order),
        )
        .with_role(state.auth.clone(), ROLE_ADMIN);

    write.merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/purchase-orders",
    responses(
        (status = 200, description = "Orders, newest first", body = crate::ApiResponse<Vec<PurchaseOrderView>>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.services.purchase_orders.list().await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/purchase-orders/{id}",
    params(("id" = i32, Path, description = "Purchase order id")),
    responses(
        (status = 200, description = "Order with resolved names", body = crate::ApiResponse<PurchaseOrderView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .get(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

#[utoipa::path(
    post,
    path = "/api/purchase-orders",
    request_body = CreatePurchaseOrderRequest,
    responses(
        (status = 201, description = "Order created at catalog prices", body = crate::ApiResponse<PurchaseOrderView>),
        (status = 400, description = "Invalid input or unknown products", body = crate::errors::ErrorResponse),
        (status = 404, description = "Vendor not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validated()?;

    let order = state
        .services
        .purchase_orders
        .create(payload.into())
        .await
        .map_err(map_service_error)?;

    info!(order_id = order.id, user_id = user.id, "purchase order created");
    Ok(created_response(order))
}

#[utoipa::path(
    put,
    path = "/api/purchase-orders/{id}",
    params(("id" = i32, Path, description = "Purchase order id")),
    request_body = UpdatePurchaseOrderRequest,
    responses(
        (status = 200, description = "Order replaced", body = crate::ApiResponse<PurchaseOrderView>),
        (status = 400, description = "Invalid input or unknown products", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or vendor not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn update_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validated()?;

    let order = state
        .services
        .purchase_orders
        .update(id, payload.into())
        .await
        .map_err(map_service_error)?;

    info!(order_id = id, user_id = user.id, "purchase order updated");
    Ok(success_response(order))
}

#[utoipa::path(
    delete,
    path = "/api/purchase-orders/{id}",
    params(("id" = i32, Path, description = "Purchase order id")),
    responses(
        (status = 204, description = "Order and its items deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .purchase_orders
        .delete(id)
        .await
        .map_err(map_service_error)?;

    info!(order_id = id, "purchase order deleted");
    Ok(no_content_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn create_request_requires_items() {
        let request = CreatePurchaseOrderRequest {
            vendor_id: 1,
            items: vec![],
        };
        assert_matches!(request.validated(), Err(ApiError::InvalidRequest(_)));
    }

    #[test]
    fn create_request_rejects_zero_quantity_line() {
        let request = CreatePurchaseOrderRequest {
            vendor_id: 1,
            items: vec![
                OrderItemRequest { product_id: 1, quantity: 2 },
                OrderItemRequest { product_id: 2, quantity: 0 },
            ],
        };
        assert_matches!(request.validated(), Err(ApiError::InvalidRequest(errors)) => {
            assert!(errors.field_errors().contains_key("quantity"));
        });
    }

    #[test]
    fn update_request_maps_blank_status_to_none() {
        let request = UpdatePurchaseOrderRequest {
            vendor_id: 3,
            status: Some("   ".into()),
            items: vec![PricedItemRequest {
                product_id: 1,
                quantity: 4,
                unit_price: dec!(4.25),
            }],
        };
        assert!(request.validated().is_ok());

        let command = UpdatePurchaseOrder::from(request);
        assert_eq!(command.status, None);
        assert_eq!(command.items[0].unit_price, dec!(4.25));
    }

    #[rstest]
    #[case(Decimal::ZERO)]
    #[case(Decimal::MAX)]
    #[case(dec!(0.005))]
    fn update_request_rejects_out_of_range_prices(#[case] unit_price: Decimal) {
        let request = UpdatePurchaseOrderRequest {
            vendor_id: 3,
            status: None,
            items: vec![PricedItemRequest {
                product_id: 1,
                quantity: 1,
                unit_price,
            }],
        };
        assert_matches!(request.validated(), Err(ApiError::InvalidRequest(errors)) => {
            assert!(errors.field_errors().contains_key("unit_price"));
        });
    }
}
