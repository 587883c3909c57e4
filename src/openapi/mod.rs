use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Purchase Management API",
        version = "1.0.0",
        description = r#"
# Purchase Management API

Back office for purchasing: product catalog, vendor directory, purchase orders and user administration.

## Authentication

Call `POST /api/auth/login` and send the returned token on every other request:

```
Authorization: Bearer <your-jwt-token>
```

Catalog reads are open to any signed-in user. Catalog writes, order reads and deletes, and user administration require the `Admin` role.

## Error Handling

Errors share one body shape:

```json
{
  "error": "Bad Request",
  "message": "Validation error: Product code 'P-1' already exists",
  "request_id": "3f1c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Login, logout and password changes"),
        (name = "products", description = "Product catalog"),
        (name = "vendors", description = "Vendor directory"),
        (name = "purchase-orders", description = "Purchase orders and their line items"),
        (name = "users", description = "User administration"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::auth::login,
        crate::handlers::auth::change_password,
        crate::handlers::auth::logout,

        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::product_exists,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        crate::handlers::vendors::list_vendors,
        crate::handlers::vendors::search_vendors,
        crate::handlers::vendors::get_vendor,
        crate::handlers::vendors::vendor_exists,
        crate::handlers::vendors::create_vendor,
        crate::handlers::vendors::update_vendor,
        crate::handlers::vendors::delete_vendor,

        crate::handlers::purchase_orders::list_purchase_orders,
        crate::handlers::purchase_orders::get_purchase_order,
        crate::handlers::purchase_orders::create_purchase_order,
        crate::handlers::purchase_orders::update_purchase_order,
        crate::handlers::purchase_orders::delete_purchase_order,

        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::create_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::set_user_status,

        crate::health::health_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            crate::auth::AuthUser,
            crate::auth::LoginResponse,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::ChangePasswordRequest,

            crate::handlers::products::ProductResponse,
            crate::handlers::products::ProductRequest,
            crate::handlers::products::ExistsResponse,

            crate::handlers::vendors::VendorResponse,
            crate::handlers::vendors::VendorRequest,

            crate::services::purchase_orders::PurchaseOrderView,
            crate::services::purchase_orders::PurchaseOrderItemView,
            crate::handlers::purchase_orders::CreatePurchaseOrderRequest,
            crate::handlers::purchase_orders::OrderItemRequest,
            crate::handlers::purchase_orders::UpdatePurchaseOrderRequest,
            crate::handlers::purchase_orders::PricedItemRequest,

            crate::services::users::UserDto,
            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::users::UserStatusRequest,

            crate::health::HealthInfo,
            crate::health::ReadinessInfo,
            crate::health::HealthStatus,

            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url(OPENAPI_JSON_PATH, ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from(OPENAPI_JSON_PATH).try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_every_resource() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Purchase Management API"));
        assert!(json.contains("/api/purchase-orders/{id}"));
        assert!(json.contains("/api/vendors/search"));
        assert!(json.contains("/api/users/{id}/status"));
        assert!(json.contains("bearer_auth"));
    }
}
