pub mod auth;
pub mod common;
pub mod products;
pub mod purchase_orders;
pub mod users;
pub mod vendors;

use crate::auth::PasswordHasher;
use crate::db::DbPool;
use crate::logging::component_logger;
use crate::services::{
    products::ProductService, purchase_orders::PurchaseOrderService, users::UserService,
    vendors::VendorService,
};
use slog::Logger;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub vendors: Arc<VendorService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        hasher: Arc<dyn PasswordHasher>,
        base_logger: &Logger,
    ) -> Self {
        Self {
            products: Arc::new(ProductService::new(
                db_pool.clone(),
                component_logger(base_logger, "product_service"),
            )),
            vendors: Arc::new(VendorService::new(
                db_pool.clone(),
                component_logger(base_logger, "vendor_service"),
            )),
            purchase_orders: Arc::new(PurchaseOrderService::new(
                db_pool.clone(),
                component_logger(base_logger, "purchase_order_service"),
            )),
            users: Arc::new(UserService::new(
                db_pool,
                hasher,
                component_logger(base_logger, "user_service"),
            )),
        }
    }
}
