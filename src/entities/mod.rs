pub mod product;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod user;
pub mod vendor;
