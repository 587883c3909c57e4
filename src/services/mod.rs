// Business services backing the HTTP handlers
pub mod products;
pub mod purchase_orders;
pub mod users;
pub mod vendors;
