pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod inventory;
pub mod ipn_service;
pub mod order_service;
pub mod order_state;
pub mod payment;
pub mod pricing;
