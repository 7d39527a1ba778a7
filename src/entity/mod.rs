pub mod audit_logs;
pub mod cart_items;
pub mod carts;
pub mod enums;
pub mod order_lines;
pub mod orders;
pub mod product_variants;
pub mod products;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use order_lines::Entity as OrderLines;
pub use orders::Entity as Orders;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
pub use users::Entity as Users;
