//! Entity definitions served by the repositories

#[macro_use]
pub mod macros;
pub mod order;
pub mod product;

pub use order::{Order, OrderRepository, OrderRepositoryExt, ShopItem};
pub use product::{Product, ProductRepository};
