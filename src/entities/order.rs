//! Order read model entity

use crate::core::context::Context;
use crate::core::error::RepositoryError;
use crate::core::repository::{EntityRepository, Repository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItem {
    pub title: String,
    pub description: String,
    pub quantity: u64,
    pub price: f64,
}

/// An order as projected into the read store
///
/// `id` is the read-model document id; `order_id` is the identifier assigned
/// by the write side and is looked up through
/// [`OrderRepositoryExt::get_by_order_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_id: String,
    pub account_email: String,
    pub delivery_address: String,
    pub shop_items: Vec<ShopItem>,
    pub total_price: f64,
    pub paid: bool,
    pub canceled: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create an unpaid order for `order_id`, priced from its items
    pub fn new(
        order_id: impl Into<String>,
        account_email: impl Into<String>,
        delivery_address: impl Into<String>,
        shop_items: Vec<ShopItem>,
    ) -> Self {
        let total_price = shop_items
            .iter()
            .map(|item| item.price * item.quantity as f64)
            .sum();
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            account_email: account_email.into(),
            delivery_address: delivery_address.into(),
            shop_items,
            total_price,
            paid: false,
            canceled: false,
            created_at: Utc::now(),
        }
    }
}

crate::impl_entity!(
    Order,
    collection: "orders",
    repository: "order_repository",
    fields: {
        "order_id" => Keyword,
        "account_email" => Keyword,
        "delivery_address" => Text,
        "total_price" => Number,
        "paid" => Boolean,
        "canceled" => Boolean,
        "created_at" => Timestamp,
    },
    search: ["account_email", "delivery_address"],
);

/// Repository serving [`Order`] records from collection `C`
pub type OrderRepository<C> = EntityRepository<Order, C>;

/// Order lookups beyond the generic repository operations
#[async_trait]
pub trait OrderRepositoryExt: Repository<Order> {
    /// Find the order projected for write-side `order_id`
    async fn get_by_order_id(
        &self,
        ctx: &Context,
        order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let value = Value::String(order_id.to_string());
        self.get_by_field(ctx, "order_id", &value).await
    }
}

impl<R: Repository<Order> + ?Sized> OrderRepositoryExt for R {}
