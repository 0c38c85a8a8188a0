//! Catalog product entity

use crate::core::repository::EntityRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product in the catalog read model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Create a product with a fresh identifier, timestamped now
    pub fn new(name: impl Into<String>, description: impl Into<String>, price: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            price,
            created_at: Utc::now(),
        }
    }
}

crate::impl_entity!(
    Product,
    collection: "products",
    repository: "product_repository",
    fields: {
        "name" => Text,
        "description" => Text,
        "price" => Number,
        "created_at" => Timestamp,
    },
    search: ["name", "description"],
);

/// Repository serving [`Product`] records from collection `C`
pub type ProductRepository<C> = EntityRepository<Product, C>;
