//! Storage implementations for different backends

#[cfg(feature = "in-memory")]
pub mod in_memory;
#[cfg(feature = "mongodb_backend")]
pub mod mongodb;

pub use crate::core::store::{Document, DocumentCollection, DocumentStore};
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryCollection, InMemoryStore};
#[cfg(feature = "mongodb_backend")]
pub use mongodb::{MongoCollection, MongoStore};
