//! Domain library for the key-value item repository.
//!
//! This crate holds the item model, the store port (trait), error
//! definitions, and the fail-silent repository facade. Keep store adapters
//! and IO concerns out of this crate; the DynamoDB adapter lives in its own
//! crate and test adapters live under [`adapters`].

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

pub use item::{Item, ID_FIELD};
pub use repository::KeyValueRepository;

/// Errors surfaced by store adapters.
///
/// Absence of a key is not an error: `get` reports it as `Ok(None)` and
/// `delete` succeeds. Errors here mean the operation itself could not be
/// carried out or its data could not be represented.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `put` was called with an item lacking a string `id` field.
    #[error("item is missing a string `id` field")]
    MissingId,
    /// An item or attribute the adapter cannot represent.
    #[error("invalid item: {0}")]
    InvalidItem(String),
    /// The backing store rejected or failed the call.
    #[error("store error: {0}")]
    Backend(String),
    /// A scan option this adapter cannot honor.
    #[error("unsupported scan option: {0}")]
    Unsupported(&'static str),
}

/// Pass-through configuration for the store's native scan facility.
///
/// The shape follows the external store, not this adapter: every field is
/// forwarded verbatim and interpreted by the backend. Pagination is driven
/// by the caller, feeding [`ScanPage::last_evaluated_key`] back in as
/// `exclusive_start_key`.
#[derive(Clone, Debug, Default)]
pub struct ScanOptions {
    /// Maximum number of items to evaluate in this page.
    pub limit: Option<i32>,
    /// Primary key to resume from (exclusive), from a previous page.
    pub exclusive_start_key: Option<String>,
    /// Backend-native filter expression applied after the read.
    pub filter_expression: Option<String>,
    /// Substitution names for the filter expression.
    pub expression_attribute_names: HashMap<String, String>,
    /// Substitution values for the filter expression.
    pub expression_attribute_values: Map<String, Value>,
    /// Request a strongly consistent read where the backend supports it.
    pub consistent_read: bool,
}

/// One page of scan results, pagination metadata included.
#[derive(Clone, Debug)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Items returned after any filtering.
    pub count: usize,
    /// Items evaluated before filtering.
    pub scanned_count: usize,
    /// Present when more data may exist; pass back as
    /// [`ScanOptions::exclusive_start_key`] to continue.
    pub last_evaluated_key: Option<String>,
}

/// Store port: one named collection of items keyed by their `id` field.
///
/// Every operation is synchronous and blocks until the backend answers.
/// Implementations hold no mutable state beyond their collection binding
/// and are safe to share across threads.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the item with the given primary key, if present.
    fn get(&self, key: &str) -> Result<Option<Item>, StoreError>;
    /// Upsert an item keyed by its own `id` field, overwriting any
    /// existing item with the same key.
    fn put(&self, item: Item) -> Result<(), StoreError>;
    /// Remove the item with the given primary key. Absence is not an
    /// error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Enumerate items with the backend's native scan facility.
    fn scan(&self, options: ScanOptions) -> Result<ScanPage, StoreError>;
}

pub mod adapters;
mod item;
mod repository;
