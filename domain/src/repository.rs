//! Fail-silent repository facade over a [`KeyValueStore`].

use tracing::error;

use crate::{Item, KeyValueStore, ScanOptions, ScanPage, StoreError};

/// Repository bound to one collection through an injected store.
///
/// This is the historical caller contract: `get`, `put`, and `delete` log
/// failures and otherwise discard them, and `get` answers `None` for a
/// failed call just as it does for a missing key, so callers cannot tell
/// the two apart. `scan` is the one exception and surfaces errors to the
/// caller. Callers who need to distinguish not-found from failure should
/// use the [`KeyValueStore`] port directly.
pub struct KeyValueRepository<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> KeyValueRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Fetch the item with the given primary key.
    ///
    /// Returns `None` both when the key does not exist and when the
    /// underlying call fails; failures are logged.
    pub fn get(&self, key: &str) -> Option<Item> {
        match self.store.get(key) {
            Ok(found) => found,
            Err(e) => {
                error!(key = %key, err = %e, "get failed");
                None
            }
        }
    }

    /// Upsert `item` keyed by its own `id` field, overwriting any existing
    /// item with the same key.
    ///
    /// Fire-and-forget: failures are logged and swallowed, and the caller
    /// receives no success or failure signal.
    pub fn put(&self, item: Item) {
        let key = item.id().map(ToOwned::to_owned);
        if let Err(e) = self.store.put(item) {
            error!(key = ?key, err = %e, "put failed");
        }
    }

    /// Remove the item with the given primary key if present. Absence of
    /// the key is not an error; failures are logged and swallowed.
    pub fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key) {
            error!(key = %key, err = %e, "delete failed");
        }
    }

    /// Enumerate items with the store's native scan facility.
    ///
    /// Options are forwarded verbatim and the raw page is returned,
    /// pagination metadata included; the caller drives pagination across
    /// calls. Unlike the other operations this path performs no failure
    /// handling: errors propagate.
    pub fn scan(&self, options: ScanOptions) -> Result<ScanPage, StoreError> {
        self.store.scan(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryStore;
    use serde_json::json;

    /// Store whose every operation fails, simulating a backend outage.
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<Item>, StoreError> {
            Err(StoreError::Backend("connection reset".into()))
        }

        fn put(&self, _item: Item) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection reset".into()))
        }

        fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection reset".into()))
        }

        fn scan(&self, _options: ScanOptions) -> Result<ScanPage, StoreError> {
            Err(StoreError::Backend("connection reset".into()))
        }
    }

    fn item(value: serde_json::Value) -> Item {
        Item::try_from(value).expect("object literal")
    }

    #[test]
    fn put_then_get_roundtrips_with_float_normalization() {
        let repo = KeyValueRepository::new(InMemoryStore::new());
        let it = item(json!({"id": "u1", "balance": 10.5, "visits": 3}));
        repo.put(it.clone());
        let got = repo.get("u1").expect("item present");
        assert_eq!(got, it.normalized());
        assert_eq!(got.get("balance"), Some(&json!(10.5)));
        assert_eq!(got.get("visits"), Some(&json!(3.0)));
    }

    #[test]
    fn delete_then_get_returns_none() {
        let repo = KeyValueRepository::new(InMemoryStore::new());
        repo.put(item(json!({"id": "u1"})));
        repo.delete("u1");
        assert!(repo.get("u1").is_none());
    }

    #[test]
    fn get_missing_key_is_none() {
        let repo = KeyValueRepository::new(InMemoryStore::new());
        assert!(repo.get("nope").is_none());
    }

    #[test]
    fn put_overwrites_existing_key() {
        let repo = KeyValueRepository::new(InMemoryStore::new());
        repo.put(item(json!({"id": "u1", "v": "old"})));
        repo.put(item(json!({"id": "u1", "v": "new"})));
        let got = repo.get("u1").expect("item present");
        assert_eq!(got.get("v"), Some(&json!("new")));
    }

    #[test]
    fn backend_failures_are_swallowed_except_scan() {
        let repo = KeyValueRepository::new(FailingStore);
        // get degrades to the absence marker; put and delete return unit.
        assert!(repo.get("u1").is_none());
        repo.put(item(json!({"id": "u1"})));
        repo.delete("u1");
        // scan is the loud path.
        let err = repo.scan(ScanOptions::default()).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn put_without_id_is_swallowed() {
        let repo = KeyValueRepository::new(InMemoryStore::new());
        repo.put(item(json!({"balance": 1.0})));
        let page = repo.scan(ScanOptions::default()).expect("scan");
        assert!(page.items.is_empty());
    }
}
