use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use crate::{Item, KeyValueStore, ScanOptions, ScanPage, StoreError};

/// Simple in-memory store for tests. Not thread-safe for high concurrency
/// beyond the internal mutex guarding the map.
///
/// Writes apply [`Item::normalized`] so tests observe the same
/// decimal-to-float numeric contract the wire format imposes. `scan`
/// honors `limit` and `exclusive_start_key` in primary-key order;
/// `filter_expression` is rejected rather than silently ignored, since
/// expression evaluation belongs to the real backend.
pub struct InMemoryStore {
    inner: Mutex<BTreeMap<String, Item>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Item>, StoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, item: Item) -> Result<(), StoreError> {
        let key = item.id().ok_or(StoreError::MissingId)?.to_string();
        let mut map = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;
        map.insert(key, item.normalized());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;
        map.remove(key);
        Ok(())
    }

    fn scan(&self, options: ScanOptions) -> Result<ScanPage, StoreError> {
        if options.filter_expression.is_some() {
            return Err(StoreError::Unsupported("filter_expression"));
        }
        let map = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))?;

        let lower = match options.exclusive_start_key {
            Some(start) => Bound::Excluded(start),
            None => Bound::Unbounded,
        };
        let limit = match options.limit {
            Some(n) if n >= 0 => n as usize,
            Some(_) => 0,
            None => usize::MAX,
        };

        let mut items = Vec::new();
        let mut last_key = None;
        for (key, item) in map.range::<String, _>((lower, Bound::Unbounded)) {
            if items.len() == limit {
                break;
            }
            items.push(item.clone());
            last_key = Some(key.clone());
        }

        // More data remains only if we stopped at the limit short of the end.
        let exhausted = match &last_key {
            Some(key) => map
                .range::<String, _>((Bound::Excluded(key.clone()), Bound::Unbounded))
                .next()
                .is_none(),
            None => true,
        };
        let count = items.len();
        Ok(ScanPage {
            items,
            count,
            scanned_count: count,
            last_evaluated_key: if exhausted { None } else { last_key },
        })
    }
}
