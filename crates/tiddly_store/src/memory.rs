//! In-memory record store for testing.

use crate::error::{StoreError, StoreResult};
use crate::record::{Key, Kind, Tiddler};
use crate::store::{RecordStore, Scan};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory record store.
///
/// This store keeps all records in a hash map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Local runs that don't need persistence
///
/// Scans yield records in hash order, so callers cannot come to rely on a
/// stable listing order.
///
/// # Example
///
/// ```rust
/// use tiddly_store::{InMemoryStore, Key, RecordStore, Tiddler};
///
/// let store = InMemoryStore::new();
/// store.put(&Key::tiddler("Foo"), &Tiddler::new(1, "{}", "hello")).unwrap();
/// assert_eq!(store.get(&Key::tiddler("Foo")).unwrap().text, "hello");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Key, Tiddler>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = (Key, Tiddler)>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    /// Returns the number of records in a collection.
    #[must_use]
    pub fn count(&self, kind: Kind) -> usize {
        self.records.read().keys().filter(|k| k.kind == kind).count()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordStore for InMemoryStore {
    fn get(&self, key: &Key) -> StoreResult<Tiddler> {
        self.records
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    fn put(&self, key: &Key, record: &Tiddler) -> StoreResult<()> {
        self.records.write().insert(key.clone(), record.clone());
        Ok(())
    }

    fn scan(&self, kind: Kind) -> StoreResult<Scan<'_>> {
        let snapshot: Vec<_> = self
            .records
            .read()
            .iter()
            .filter(|(k, _)| k.kind == kind)
            .map(|(k, v)| (k.name.clone(), v.clone()))
            .collect();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.count(Kind::Tiddler), 0);
    }

    #[test]
    fn memory_get_missing_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.get(&Key::tiddler("nope"));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn memory_put_then_get() {
        let store = InMemoryStore::new();
        let record = Tiddler::new(1, r#"{"bag":"bag"}"#, "body");
        store.put(&Key::tiddler("Foo"), &record).unwrap();
        assert_eq!(store.get(&Key::tiddler("Foo")).unwrap(), record);
    }

    #[test]
    fn memory_put_overwrites() {
        let store = InMemoryStore::new();
        let key = Key::tiddler("Foo");
        store.put(&key, &Tiddler::new(1, "{}", "a")).unwrap();
        store.put(&key, &Tiddler::new(2, "{}", "b")).unwrap();

        let got = store.get(&key).unwrap();
        assert_eq!(got.rev, 2);
        assert_eq!(got.text, "b");
        assert_eq!(store.count(Kind::Tiddler), 1);
    }

    #[test]
    fn memory_collections_are_separate() {
        let store = InMemoryStore::new();
        store
            .put(&Key::tiddler("Foo"), &Tiddler::new(1, "{}", ""))
            .unwrap();
        store
            .put(&Key::history("Foo", 1), &Tiddler::new(1, "{}", ""))
            .unwrap();

        let names: Vec<_> = store
            .scan(Kind::Tiddler)
            .unwrap()
            .map(|e| e.unwrap().0)
            .collect();
        assert_eq!(names, vec!["Foo".to_string()]);
        assert_eq!(store.count(Kind::TiddlerHistory), 1);
    }

    #[test]
    fn memory_scan_yields_every_record_once() {
        let store = InMemoryStore::with_records((0..20).map(|i| {
            (
                Key::tiddler(&format!("t{i}")),
                Tiddler::new(1, "{}", i.to_string()),
            )
        }));

        let mut names: Vec<_> = store
            .scan(Kind::Tiddler)
            .unwrap()
            .map(|e| e.unwrap().0)
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 20);
    }
}
