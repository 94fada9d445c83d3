//! Record store trait definition.

use crate::error::StoreResult;
use crate::record::{Key, Kind, Tiddler};

/// One entry yielded by a collection scan: the record name and its value.
pub type ScanEntry = (String, Tiddler);

/// Iterator over a collection scan.
///
/// Exhaustion (`None`) is the "done" sentinel. A backend that fails part way
/// through yields `Some(Err(..))`.
pub type Scan<'a> = Box<dyn Iterator<Item = StoreResult<ScanEntry>> + Send + 'a>;

/// A keyed document store.
///
/// Stores hold opaque [`Tiddler`] records under `(kind, name)` keys. They know
/// nothing about revisions or JSON metadata; the server owns that.
///
/// # Invariants
///
/// - `put` is an upsert: a later `put` to the same key replaces the record
/// - `get` after a successful `put` returns the written record
/// - `scan` yields every record of the collection exactly once, in no
///   particular order
/// - Stores must be `Send + Sync` so one handle can serve concurrent requests
pub trait RecordStore: Send + Sync {
    /// Fetches the record under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if nothing is stored under the
    /// key, or a backend error.
    fn get(&self, key: &Key) -> StoreResult<Tiddler>;

    /// Writes `record` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot persist the record.
    fn put(&self, key: &Key, record: &Tiddler) -> StoreResult<()>;

    /// Scans every record of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot be started.
    fn scan(&self, kind: Kind) -> StoreResult<Scan<'_>>;
}
