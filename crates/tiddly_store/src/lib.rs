//! # Tiddly Store
//!
//! Record store trait and backends for the tiddly server.
//!
//! Stores are **keyed document stores**: they hold [`Tiddler`] records under
//! `(kind, name)` keys and offer get, upsert and full-collection scan. They do
//! not interpret the JSON metadata or the revision numbers they hold.
//!
//! ## Available Backends
//!
//! - [`InMemoryStore`] - For testing and ephemeral runs
//! - [`FileStore`] - Persistent append-only JSON-lines log, one per project
//!
//! ## Example
//!
//! ```rust
//! use tiddly_store::{InMemoryStore, Key, Kind, RecordStore, Tiddler};
//!
//! let store = InMemoryStore::new();
//! store.put(&Key::tiddler("Foo"), &Tiddler::new(1, "{}", "hello")).unwrap();
//! store.put(&Key::history("Foo", 1), &Tiddler::new(1, "{}", "hello")).unwrap();
//!
//! let titles: Vec<_> = store
//!     .scan(Kind::Tiddler)
//!     .unwrap()
//!     .map(|entry| entry.unwrap().0)
//!     .collect();
//! assert_eq!(titles, vec!["Foo".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod record;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::{FileStore, LOG_FILE_NAME};
pub use memory::InMemoryStore;
pub use record::{Key, Kind, Tiddler};
pub use store::{RecordStore, Scan, ScanEntry};
