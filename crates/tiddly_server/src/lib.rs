//! # Tiddly Server
//!
//! Revisioning HTTP server for TiddlyWiki tiddlers, speaking the subset of
//! the TiddlyWeb protocol the TiddlyWiki browser client uses.
//!
//! This crate provides:
//! - Revisioned writes with an append-only history per tiddler
//! - Soft deletes (tombstones) that keep the key and bump the revision
//! - A bulk "skinny" listing that inlines macro tiddler bodies
//! - A trusted-header authentication gate for use behind a reverse proxy
//!
//! # Endpoints
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/` | front-end page |
//! | any | `/auth` | who am I (HTML) |
//! | GET | `/status` | who am I + recipe (JSON) |
//! | GET | `/recipes/all/tiddlers.json` | listing |
//! | GET, PUT | `/recipes/all/tiddlers/{title}` | read / write one tiddler |
//! | DELETE | `/bags/bag/tiddlers/{title}` | delete one tiddler |
//! | any | `/health` | liveness, not gated |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tiddly_server::RevisionEngine;
//! use tiddly_store::InMemoryStore;
//!
//! let engine = RevisionEngine::new(Arc::new(InMemoryStore::new()));
//! let outcome = engine.put("Foo", br#"{"text":"hello"}"#).unwrap();
//! assert_eq!(outcome.revision, 1);
//! assert_eq!(engine.get("Foo").unwrap()["text"], "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod http;
mod listing;
mod payload;
mod revision;
mod server;

pub use auth::{FixedIdentity, IdentityResolver, TrustedHeader, DEFAULT_AUTH_HEADER, GUEST};
pub use config::{
    ServerConfig, StorageConfig, DEFAULT_DATA_DIR, DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT,
};
pub use error::{ServerError, ServerResult};
pub use http::{router, AppState, DEFAULT_FRONT_END};
pub use listing::{is_macro, ListingAssembler, MACRO_TAG};
pub use payload::{join_payload, parse_fields, split_payload, Fields, SplitPayload, TEXT_FIELD};
pub use revision::{content_etag, query_escape, RevisionEngine, WriteOutcome, BAG, RECIPE};
pub use server::{open_store, TiddlyServer};
