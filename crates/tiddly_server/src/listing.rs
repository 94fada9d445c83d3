//! Bulk "skinny" tiddler listing.
//!
//! The listing carries metadata only, except for macro tiddlers: the client
//! only registers macros from tiddlers whose body it has, so those entries
//! get their text inlined.

use crate::error::ServerResult;
use crate::payload::join_payload;
use std::sync::Arc;
use tiddly_store::{Kind, RecordStore};

/// Marker searched for in raw metadata to detect macro tiddlers.
pub const MACRO_TAG: &str = r#""$:/tags/Macro""#;

/// Returns true if the stored metadata tags the tiddler as a macro.
pub fn is_macro(meta: &str) -> bool {
    meta.contains(MACRO_TAG)
}

/// Builds the bulk listing from a full collection scan.
pub struct ListingAssembler {
    store: Arc<dyn RecordStore>,
}

impl ListingAssembler {
    /// Creates an assembler over `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the listing as JSON array text, in scan order.
    ///
    /// Tombstones are skipped. Macro entries whose metadata fails to parse
    /// are skipped too; a scan failure fails the whole listing.
    pub fn assemble(&self) -> ServerResult<String> {
        let mut out = String::from("[");
        let mut count = 0usize;

        for entry in self.store.scan(Kind::Tiddler)? {
            let (title, record) = entry?;
            if record.is_tombstone() {
                continue;
            }

            let item = if is_macro(&record.meta) {
                match join_payload(&record.meta, &record.text)
                    .and_then(|fields| serde_json::to_string(&fields))
                {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(%title, error = %err, "skipping unreadable macro tiddler");
                        continue;
                    }
                }
            } else {
                record.meta
            };

            if count > 0 {
                out.push(',');
            }
            out.push_str(&item);
            count += 1;
        }

        out.push(']');
        tracing::debug!(count, "assembled tiddler listing");
        Ok(out)
    }
}
