//! Revisioned writes, joined reads and tombstones.
//!
//! Every mutation bumps the record's revision and writes an immutable
//! snapshot to the history collection under `title#revision`.
//!
//! The read-modify-write of the revision is not atomic. Two concurrent PUTs
//! to one title may compute the same revision, in which case the later put
//! wins for both the record and its history key.

use crate::error::{ServerError, ServerResult};
use crate::payload::{join_payload, parse_fields, split_payload, Fields};
use md5::{Digest, Md5};
use serde_json::Value;
use std::sync::Arc;
use tiddly_store::{Key, RecordStore, StoreError, Tiddler};

/// Bag name stamped on every live tiddler.
pub const BAG: &str = "bag";

/// Recipe name served to clients.
pub const RECIPE: &str = "all";

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Revision assigned to the write.
    pub revision: u64,
    /// Cache validator for the written content, quotes included.
    pub etag: String,
}

/// Applies revisioned mutations to a record store.
pub struct RevisionEngine {
    store: Arc<dyn RecordStore>,
}

impl RevisionEngine {
    /// Creates an engine over `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Returns the stored revision of `title`, or 0 if it was never written.
    pub fn current_revision(&self, title: &str) -> ServerResult<u64> {
        match self.store.get(&Key::tiddler(title)) {
            Ok(record) => Ok(record.rev),
            Err(StoreError::NotFound { .. }) => Ok(0),
            Err(err) => Err(ServerError::Store(err)),
        }
    }

    /// Writes a client payload as the next revision of `title`.
    ///
    /// The `"text"` field is stored as the body; the remaining fields, plus
    /// `bag` and `revision`, become the metadata. Nothing is written if the
    /// payload is not a JSON object.
    pub fn put(&self, title: &str, body: &[u8]) -> ServerResult<WriteOutcome> {
        check_title(title)?;
        let split = split_payload(parse_fields(body)?);

        let revision = self.current_revision(title)? + 1;
        let meta = stamp(split.meta, revision);
        let record = Tiddler::new(revision, serde_json::to_string(&meta)?, split.text);

        self.persist(title, &record)?;
        tracing::debug!(title, revision, "stored tiddler");

        Ok(WriteOutcome {
            revision,
            etag: content_etag(title, revision, body),
        })
    }

    /// Reads `title` as one JSON object with the body under `"text"`.
    pub fn get(&self, title: &str) -> ServerResult<Fields> {
        check_title(title)?;
        let record = self.store.get(&Key::tiddler(title))?;
        Ok(join_payload(&record.meta, &record.text)?)
    }

    /// Deletes `title` by writing a blank record at the next revision.
    ///
    /// The key stays in the store, so a tombstone can be deleted again.
    pub fn tombstone(&self, title: &str) -> ServerResult<u64> {
        check_title(title)?;
        let old = self.store.get(&Key::tiddler(title))?;
        let record = Tiddler::new(old.rev + 1, "", "");

        self.persist(title, &record)?;
        tracing::debug!(title, revision = record.rev, "deleted tiddler");
        Ok(record.rev)
    }

    fn persist(&self, title: &str, record: &Tiddler) -> ServerResult<()> {
        self.store.put(&Key::tiddler(title), record)?;
        self.store.put(&Key::history(title, record.rev), record)?;
        Ok(())
    }
}

fn check_title(title: &str) -> ServerResult<()> {
    if title.is_empty() {
        return Err(ServerError::InvalidTitle);
    }
    Ok(())
}

/// Adds the bag and revision fields to stored metadata.
fn stamp(mut meta: Fields, revision: u64) -> Fields {
    meta.insert("bag".into(), Value::String(BAG.into()));
    meta.insert("revision".into(), Value::from(revision));
    meta
}

/// Builds the ETag for a write: `"bag/<title>/<revision>:<md5 of body>"`.
pub fn content_etag(title: &str, revision: u64, body: &[u8]) -> String {
    let digest = Md5::digest(body);
    format!(
        "\"{BAG}/{}/{revision}:{}\"",
        query_escape(title),
        hex::encode(digest)
    )
}

/// Escapes a string for use in a URL query: unreserved characters pass,
/// spaces become `+`, everything else is percent-encoded.
pub fn query_escape(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tiddly_store::{InMemoryStore, Kind, Scan, StoreResult};

    fn engine() -> (RevisionEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (RevisionEngine::new(store.clone()), store)
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore(InMemoryStore);

    impl RecordStore for ReadOnlyStore {
        fn get(&self, key: &Key) -> StoreResult<Tiddler> {
            self.0.get(key)
        }

        fn put(&self, _key: &Key, _record: &Tiddler) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }

        fn scan(&self, kind: Kind) -> StoreResult<Scan<'_>> {
            self.0.scan(kind)
        }
    }

    #[test]
    fn first_put_is_revision_one() {
        let (engine, store) = engine();
        let outcome = engine.put("Foo", br#"{"tags":"","text":"hello"}"#).unwrap();
        assert_eq!(outcome.revision, 1);

        let record = store.get(&Key::tiddler("Foo")).unwrap();
        assert_eq!(record.rev, 1);
        assert_eq!(record.text, "hello");
        assert_eq!(record.meta, r#"{"bag":"bag","revision":1,"tags":""}"#);
        assert_eq!(store.get(&Key::history("Foo", 1)).unwrap(), record);
    }

    #[test]
    fn get_joins_meta_and_text() {
        let (engine, _) = engine();
        engine.put("Foo", br#"{"tags":"","text":"hello"}"#).unwrap();
        let fields = engine.get("Foo").unwrap();
        assert_eq!(
            Value::Object(fields),
            json!({"tags": "", "bag": "bag", "revision": 1, "text": "hello"})
        );
    }

    #[test]
    fn second_put_bumps_revision() {
        let (engine, _) = engine();
        engine.put("Foo", br#"{"tags":"","text":"hello"}"#).unwrap();
        let outcome = engine.put("Foo", br#"{"text":"world"}"#).unwrap();
        assert_eq!(outcome.revision, 2);

        let fields = engine.get("Foo").unwrap();
        assert_eq!(fields["text"], json!("world"));
        assert_eq!(fields["revision"], json!(2));
        assert!(!fields.contains_key("tags"));
    }

    #[test]
    fn client_revision_and_bag_are_overridden() {
        let (engine, _) = engine();
        engine
            .put("Foo", br#"{"bag":"other","revision":99}"#)
            .unwrap();
        let fields = engine.get("Foo").unwrap();
        assert_eq!(fields["bag"], json!("bag"));
        assert_eq!(fields["revision"], json!(1));
    }

    #[test]
    fn malformed_payload_writes_nothing() {
        let (engine, store) = engine();
        for body in [&b"{"[..], b"[1,2]", b"\"hello\"", b""] {
            let err = engine.put("Foo", body).unwrap_err();
            assert!(matches!(err, ServerError::MalformedJson(_)));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn empty_title_is_rejected() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.put("", b"{}"),
            Err(ServerError::InvalidTitle)
        ));
        assert!(matches!(engine.get(""), Err(ServerError::InvalidTitle)));
        assert!(matches!(engine.tombstone(""), Err(ServerError::InvalidTitle)));
    }

    #[test]
    fn get_never_written_is_not_found() {
        let (engine, _) = engine();
        assert!(matches!(engine.get("Nope"), Err(ServerError::NotFound(_))));
    }

    #[test]
    fn tombstone_bumps_and_blanks() {
        let (engine, store) = engine();
        engine.put("Foo", br#"{"text":"hello"}"#).unwrap();

        assert_eq!(engine.tombstone("Foo").unwrap(), 2);
        let record = store.get(&Key::tiddler("Foo")).unwrap();
        assert!(record.is_tombstone());
        assert_eq!(record.text, "");
        assert_eq!(store.get(&Key::history("Foo", 2)).unwrap(), record);

        // The old snapshot is untouched.
        assert_eq!(store.get(&Key::history("Foo", 1)).unwrap().text, "hello");
    }

    #[test]
    fn tombstone_can_be_repeated() {
        let (engine, store) = engine();
        engine.put("Foo", b"{}").unwrap();
        assert_eq!(engine.tombstone("Foo").unwrap(), 2);
        assert_eq!(engine.tombstone("Foo").unwrap(), 3);
        assert_eq!(store.count(Kind::TiddlerHistory), 3);
    }

    #[test]
    fn tombstone_missing_is_not_found() {
        let (engine, store) = engine();
        assert!(matches!(
            engine.tombstone("Nope"),
            Err(ServerError::NotFound(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn get_after_tombstone_fails_on_meta() {
        let (engine, _) = engine();
        engine.put("Foo", b"{}").unwrap();
        engine.tombstone("Foo").unwrap();
        assert!(matches!(engine.get("Foo"), Err(ServerError::MalformedJson(_))));
    }

    #[test]
    fn put_after_tombstone_continues_revisions() {
        let (engine, _) = engine();
        engine.put("Foo", b"{}").unwrap();
        engine.tombstone("Foo").unwrap();
        let outcome = engine.put("Foo", br#"{"text":"back"}"#).unwrap();
        assert_eq!(outcome.revision, 3);
        assert_eq!(engine.get("Foo").unwrap()["text"], json!("back"));
    }

    #[test]
    fn store_failure_surfaces() {
        let engine = RevisionEngine::new(Arc::new(ReadOnlyStore(InMemoryStore::new())));
        let err = engine.put("Foo", b"{}").unwrap_err();
        assert!(err.is_server_error());
        assert!(matches!(err, ServerError::Store(_)));
    }

    #[test]
    fn etag_format() {
        // md5("{}") = 99914b932bd37a50b983c5e7c90ae93b
        assert_eq!(
            content_etag("Foo", 1, b"{}"),
            "\"bag/Foo/1:99914b932bd37a50b983c5e7c90ae93b\""
        );
    }

    #[test]
    fn etag_is_returned_from_put() {
        let (engine, _) = engine();
        let body = br#"{"text":"hello"}"#;
        let outcome = engine.put("Foo", body).unwrap();
        assert_eq!(outcome.etag, content_etag("Foo", 1, body));
        assert!(outcome.etag.starts_with("\"bag/Foo/1:"));
    }

    #[test]
    fn query_escaping() {
        assert_eq!(query_escape("Foo"), "Foo");
        assert_eq!(query_escape("Hello World"), "Hello+World");
        assert_eq!(query_escape("$:/tags/Macro"), "%24%3A%2Ftags%2FMacro");
        assert_eq!(query_escape("a-b_c.d~e"), "a-b_c.d~e");
    }

    proptest! {
        #[test]
        fn n_puts_give_revision_n_and_n_snapshots(n in 1u64..16) {
            let (engine, store) = engine();
            for i in 1..=n {
                let body = format!(r#"{{"text":"v{i}"}}"#);
                let outcome = engine.put("Foo", body.as_bytes()).unwrap();
                prop_assert_eq!(outcome.revision, i);
            }
            prop_assert_eq!(engine.current_revision("Foo").unwrap(), n);
            for i in 1..=n {
                let snapshot = store.get(&Key::history("Foo", i)).unwrap();
                prop_assert_eq!(snapshot.rev, i);
                prop_assert_eq!(snapshot.text, format!("v{i}"));
            }
            prop_assert_eq!(store.count(Kind::TiddlerHistory), n as usize);
        }
    }
}
