//! Record and key types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The collection a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// Current state of each tiddler, keyed by title.
    Tiddler,
    /// Append-only snapshots, keyed by `title#revision`.
    TiddlerHistory,
}

impl Kind {
    /// Returns the collection name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Tiddler => "Tiddler",
            Kind::TiddlerHistory => "TiddlerHistory",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record key: collection plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Collection.
    pub kind: Kind,
    /// Name within the collection.
    pub name: String,
}

impl Key {
    /// Creates a key in the given collection.
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Key of the current record for `title`.
    pub fn tiddler(title: &str) -> Self {
        Self::new(Kind::Tiddler, title)
    }

    /// Key of the history snapshot of `title` at `revision`.
    pub fn history(title: &str, revision: u64) -> Self {
        Self::new(Kind::TiddlerHistory, format!("{title}#{revision}"))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A stored tiddler.
///
/// `meta` holds every field except the body as a JSON object string.
/// An empty `meta` marks a tombstone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tiddler {
    /// Revision number, starting at 1.
    pub rev: u64,
    /// Serialized JSON metadata, or empty when deleted.
    pub meta: String,
    /// Body text.
    pub text: String,
}

impl Tiddler {
    /// Creates a record.
    pub fn new(rev: u64, meta: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            rev,
            meta: meta.into(),
            text: text.into(),
        }
    }

    /// Returns true if the record has been deleted.
    pub fn is_tombstone(&self) -> bool {
        self.meta.is_empty()
    }
}
