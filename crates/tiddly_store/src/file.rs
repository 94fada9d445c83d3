//! File-backed record store for persistent storage.

use crate::error::{StoreError, StoreResult};
use crate::record::{Key, Kind, Tiddler};
use crate::store::{RecordStore, Scan};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Name of the record log inside a project directory.
pub const LOG_FILE_NAME: &str = "records.jsonl";

#[derive(Serialize)]
struct EntryRef<'a> {
    kind: Kind,
    key: &'a str,
    record: &'a Tiddler,
}

#[derive(Deserialize)]
struct Entry {
    kind: Kind,
    key: String,
    record: Tiddler,
}

struct LogFile {
    file: File,
    size: u64,
}

/// A file-backed record store.
///
/// Every `put` appends one JSON line to `<root>/<project>/records.jsonl`.
/// On open the log is replayed into an in-memory index, so reads never touch
/// the disk. Later lines win over earlier lines for the same key.
///
/// # Durability
///
/// - Each append is flushed to the OS before `put` returns
/// - With `sync_writes` enabled the file is also fsynced
/// - A trailing line without a newline is a torn append from a crash; it is
///   dropped and the file truncated on the next open
///
/// # Example
///
/// ```no_run
/// use tiddly_store::{FileStore, Key, RecordStore, Tiddler};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("data"), "my-wiki").unwrap();
/// store.put(&Key::tiddler("Foo"), &Tiddler::new(1, "{}", "hi")).unwrap();
/// ```
pub struct FileStore {
    path: PathBuf,
    log: Mutex<LogFile>,
    index: RwLock<HashMap<Key, Tiddler>>,
    sync_writes: bool,
}

impl FileStore {
    /// Opens or creates the store for `project` under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidProject`] if `project` is empty or is not a
    /// single path component, and an error if the directory or log cannot be
    /// created or the log contains a corrupted line.
    pub fn open(root: &Path, project: &str) -> StoreResult<Self> {
        if project.is_empty() || project.contains(['/', '\\']) || project == ".." {
            return Err(StoreError::InvalidProject(project.to_string()));
        }
        let dir = root.join(project);
        std::fs::create_dir_all(&dir)?;
        Self::open_file(&dir.join(LOG_FILE_NAME))
    }

    /// Opens or creates a store backed by the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is corrupted.
    pub fn open_file(path: &Path) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let (index, valid_len) = replay(&data)?;
        if valid_len < data.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                dropped = data.len() as u64 - valid_len,
                "dropping torn record at end of log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        tracing::debug!(path = %path.display(), records = index.len(), "opened record log");

        Ok(Self {
            path: path.to_path_buf(),
            log: Mutex::new(LogFile {
                file,
                size: valid_len,
            }),
            index: RwLock::new(index),
            sync_writes: false,
        })
    }

    /// Enables fsync after every append.
    #[must_use]
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Returns the path to the record log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of distinct keys in a collection.
    #[must_use]
    pub fn count(&self, kind: Kind) -> usize {
        self.index.read().keys().filter(|k| k.kind == kind).count()
    }

    fn append(&self, log: &mut LogFile, line: &[u8]) -> StoreResult<()> {
        let result = (|| {
            log.file.seek(SeekFrom::Start(log.size))?;
            log.file.write_all(line)?;
            log.file.flush()?;
            if self.sync_writes {
                log.file.sync_data()?;
            }
            Ok::<_, std::io::Error>(())
        })();

        match result {
            Ok(()) => {
                log.size += line.len() as u64;
                Ok(())
            }
            Err(err) => {
                // Drop whatever part of the line made it to disk.
                if let Err(trunc) = log.file.set_len(log.size) {
                    tracing::error!(error = %trunc, "failed to roll back partial append");
                }
                Err(err.into())
            }
        }
    }
}

/// Replays log bytes into an index, returning it with the length of the
/// valid prefix.
fn replay(data: &[u8]) -> StoreResult<(HashMap<Key, Tiddler>, u64)> {
    let mut index = HashMap::new();
    let mut offset = 0usize;

    while offset < data.len() {
        let Some(newline) = data[offset..].iter().position(|b| *b == b'\n') else {
            // Unterminated tail
            break;
        };
        let line = &data[offset..offset + newline];
        if !line.is_empty() {
            let entry: Entry = serde_json::from_slice(line).map_err(|e| {
                StoreError::Corrupted(format!("bad record at offset {offset}: {e}"))
            })?;
            index.insert(Key::new(entry.kind, entry.key), entry.record);
        }
        offset += newline + 1;
    }

    Ok((index, offset as u64))
}

impl RecordStore for FileStore {
    fn get(&self, key: &Key) -> StoreResult<Tiddler> {
        self.index
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    fn put(&self, key: &Key, record: &Tiddler) -> StoreResult<()> {
        let mut line = serde_json::to_vec(&EntryRef {
            kind: key.kind,
            key: &key.name,
            record,
        })?;
        line.push(b'\n');

        // Hold the log lock across the index update so replay order matches
        // the order readers observed.
        let mut log = self.log.lock();
        self.append(&mut log, &line)?;
        self.index.write().insert(key.clone(), record.clone());
        Ok(())
    }

    fn scan(&self, kind: Kind) -> StoreResult<Scan<'_>> {
        let snapshot: Vec<_> = self
            .index
            .read()
            .iter()
            .filter(|(k, _)| k.kind == kind)
            .map(|(k, v)| (k.name.clone(), v.clone()))
            .collect();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("sync_writes", &self.sync_writes)
            .finish_non_exhaustive()
    }
}
