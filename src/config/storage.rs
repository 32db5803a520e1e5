//! Durable session storage
//!
//! A small key-value store scoped to the local user. The session manager is
//! its only writer; each key holds one whole record and writes replace it
//! atomically.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::auth::TokenSet;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Replace the whole record under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Remove `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// What a read of the session key found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredSession {
    Present(TokenSet),
    Empty,
    /// A record exists but cannot be used (unparseable or incomplete).
    Corrupt(String),
}

pub fn read_session(store: &dyn KeyValueStore, key: &str) -> Result<StoredSession, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(StoredSession::Empty);
    };

    match serde_json::from_str::<TokenSet>(&raw) {
        Ok(tokens) if tokens.is_complete() => Ok(StoredSession::Present(tokens)),
        Ok(_) => Ok(StoredSession::Corrupt("record is missing token fields".into())),
        Err(e) => Ok(StoredSession::Corrupt(e.to_string())),
    }
}

pub fn write_session(
    store: &dyn KeyValueStore,
    key: &str,
    tokens: &TokenSet,
) -> Result<(), StoreError> {
    let record = serde_json::to_string(tokens)?;
    store.set(key, &record)
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn io_err(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Create `path` readable by the owner only, then write `value` to it.
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;

        // Write a sibling and rename it over the record; readers see old or new, never half.
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        match fs::remove_file(&tmp) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(io_err(&tmp, e)),
            _ => {}
        }
        write_private(&tmp, value).map_err(|e| io_err(&tmp, e))?;

        fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}
