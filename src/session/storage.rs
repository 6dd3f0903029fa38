//! Session-scoped key/value storage backends.

use dashmap::DashMap;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::observability::metrics::record_session_event;
use crate::session::{SessionError, SessionResult};

/// String key/value storage with session lifetime.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> SessionResult<Option<String>>;
    fn set(&self, key: &str, value: String) -> SessionResult<()>;
    fn remove(&self, key: &str) -> SessionResult<()>;
}

/// In-memory storage; lives exactly as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }

    fn set(&self, key: &str, value: String) -> SessionResult<()> {
        self.inner.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.inner.remove(key);
        Ok(())
    }
}

/// JSON map persisted to a single file, for the operator CLI.
///
/// Writes go to a sibling temp file first and are renamed into place. On unix
/// the file is created with mode 0600.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> SessionResult<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => Ok(map),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Discarding corrupt session file");
                    record_session_event("corrupt");
                    self.discard()?;
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn discard(&self) -> SessionResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> SessionResult<()> {
        if map.is_empty() {
            return self.discard();
        }
        let content = serde_json::to_string(map)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, content.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> (T, bool)) -> SessionResult<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| SessionError::Storage("session file lock poisoned".to_string()))?;
        let mut map = self.read_map()?;
        let (out, dirty) = f(&mut map);
        if dirty {
            self.write_map(&map)?;
        }
        Ok(out)
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        self.with_map(|map| (map.get(key).cloned(), false))
    }

    fn set(&self, key: &str, value: String) -> SessionResult<()> {
        self.with_map(|map| {
            map.insert(key.to_string(), value);
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.with_map(|map| {
            let existed = map.remove(key).is_some();
            ((), existed)
        })
    }
}
