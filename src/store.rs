use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::attendance::AttendanceRecord;
use crate::error::StoreError;

/// Full persisted document: user id -> record.
pub type Store = HashMap<String, AttendanceRecord>;

/// JSON file holding every user's attendance record.
///
/// All mutations go through [`TimeStore::update`], which serialises the
/// load-mutate-save cycle so a manual clock-out and the automatic one cannot
/// overwrite each other.
pub struct TimeStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TimeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole store. A missing or unreadable file yields an empty store.
    pub async fn load(&self) -> Store {
        self.load_checked().await.unwrap_or_else(|err| {
            warn!(error = %err, "store: read failed, starting empty");
            Store::new()
        })
    }

    /// Like [`TimeStore::load`], but I/O errors other than a missing file are
    /// returned, so a writer never replaces a file it could not read.
    async fn load_checked(&self) -> Result<Store, StoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store: file not found, starting empty");
                return Ok(Store::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(store) => Ok(store),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "store: invalid JSON, starting empty");
                Ok(Store::new())
            }
        }
    }

    /// Writes the whole store, replacing the file through a temporary sibling.
    pub async fn save(&self, store: &Store) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        store.serialize(&mut ser)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &buf)
            .await
            .map_err(|source| StoreError::Write { path: tmp.clone(), source })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Write { path: self.path.clone(), source })?;
        debug!(path = %self.path.display(), users = store.len(), bytes = buf.len(), "store: saved");
        Ok(())
    }

    /// Record for `user_id`, or an idle empty record if the user is unknown.
    pub async fn read(&self, user_id: &str) -> AttendanceRecord {
        let _guard = self.lock.lock().await;
        self.load().await.remove(user_id).unwrap_or_default()
    }

    /// Applies `apply` to the user's record and persists the result.
    ///
    /// If `apply` fails nothing is written, so a rejected operation never
    /// creates a record for an unseen user.
    pub async fn update<T, E, F>(&self, user_id: &str, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut AttendanceRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut store = self.load_checked().await?;
        let mut record = store.get(user_id).cloned().unwrap_or_default();
        let out = apply(&mut record)?;
        store.insert(user_id.to_owned(), record);
        self.save(&store).await?;
        Ok(out)
    }
}
