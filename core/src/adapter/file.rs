//! Single-file persistence.
//!
//! The whole tree lives in one file encoded with a [`Format`]. Writes go
//! to a uniquely named sibling temp file first and are renamed into
//! place, so readers never observe a half-written state file. Saves
//! through one `FileStore` (and its clones) are serialized.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::Mutex;

use super::PersistenceAdapter;
use crate::codec::{Codec, Format};
use crate::error::BoxError;
use crate::value::Value;


static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    format: Format,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, format: Format) -> Self {
        FileStore {
            path: path.into(),
            format,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Pick the format from the file extension.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = Format::from_extension(&path);
        FileStore::new(path, format)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Read and decode the file. A missing file is `Ok(None)`.
    pub fn read(&self) -> Result<Option<Value>, BoxError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(self.format.decode(&text)?))
    }

    /// Encode and atomically replace the file, creating parent
    /// directories as needed.
    pub fn write(&self, state: &Value) -> Result<(), BoxError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = self.format.encode(state)?;
        let tmp = self.temp_path();
        let written = fs::write(&tmp, text).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    /// `<name>.<pid>.<seq>.tmp` next to the state file.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PersistenceAdapter for FileStore {
    async fn load(&self) -> Result<Option<Value>, BoxError> {
        self.read()
    }

    fn load_sync(&self) -> Result<Option<Value>, BoxError> {
        self.read()
    }

    async fn save(&self, state: Value) -> Result<(), BoxError> {
        let _guard = self.write_lock.lock().await;
        if Handle::try_current().is_err() {
            return self.write(&state);
        }
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.write(&state)).await?
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
