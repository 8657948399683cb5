//! The annotation store: one JSON record on disk, mutated through a queue.
//!
//! - [`AnnotationStore::read`] loads and self-heals the record; a missing or
//!   corrupt file reads as an empty record.
//! - [`AnnotationStore::mutate`] is the only way writers change state. Each
//!   call is a read-transform-write unit on the [`MutationQueue`], so
//!   concurrent mutations apply one after another and none is lost.
//! - Each write goes to its own temp file in the target's directory and is
//!   renamed over the target, so readers never see a half-written file.
//!
//! Ordering holds per store handle and its clones. Separate handles or
//! processes writing the same file keep each write atomic but may overwrite
//! each other's updates.

pub mod fingerprint;
pub mod migrate;
pub mod queue;

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult, TransformError};
use crate::model::{RECORD_VERSION, StoreRecord};

pub use fingerprint::{Fingerprint, FingerprintPoller};
pub use queue::MutationQueue;

/// Handle to a persisted annotation record. Cheap to clone; clones share
/// the same mutation queue.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    path: PathBuf,
    queue: MutationQueue,
}

impl AnnotationStore {
    /// Open a store backed by the JSON file at `path`.
    ///
    /// The file need not exist yet. Must be called from inside a tokio
    /// runtime, which hosts the mutation worker.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self {
            path: path.into(),
            queue: MutationQueue::start()?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current record.
    ///
    /// Missing, unparseable or wrongly shaped files read as an empty record.
    /// Only genuine I/O failures are errors.
    pub async fn read(&self) -> StoreResult<StoreRecord> {
        load(&self.path).await
    }

    /// Replace the whole record. Queued behind any pending mutations.
    pub async fn write(&self, record: StoreRecord) -> StoreResult<()> {
        let path = self.path.clone();
        self.queue
            .run(async move { save(&path, record).await })
            .await?
            .map(|_| ())
    }

    /// Apply `transform` to the current record and persist the result.
    ///
    /// If the transform fails or panics nothing is written and the error
    /// reaches this caller only.
    pub async fn mutate<F>(&self, transform: F) -> StoreResult<StoreRecord>
    where
        F: FnOnce(StoreRecord) -> Result<StoreRecord, TransformError> + Send + 'static,
    {
        let path = self.path.clone();
        self.queue
            .run(async move {
                let current = load(&path).await?;
                let next = transform(current).map_err(|source| {
                    tracing::warn!(error = %source, "mutation transform failed");
                    StoreError::TransformFailed { source }
                })?;
                save(&path, next).await
            })
            .await?
    }

    /// Fingerprint of the record currently on disk.
    pub async fn fingerprint(&self) -> StoreResult<Fingerprint> {
        Ok(self.read().await?.fingerprint())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn load(path: &Path) -> StoreResult<StoreRecord> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreRecord::default()),
        Err(e) => return Err(io_error(path, e)),
    };

    let value = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "annotation store is not valid JSON; starting empty");
            return Ok(StoreRecord::default());
        }
    };

    match migrate::migrate(value) {
        Ok(record) => Ok(record),
        Err(reason) => {
            tracing::warn!(path = %path.display(), reason = %reason, "annotation store has unexpected shape; starting empty");
            Ok(StoreRecord::default())
        }
    }
}

async fn save(path: &Path, mut record: StoreRecord) -> StoreResult<StoreRecord> {
    record.version = RECORD_VERSION;
    let json = serde_json::to_vec_pretty(&record).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || replace_file(&target, &json))
        .await
        .map_err(|e| io_error(path, std::io::Error::other(e)))??;

    tracing::debug!(
        path = %path.display(),
        annotations = record.annotations.len(),
        page_notes = record.page_notes.len(),
        "annotation store written"
    );
    Ok(record)
}

/// Write `bytes` to a fresh temp file next to `path`, fsync it and rename it
/// over `path`. Every call gets its own temp file, so concurrent writers
/// (other handles, other processes) never share a half-written inode.
fn replace_file(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
    tmp.write_all(bytes).map_err(|e| io_error(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_error(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}
