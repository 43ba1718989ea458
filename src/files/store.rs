use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{Result, StoreError};
use super::keys::{encode_created_key, encode_file_key};
use super::models::{FilePage, FileRecord, NewFileRecord};

/// Persistence for finalized file records.
///
/// Shared by every worker, so implementations handle their own
/// synchronization.
pub trait MetadataStore: Send + Sync {
    /// Persist a record, assigning its id and timestamps
    fn save(&self, record: NewFileRecord) -> Result<FileRecord>;

    /// Page through records, newest first. `page` and `limit` start at 1.
    fn find_all(&self, page: usize, limit: usize) -> Result<FilePage>;

    fn find_by_id(&self, id: &str) -> Result<FileRecord>;

    /// Flush pending writes to durable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Fjall-backed file metadata store
#[derive(Clone)]
pub struct FjallFileStore {
    keyspace: Keyspace,
    files: PartitionHandle,
    by_created: PartitionHandle,
}

/// Last creation timestamp handed out, in nanoseconds
static LAST_CREATED_NANOS: AtomicI64 = AtomicI64::new(0);

impl FjallFileStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening file store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let files = keyspace.open_partition("files", PartitionCreateOptions::default())?;
        let by_created =
            keyspace.open_partition("files_by_created", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            files,
            by_created,
        })
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<FileRecord>> {
        match self.files.get(encode_file_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }
}

/// Creation time that is strictly later than any handed out before, so
/// listing order matches save order even within one clock tick.
fn next_created_at() -> DateTime<Utc> {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let bumped = LAST_CREATED_NANOS.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last.saturating_add(1)))
    });
    let previous = match bumped {
        Ok(prev) | Err(prev) => prev,
    };
    DateTime::from_timestamp_nanos(now.max(previous.saturating_add(1)))
}

impl MetadataStore for FjallFileStore {
    fn save(&self, record: NewFileRecord) -> Result<FileRecord> {
        let record = record.into_record(Uuid::now_v7().to_string(), next_created_at());
        let created_nanos = record
            .created_at
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .max(0) as u64;

        let value = serde_json::to_vec(&record)?;
        let mut batch = self.keyspace.batch();
        batch.insert(&self.files, encode_file_key(&record.id), value);
        batch.insert(
            &self.by_created,
            encode_created_key(created_nanos, &record.id),
            record.id.as_bytes(),
        );
        batch.commit()?;

        debug!(id = %record.id, name = %record.original_name, "Saved file record");
        Ok(record)
    }

    fn find_all(&self, page: usize, limit: usize) -> Result<FilePage> {
        if page == 0 || limit == 0 {
            return Err(StoreError::InvalidPage { page, limit });
        }

        let total = self.files.len()?;
        let skip = (page - 1).saturating_mul(limit);
        let mut files = Vec::with_capacity(limit.min(total));

        for item in self.by_created.iter().rev().skip(skip).take(limit) {
            let (_, id) = item?;
            let id = String::from_utf8_lossy(&id);
            match self.load(&id)? {
                Some(record) => files.push(record),
                None => warn!(id = %id, "Index entry without a record"),
            }
        }

        Ok(FilePage {
            files,
            total,
            page,
            limit,
        })
    }

    fn find_by_id(&self, id: &str) -> Result<FileRecord> {
        self.load(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn flush(&self) -> Result<()> {
        self.persist()
    }
}
