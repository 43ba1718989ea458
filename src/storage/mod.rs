//! Object storage sink for streamed uploads
//! Uses Apache Arrow object_store crate

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, WriteMultipart, path::Path as StoragePath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{StorageConfig, StorageProvider};
use crate::transfer::{DownloadError, MeteredBody};

#[derive(Debug, Error)]
pub enum StorageError {
    /// The source body failed while it was being uploaded
    #[error("Upload interrupted: {0}")]
    Interrupted(#[from] DownloadError),

    #[error("Object store error: {0}")]
    Backend(#[from] object_store::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage setup failed: {0}")]
    Setup(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Reference to a completed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub url: String,
}

/// Destination for streamed file bodies.
///
/// Implementations consume the body until it ends and must not need the
/// total size up front.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn upload(&self, body: MeteredBody, name: &str) -> Result<Artifact>;
}

/// Placement and transfer window settings for [`ObjectStoreSink`]
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Key prefix every upload lands under
    pub destination: String,
    pub public_base_url: String,
    pub part_size: usize,
    pub max_concurrent_parts: usize,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            destination: "uploads".to_string(),
            public_base_url: "memory://relaybox".to_string(),
            part_size: 5 * 1024 * 1024,
            max_concurrent_parts: 4,
        }
    }
}

/// Storage sink wrapping object_store
#[derive(Clone)]
pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    options: SinkOptions,
}

impl ObjectStoreSink {
    /// Create a sink over any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, options: SinkOptions) -> Self {
        Self { store, options }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), SinkOptions::default())
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let options = SinkOptions {
            destination: config.destination.trim_matches('/').to_string(),
            public_base_url: config.public_base_url.clone(),
            part_size: config.part_size.as_usize(),
            max_concurrent_parts: config.max_concurrent_parts,
        };

        let store: Arc<dyn ObjectStore> = match config.provider {
            StorageProvider::Memory => Arc::new(InMemory::new()),
            StorageProvider::Local => {
                let root = config
                    .root
                    .as_ref()
                    .ok_or_else(|| StorageError::Setup("local provider needs a root".into()))?;
                std::fs::create_dir_all(root)
                    .map_err(|e| StorageError::Setup(format!("{}: {}", root.display(), e)))?;
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
        };

        info!(
            provider = ?config.provider,
            destination = %options.destination,
            part_size = %config.part_size,
            "Storage sink ready"
        );

        Ok(Self::new(store, options))
    }

    /// Object key for an upload: `{destination}/{artifact_id}/{name}`
    pub fn object_key(&self, artifact_id: &str, name: &str) -> String {
        // Header-supplied names must not introduce extra path levels.
        let name = name.replace(['/', '\\'], "_");
        if self.options.destination.is_empty() {
            format!("{}/{}", artifact_id, name)
        } else {
            format!("{}/{}/{}", self.options.destination, artifact_id, name)
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.options.public_base_url.trim_end_matches('/'), key)
    }

    /// Read a stored object back in full
    pub async fn read(&self, key: &str) -> Result<Bytes> {
        let path = StoragePath::from(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = result.bytes().await?;
        debug!(key, size = bytes.len(), "Read from storage");
        Ok(bytes)
    }
}

/// Feed the body into the multipart writer.
///
/// The next chunk is only pulled once fewer than `max_parts` parts are in
/// flight, so a slow store holds back the source instead of growing a buffer.
async fn pump(writer: &mut WriteMultipart, body: &mut MeteredBody, max_parts: usize) -> Result<()> {
    loop {
        writer.wait_for_capacity(max_parts).await?;
        let Some(chunk) = body.next().await else {
            return Ok(());
        };
        writer.put(chunk?);
    }
}

#[async_trait]
impl StorageSink for ObjectStoreSink {
    async fn upload(&self, mut body: MeteredBody, name: &str) -> Result<Artifact> {
        let artifact_id = Uuid::new_v4().to_string();
        let key = self.object_key(&artifact_id, name);
        let path = StoragePath::from(key.as_str());

        let upload = self.store.put_multipart(&path).await?;
        // The store escapes `.`, `..` and reserved characters; the URL must
        // name the object where it actually lands.
        let url = self.public_url(path.as_ref());
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.options.part_size);

        if let Err(e) = pump(&mut writer, &mut body, self.options.max_concurrent_parts).await {
            if let Err(abort_err) = writer.abort().await {
                warn!(key, error = %abort_err, "Failed to abort multipart upload");
            }
            return Err(e);
        }

        let put_result = writer.finish().await?;

        info!(
            key,
            size = body.observed(),
            etag = ?put_result.e_tag,
            "Uploaded to storage"
        );

        Ok(Artifact { id: key, url })
    }
}
