use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a file that was transferred and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub original_name: String,
    pub mime_type: String,
    /// Bytes observed while streaming
    pub size: u64,
    pub storage_id: String,
    pub storage_url: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields known once an upload completes; the store assigns the rest
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileRecord {
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub storage_id: String,
    pub storage_url: String,
    pub original_url: String,
}

impl NewFileRecord {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> FileRecord {
        FileRecord {
            id,
            original_name: self.original_name,
            mime_type: self.mime_type,
            size: self.size,
            storage_id: self.storage_id,
            storage_url: self.storage_url,
            original_url: self.original_url,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One page of records, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    pub files: Vec<FileRecord>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}
