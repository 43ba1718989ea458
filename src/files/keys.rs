//! Key layout for the file store partitions
//!
//! - `files`: file:{id} -> FileRecord (JSON)
//! - `files_by_created`: created:{nanos:020}:{id} -> id
//!
//! Creation keys are zero-padded so lexicographic order is time order.

/// Encode a record key: file:{id}
pub fn encode_file_key(id: &str) -> Vec<u8> {
    format!("file:{}", id).into_bytes()
}

/// Encode a creation index key: created:{nanos:020}:{id}
pub fn encode_created_key(created_nanos: u64, id: &str) -> Vec<u8> {
    format!("created:{:020}:{}", created_nanos, id).into_bytes()
}
