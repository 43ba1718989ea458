//! File metadata persistence
//!
//! Every successful transfer ends with one [`FileRecord`] saved through a
//! [`MetadataStore`]. The bundled implementation is [`FjallFileStore`], an
//! embedded LSM keyspace with two partitions:
//!
//! - `files` holds the records themselves
//! - `files_by_created` indexes them by creation time for newest-first paging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relaybox::files::{FjallFileStore, MetadataStore};
//!
//! let store = FjallFileStore::open("data/files")?;
//! let page = store.find_all(1, 10)?;
//! let record = store.find_by_id(&page.files[0].id)?;
//! ```

pub mod error;
pub mod keys;
pub mod models;
pub mod store;

pub use error::{Result, StoreError};
pub use models::{FilePage, FileRecord, NewFileRecord};
pub use store::{FjallFileStore, MetadataStore};
