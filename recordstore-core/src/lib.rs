// recordstore-core/src/lib.rs
// Pure Rust API - NO Python/PyO3 dependencies

pub mod error;
pub mod document;
pub mod query;
pub mod update;
pub mod sort;
pub mod collection;
pub mod memory;
pub mod config;
pub mod record_store;

// Public exports
pub use error::{RecordStoreError, Result};
pub use document::{Document, DocumentId, ID_FIELD, RECORD_NUMBER_FIELD};
pub use query::Query;
pub use update::Update;
pub use sort::{SortDirection, SortSpec};
pub use collection::{DeleteResult, DocumentCollection, DocumentStore, InsertOneResult, UpdateResult};
pub use memory::{MemoryCollection, MemoryStore};
pub use config::{FailurePolicy, NumberingStrategy, StoreConfig};
pub use record_store::{RecordStore, COUNTER_FIELD};
