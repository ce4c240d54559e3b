// recordstore-core/src/collection.rs
// Capability interface RecordStore talks to. Backends implement these traits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::document::{Document, DocumentId};
use crate::error::{RecordStoreError, Result};
use crate::sort::SortSpec;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOneResult {
    /// `None` when the store accepted the write without reporting an identity
    pub inserted_id: Option<DocumentId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// One collection in a document store.
///
/// Filters and updates are passed through as JSON values; interpreting them is
/// the collection's business.
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    /// First matching document after applying `sort`
    fn find_one(&self, filter: &Value, sort: &[SortSpec]) -> Result<Option<Document>>;

    /// Every matching document, fully materialized
    fn find(&self, filter: &Value) -> Result<Vec<Document>>;

    fn insert_one(&self, document: Document) -> Result<InsertOneResult>;

    fn update_many(&self, filter: &Value, update: &Value) -> Result<UpdateResult>;

    fn delete_many(&self, filter: &Value) -> Result<DeleteResult>;

    /// Atomically update the first match and return it as it is after the update.
    /// With `upsert` a missing match is created from the filter's equality fields.
    fn find_one_and_update(
        &self,
        _filter: &Value,
        _update: &Value,
        _upsert: bool,
    ) -> Result<Option<Document>> {
        Err(RecordStoreError::Unsupported("find_one_and_update"))
    }
}

/// Connection-level handle that hands out collections.
///
/// Implementations must not contact the server here; failures surface on the
/// first collection operation.
pub trait DocumentStore: Send + Sync {
    fn collection(&self, database: &str, collection: &str) -> Result<Arc<dyn DocumentCollection>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct ReadOnly;

    impl DocumentCollection for ReadOnly {
        fn name(&self) -> &str {
            "read_only"
        }

        fn find_one(&self, _filter: &Value, _sort: &[SortSpec]) -> Result<Option<Document>> {
            Ok(None)
        }

        fn find(&self, _filter: &Value) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }

        fn insert_one(&self, _document: Document) -> Result<InsertOneResult> {
            Ok(InsertOneResult::default())
        }

        fn update_many(&self, _filter: &Value, _update: &Value) -> Result<UpdateResult> {
            Ok(UpdateResult::default())
        }

        fn delete_many(&self, _filter: &Value) -> Result<DeleteResult> {
            Ok(DeleteResult::default())
        }
    }

    #[test]
    fn test_find_one_and_update_defaults_to_unsupported() {
        let err = ReadOnly
            .find_one_and_update(&json!({}), &json!({"$inc": {"seq": 1}}), true)
            .unwrap_err();

        assert!(matches!(err, RecordStoreError::Unsupported("find_one_and_update")));
    }

    #[test]
    fn test_result_serialization() {
        let result = UpdateResult { matched_count: 2, modified_count: 1 };
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({"matched_count": 2, "modified_count": 1})
        );

        let inserted = InsertOneResult { inserted_id: Some(DocumentId::Int(4)) };
        assert_eq!(serde_json::to_value(inserted).unwrap(), json!({"inserted_id": 4}));
    }
}
