// recordstore-core/src/record_store.rs
// Validated CRUD façade over one document collection

use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::collection::{DocumentCollection, DocumentStore};
use crate::config::{FailurePolicy, NumberingStrategy, StoreConfig};
use crate::document::{Document, RECORD_NUMBER_FIELD};
use crate::error::{RecordStoreError, Result};
use crate::sort::SortSpec;

/// Counter documents look like `{"_id": <key>, "seq": <last issued number>}`
pub const COUNTER_FIELD: &str = "seq";

/// Create/read/update/delete over a single fixed collection.
///
/// Arguments are validated here; everything else is delegated to the
/// collection. Store failures are logged and, under [`FailurePolicy::Soft`],
/// turned into `false` / empty / `0` results.
///
/// Record numbers default to "current maximum plus one", which two concurrent
/// `create` calls can both observe. Use [`NumberingStrategy::AtomicCounter`]
/// when writers are not serialized.
pub struct RecordStore {
    collection: Arc<dyn DocumentCollection>,
    counters: Option<Arc<dyn DocumentCollection>>,
    config: StoreConfig,
}

impl RecordStore {
    /// Resolve the configured collection (and counter collection, if any)
    /// through `store`. Nothing is sent to the server.
    pub fn connect(config: StoreConfig, store: &dyn DocumentStore) -> Result<Self> {
        config.validate()?;

        let collection = store.collection(&config.database, &config.collection)?;
        let counters = match &config.numbering {
            NumberingStrategy::MaxPlusOne => None,
            NumberingStrategy::AtomicCounter { collection, .. } => {
                Some(store.collection(&config.database, collection)?)
            }
        };

        log::info!("record store bound to {}", config);
        Ok(RecordStore { collection, counters, config })
    }

    /// Wrap an existing collection handle. An atomic-counter configuration
    /// also needs [`with_counter_collection`](Self::with_counter_collection).
    pub fn from_collection(collection: Arc<dyn DocumentCollection>, config: StoreConfig) -> Self {
        RecordStore { collection, counters: None, config }
    }

    pub fn with_counter_collection(mut self, counters: Arc<dyn DocumentCollection>) -> Self {
        self.counters = Some(counters);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn collection(&self) -> &Arc<dyn DocumentCollection> {
        &self.collection
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.config.failure_policy
    }

    /// Number `create` would assign next: 1 for an empty collection.
    ///
    /// Failures are logged and returned regardless of the failure policy.
    pub fn next_record_number(&self) -> Result<i64> {
        let next = match &self.config.numbering {
            NumberingStrategy::MaxPlusOne => self.max_plus_one(),
            NumberingStrategy::AtomicCounter { key, .. } => self.increment_counter(key),
        };

        next.map_err(|e| self.report("next_record_number", e))
    }

    fn max_plus_one(&self) -> Result<i64> {
        // Numeric record numbers only; other types sort above numbers.
        let filter = json!({ RECORD_NUMBER_FIELD: { "$gte": i64::MIN } });
        let last = self
            .collection
            .find_one(&filter, &[SortSpec::descending(RECORD_NUMBER_FIELD)])?;

        let current = last
            .as_ref()
            .and_then(|doc| doc.get(RECORD_NUMBER_FIELD))
            .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)))
            .unwrap_or(0);

        current
            .checked_add(1)
            .ok_or_else(|| RecordStoreError::InvalidQuery("record_number overflowed i64".into()))
    }

    fn increment_counter(&self, key: &str) -> Result<i64> {
        let counters = self.counters.as_ref().ok_or_else(|| {
            RecordStoreError::Config("atomic counter numbering without a counter collection".into())
        })?;

        let counter = counters
            .find_one_and_update(
                &json!({ "_id": key }),
                &json!({ "$inc": { COUNTER_FIELD: 1 } }),
                true,
            )?
            .ok_or_else(|| {
                RecordStoreError::Unavailable(format!("counter '{}' was not returned", key))
            })?;

        counter
            .get(COUNTER_FIELD)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                RecordStoreError::InvalidQuery(format!("counter '{}' has no integer seq", key))
            })
    }

    /// Assign the next `record_number` to `data` (in place) and insert it.
    ///
    /// Returns whether the store reported an identity for the new document.
    /// `data` keeps its `record_number` even when the insert fails.
    pub fn create(&self, data: &mut Value) -> Result<bool> {
        let document = require_mapping_mut(data, "data is empty or not a mapping")?;

        let record_number = match self.next_record_number() {
            Ok(number) => number,
            Err(err) => return self.recover(err, false),
        };
        document.insert(RECORD_NUMBER_FIELD.to_string(), Value::from(record_number));

        match self.collection.insert_one(document.clone()) {
            Ok(result) => {
                log::debug!(
                    "created record {} in {}: {:?}",
                    record_number,
                    self.collection.name(),
                    result.inserted_id
                );
                Ok(result.inserted_id.is_some())
            }
            Err(e) => {
                let err = self.report("create", e);
                self.recover(err, false)
            }
        }
    }

    /// All documents matching `query`, in the order the store yields them.
    pub fn read(&self, query: &Value) -> Result<Vec<Document>> {
        require_mapping(query, "query cannot be empty")?;

        match self.collection.find(query) {
            Ok(documents) => {
                log::debug!("read {} documents from {}", documents.len(), self.collection.name());
                Ok(documents)
            }
            Err(e) => {
                let err = self.report("read", e);
                self.recover(err, Vec::new())
            }
        }
    }

    /// Apply `update_data` to every match; returns the number of modified documents.
    pub fn update(&self, query: &Value, update_data: &Value) -> Result<u64> {
        require_mapping(query, "query cannot be empty and must be a mapping")?;
        require_mapping(update_data, "update_data cannot be empty and must be a mapping")?;

        match self.collection.update_many(query, update_data) {
            Ok(result) => {
                log::debug!(
                    "update on {} matched {} modified {}",
                    self.collection.name(),
                    result.matched_count,
                    result.modified_count
                );
                Ok(result.modified_count)
            }
            Err(e) => {
                let err = self.report("update", e);
                self.recover(err, 0)
            }
        }
    }

    /// Remove every match; returns the number of removed documents.
    pub fn delete(&self, query: &Value) -> Result<u64> {
        require_mapping(query, "query cannot be empty and must be a mapping")?;

        match self.collection.delete_many(query) {
            Ok(result) => {
                log::debug!("deleted {} from {}", result.deleted_count, self.collection.name());
                Ok(result.deleted_count)
            }
            Err(e) => {
                let err = self.report("delete", e);
                self.recover(err, 0)
            }
        }
    }

    fn report(&self, operation: &'static str, source: RecordStoreError) -> RecordStoreError {
        let err = RecordStoreError::store_failure(operation, source);
        log::error!("{} on {}: {}", operation, self.config.namespace(), err);
        err
    }

    fn recover<T>(&self, err: RecordStoreError, fallback: T) -> Result<T> {
        match self.config.failure_policy {
            FailurePolicy::Soft => Ok(fallback),
            FailurePolicy::Strict => Err(err),
        }
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("collection", &self.collection.name())
            .field("config", &self.config)
            .finish()
    }
}

fn require_mapping<'a>(value: &'a Value, message: &str) -> Result<&'a Document> {
    value
        .as_object()
        .ok_or_else(|| RecordStoreError::InvalidArgument(message.to_string()))
}

fn require_mapping_mut<'a>(value: &'a mut Value, message: &str) -> Result<&'a mut Document> {
    value
        .as_object_mut()
        .ok_or_else(|| RecordStoreError::InvalidArgument(message.to_string()))
}
