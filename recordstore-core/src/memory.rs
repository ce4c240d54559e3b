// recordstore-core/src/memory.rs
// Embedded in-memory backend for DocumentStore / DocumentCollection

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

use crate::collection::{
    DeleteResult, DocumentCollection, DocumentStore, InsertOneResult, UpdateResult,
};
use crate::document::{set_path, Document, DocumentId, ID_FIELD};
use crate::error::{RecordStoreError, Result};
use crate::query::Query;
use crate::sort::{compare_documents, SortSpec};
use crate::update::Update;

/// Process-local document store. Collections are created on first access.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<(String, String), Arc<MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle, for callers that need more than the trait surface
    pub fn memory_collection(&self, database: &str, collection: &str) -> Arc<MemoryCollection> {
        self.collections
            .entry((database.to_string(), collection.to_string()))
            .or_insert_with(|| {
                log::debug!("creating in-memory collection {}.{}", database, collection);
                Arc::new(MemoryCollection::new(collection))
            })
            .clone()
    }

    /// `database.collection` names, sorted
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .map(|entry| format!("{}.{}", entry.key().0, entry.key().1))
            .collect();
        names.sort();
        names
    }

    pub fn drop_collection(&self, database: &str, collection: &str) -> bool {
        self.collections
            .remove(&(database.to_string(), collection.to_string()))
            .is_some()
    }
}

impl DocumentStore for MemoryStore {
    fn collection(&self, database: &str, collection: &str) -> Result<Arc<dyn DocumentCollection>> {
        Ok(self.memory_collection(database, collection))
    }
}

/// Documents kept in insertion order behind a single lock
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryCollection {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Puts `_id` first, generating an ObjectId when absent.
    fn with_identity(documents: &[Document], mut document: Document) -> Result<(DocumentId, Document)> {
        let id = match document.remove(ID_FIELD) {
            Some(value) => {
                let id = DocumentId::from_value(&value).ok_or_else(|| {
                    RecordStoreError::InvalidQuery(format!("unsupported _id value: {}", value))
                })?;
                if documents.iter().any(|d| d.get(ID_FIELD) == Some(&value)) {
                    return Err(RecordStoreError::DuplicateKey(format!("_id {}", value)));
                }
                id
            }
            None => DocumentId::new_object_id(),
        };

        let mut stored = Document::with_capacity(document.len() + 1);
        stored.insert(ID_FIELD.to_string(), id.to_value());
        stored.extend(document);
        Ok((id, stored))
    }

    /// Applies `update` to a copy of `original`; `_id` may not change.
    fn updated_copy(original: &Document, update: &Update) -> Result<Option<Document>> {
        let mut copy = original.clone();
        if !update.apply(&mut copy)? {
            return Ok(None);
        }
        if copy.get(ID_FIELD) != original.get(ID_FIELD) {
            return Err(RecordStoreError::InvalidQuery("_id is immutable".into()));
        }
        Ok(Some(copy))
    }

    /// Seed document for an upsert: the filter's plain equality fields.
    fn upsert_seed(filter: &Value) -> Result<Document> {
        let mut seed = Document::new();
        if let Value::Object(map) = filter {
            for (field, value) in map {
                if field.starts_with('$') {
                    continue;
                }
                let is_operator = value
                    .as_object()
                    .map_or(false, |m| m.keys().any(|k| k.starts_with('$')));
                if !is_operator {
                    set_path(&mut seed, field, value.clone())?;
                }
            }
        }
        Ok(seed)
    }
}

impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_one(&self, filter: &Value, sort: &[SortSpec]) -> Result<Option<Document>> {
        let query = Query::from_json(filter)?;
        let documents = self.documents.read();

        let mut matches = documents.iter().filter(|d| query.matches(d));
        let found = if sort.is_empty() {
            matches.next()
        } else {
            matches.min_by(|a, b| compare_documents(a, b, sort))
        };

        Ok(found.cloned())
    }

    fn find(&self, filter: &Value) -> Result<Vec<Document>> {
        let query = Query::from_json(filter)?;
        let documents = self.documents.read();

        Ok(documents
            .iter()
            .filter(|d| query.matches(d))
            .cloned()
            .collect())
    }

    fn insert_one(&self, document: Document) -> Result<InsertOneResult> {
        let mut documents = self.documents.write();
        let (id, stored) = Self::with_identity(&documents, document)?;
        documents.push(stored);

        log::debug!("inserted {:?} into {}", id, self.name);
        Ok(InsertOneResult { inserted_id: Some(id) })
    }

    fn update_many(&self, filter: &Value, update: &Value) -> Result<UpdateResult> {
        let query = Query::from_json(filter)?;
        let update = Update::from_json(update)?;
        let mut documents = self.documents.write();

        // Compute every change before touching the collection
        let mut matched = 0u64;
        let mut changes = Vec::new();
        for (position, document) in documents.iter().enumerate() {
            if !query.matches(document) {
                continue;
            }
            matched += 1;
            if let Some(updated) = Self::updated_copy(document, &update)? {
                changes.push((position, updated));
            }
        }

        let modified = changes.len() as u64;
        for (position, updated) in changes {
            documents[position] = updated;
        }

        log::debug!("{}: update matched {} modified {}", self.name, matched, modified);
        Ok(UpdateResult { matched_count: matched, modified_count: modified })
    }

    fn delete_many(&self, filter: &Value) -> Result<DeleteResult> {
        let query = Query::from_json(filter)?;
        let mut documents = self.documents.write();

        let before = documents.len();
        documents.retain(|d| !query.matches(d));
        let deleted = (before - documents.len()) as u64;

        log::debug!("{}: deleted {}", self.name, deleted);
        Ok(DeleteResult { deleted_count: deleted })
    }

    fn find_one_and_update(
        &self,
        filter: &Value,
        update: &Value,
        upsert: bool,
    ) -> Result<Option<Document>> {
        let query = Query::from_json(filter)?;
        let update = Update::from_json(update)?;
        let mut documents = self.documents.write();

        if let Some(position) = documents.iter().position(|d| query.matches(d)) {
            if let Some(updated) = Self::updated_copy(&documents[position], &update)? {
                documents[position] = updated;
            }
            return Ok(Some(documents[position].clone()));
        }

        if !upsert {
            return Ok(None);
        }

        let mut seed = Self::upsert_seed(filter)?;
        update.apply(&mut seed)?;
        let (_, stored) = Self::with_identity(&documents, seed)?;
        documents.push(stored.clone());

        log::debug!("{}: upserted document", self.name);
        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn seeded(values: Vec<Value>) -> MemoryCollection {
        let collection = MemoryCollection::new("animals");
        for value in values {
            collection.insert_one(doc(value)).unwrap();
        }
        collection
    }

    #[test]
    fn test_insert_assigns_object_id_first() {
        let collection = MemoryCollection::new("animals");
        let result = collection.insert_one(doc(json!({"name": "Rex"}))).unwrap();

        assert!(matches!(result.inserted_id, Some(DocumentId::ObjectId(_))));

        let stored = collection.find(&json!({})).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].keys().next().map(String::as_str), Some("_id"));
        assert_eq!(stored[0]["name"], json!("Rex"));
    }

    #[test]
    fn test_insert_keeps_caller_id_and_rejects_duplicates() {
        let collection = MemoryCollection::new("animals");
        let result = collection.insert_one(doc(json!({"_id": 7, "name": "Rex"}))).unwrap();
        assert_eq!(result.inserted_id, Some(DocumentId::Int(7)));

        let err = collection.insert_one(doc(json!({"_id": 7, "name": "Fido"}))).unwrap_err();
        assert!(matches!(err, RecordStoreError::DuplicateKey(_)));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_find_one_with_sort() {
        let collection = seeded(vec![
            json!({"record_number": 1}),
            json!({"record_number": 5}),
            json!({"record_number": 2}),
        ]);

        let top = collection
            .find_one(&json!({}), &[SortSpec::descending("record_number")])
            .unwrap()
            .unwrap();
        assert_eq!(top["record_number"], json!(5));

        let bottom = collection
            .find_one(&json!({}), &[SortSpec::ascending("record_number")])
            .unwrap()
            .unwrap();
        assert_eq!(bottom["record_number"], json!(1));
    }

    #[test]
    fn test_find_one_on_empty_collection() {
        let collection = MemoryCollection::new("animals");
        assert!(collection.find_one(&json!({}), &[]).unwrap().is_none());
        assert!(collection.is_empty());
    }

    #[test]
    fn test_find_preserves_insertion_order() {
        let collection = seeded(vec![
            json!({"name": "c", "animal_type": "Dog"}),
            json!({"name": "a", "animal_type": "Cat"}),
            json!({"name": "b", "animal_type": "Dog"}),
        ]);

        let dogs = collection.find(&json!({"animal_type": "Dog"})).unwrap();
        let names: Vec<&str> = dogs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn test_update_many_counts_matched_and_modified() {
        let collection = seeded(vec![
            json!({"name": "Rex", "status": "adopted"}),
            json!({"name": "Rex", "status": "intake"}),
            json!({"name": "Tom"}),
        ]);

        let result = collection
            .update_many(&json!({"name": "Rex"}), &json!({"$set": {"status": "adopted"}}))
            .unwrap();

        assert_eq!(result, UpdateResult { matched_count: 2, modified_count: 1 });
        assert_eq!(collection.find(&json!({"status": "adopted"})).unwrap().len(), 2);
    }

    #[test]
    fn test_update_many_is_all_or_nothing() {
        let collection = seeded(vec![
            json!({"name": "Rex", "age": 2}),
            json!({"name": "Rex", "age": "unknown"}),
        ]);

        let err = collection
            .update_many(&json!({"name": "Rex"}), &json!({"$inc": {"age": 1}}))
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::InvalidQuery(_)));

        // The first document was not touched
        let untouched = collection.find(&json!({"age": 2})).unwrap();
        assert_eq!(untouched.len(), 1);
    }

    #[test]
    fn test_update_rejects_id_change() {
        let collection = seeded(vec![json!({"_id": 1, "name": "Rex"})]);
        let err = collection
            .update_many(&json!({"name": "Rex"}), &json!({"$set": {"_id": 2}}))
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::InvalidQuery(_)));
    }

    #[test]
    fn test_update_validates_even_without_matches() {
        let collection = MemoryCollection::new("animals");
        assert!(collection.update_many(&json!({"name": "x"}), &json!({"name": "y"})).is_err());
    }

    #[test]
    fn test_delete_many() {
        let collection = seeded(vec![
            json!({"name": "Rex"}),
            json!({"name": "Rex"}),
            json!({"name": "Tom"}),
        ]);

        let result = collection.delete_many(&json!({"name": "Rex"})).unwrap();
        assert_eq!(result.deleted_count, 2);
        assert_eq!(collection.len(), 1);

        let result = collection.delete_many(&json!({"name": "Rex"})).unwrap();
        assert_eq!(result.deleted_count, 0);
    }

    #[test]
    fn test_find_one_and_update_upserts_then_increments() {
        let collection = MemoryCollection::new("counters");
        let filter = json!({"_id": "record_number"});
        let update = json!({"$inc": {"seq": 1}});

        let first = collection.find_one_and_update(&filter, &update, true).unwrap().unwrap();
        assert_eq!(first["_id"], json!("record_number"));
        assert_eq!(first["seq"], json!(1));

        let second = collection.find_one_and_update(&filter, &update, true).unwrap().unwrap();
        assert_eq!(second["seq"], json!(2));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_find_one_and_update_without_upsert() {
        let collection = MemoryCollection::new("counters");
        let result = collection
            .find_one_and_update(&json!({"_id": "x"}), &json!({"$inc": {"seq": 1}}), false)
            .unwrap();
        assert!(result.is_none());
        assert!(collection.is_empty());
    }

    #[test]
    fn test_store_reuses_collections() {
        let store = MemoryStore::new();
        let a = store.collection("aac", "animals").unwrap();
        a.insert_one(doc(json!({"name": "Rex"}))).unwrap();

        let b = store.collection("aac", "animals").unwrap();
        assert_eq!(b.find(&json!({})).unwrap().len(), 1);

        let other = store.collection("other", "animals").unwrap();
        assert!(other.find(&json!({})).unwrap().is_empty());

        assert_eq!(store.list_collections(), vec!["aac.animals", "other.animals"]);
        assert!(store.drop_collection("other", "animals"));
        assert_eq!(store.list_collections(), vec!["aac.animals"]);
    }
}
