// src/document.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{RecordStoreError, Result};

/// Ordered field-name to value mapping. Field order follows insertion order.
pub type Document = serde_json::Map<String, Value>;

/// Identity field assigned by the collection on insert
pub const ID_FIELD: &str = "_id";

/// Field injected by `RecordStore::create`
pub const RECORD_NUMBER_FIELD: &str = "record_number";

/// Identity a collection assigns to an inserted document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    String(String),
    ObjectId(String),
}

impl DocumentId {
    /// Fresh ObjectId (UUID v4 string)
    pub fn new_object_id() -> Self {
        DocumentId::ObjectId(Uuid::new_v4().to_string())
    }

    /// Reads an identity out of a stored `_id` value. Only integers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(DocumentId::Int),
            Value::String(s) => Some(DocumentId::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DocumentId::Int(i) => Value::from(*i),
            DocumentId::String(s) | DocumentId::ObjectId(s) => Value::String(s.clone()),
        }
    }
}

/// Resolve a dotted path (`"owner.name"`) inside a document.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// Set a dotted path, creating intermediate objects as needed.
///
/// Fails when an intermediate segment exists but is not an object.
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<()> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or(path);

    let mut current = doc;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Document::new()));

        current = entry.as_object_mut().ok_or_else(|| {
            RecordStoreError::InvalidQuery(format!(
                "cannot create field '{}' inside non-object '{}'",
                path, segment
            ))
        })?;
    }

    current.insert(last.to_string(), value);
    Ok(())
}

/// Remove a dotted path. Missing intermediates are not an error.
pub fn remove_path(doc: &mut Document, path: &str) -> Option<Value> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop()?;

    let mut current = doc;
    for segment in segments {
        current = current.get_mut(segment)?.as_object_mut()?;
    }

    current.remove(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected object"),
        }
    }

    #[test]
    fn test_document_id_object_id() {
        let id = DocumentId::new_object_id();

        match id {
            DocumentId::ObjectId(s) => {
                assert_eq!(s.len(), 36);
                assert!(s.contains('-'));
            }
            _ => panic!("Expected ObjectId variant"),
        }
    }

    #[test]
    fn test_document_id_from_value() {
        assert_eq!(DocumentId::from_value(&json!(7)), Some(DocumentId::Int(7)));
        assert_eq!(
            DocumentId::from_value(&json!("abc")),
            Some(DocumentId::String("abc".to_string()))
        );
        assert_eq!(DocumentId::from_value(&json!(1.5)), None);
        assert_eq!(DocumentId::from_value(&json!({"a": 1})), None);
    }

    #[test]
    fn test_document_id_to_value() {
        assert_eq!(DocumentId::Int(3).to_value(), json!(3));
        assert_eq!(DocumentId::ObjectId("x".into()).to_value(), json!("x"));
    }

    #[test]
    fn test_document_preserves_field_order() {
        let mut d = Document::new();
        d.insert("zeta".into(), json!(1));
        d.insert("alpha".into(), json!(2));
        d.insert(RECORD_NUMBER_FIELD.into(), json!(3));

        let keys: Vec<&String> = d.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "record_number"]);
    }

    #[test]
    fn test_get_path_nested() {
        let d = doc(json!({"owner": {"name": "Ann", "address": {"city": "Austin"}}}));

        assert_eq!(get_path(&d, "owner.name"), Some(&json!("Ann")));
        assert_eq!(get_path(&d, "owner.address.city"), Some(&json!("Austin")));
        assert_eq!(get_path(&d, "owner.age"), None);
        assert_eq!(get_path(&d, "owner.name.first"), None);
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut d = Document::new();
        set_path(&mut d, "outcome.type", json!("Adoption")).unwrap();

        assert_eq!(Value::Object(d), json!({"outcome": {"type": "Adoption"}}));
    }

    #[test]
    fn test_set_path_through_scalar_fails() {
        let mut d = doc(json!({"outcome": "Adoption"}));
        let err = set_path(&mut d, "outcome.type", json!("Transfer")).unwrap_err();

        assert!(matches!(err, RecordStoreError::InvalidQuery(_)));
    }

    #[test]
    fn test_remove_path() {
        let mut d = doc(json!({"a": {"b": 1, "c": 2}, "d": 3}));

        assert_eq!(remove_path(&mut d, "a.b"), Some(json!(1)));
        assert_eq!(remove_path(&mut d, "d"), Some(json!(3)));
        assert_eq!(remove_path(&mut d, "x.y"), None);
        assert_eq!(Value::Object(d), json!({"a": {"c": 2}}));
    }
}
