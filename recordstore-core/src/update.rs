// src/update.rs
// Update operator evaluation for the in-memory collection
use serde_json::{Number, Value};

use crate::document::{get_path, remove_path, set_path, Document};
use crate::error::{RecordStoreError, Result};

#[derive(Debug, Clone)]
enum UpdateOperator {
    Set(String, Value),
    Unset(String),
    Inc(String, Number),
}

/// Parsed update document (`{"$set": {...}, "$inc": {...}}`)
#[derive(Debug, Clone)]
pub struct Update {
    operators: Vec<UpdateOperator>,
}

impl Update {
    pub fn from_json(json: &Value) -> Result<Self> {
        let map = json.as_object().ok_or_else(|| {
            RecordStoreError::InvalidQuery("update must be a document".into())
        })?;

        if map.is_empty() {
            return Err(RecordStoreError::InvalidQuery(
                "update document must contain at least one operator".into(),
            ));
        }

        let mut operators = Vec::new();
        for (op, fields) in map {
            if !op.starts_with('$') {
                return Err(RecordStoreError::InvalidQuery(format!(
                    "update document requires operators, found field '{}'",
                    op
                )));
            }
            if !matches!(op.as_str(), "$set" | "$unset" | "$inc") {
                return Err(RecordStoreError::InvalidQuery(format!(
                    "Unsupported update operator: {}",
                    op
                )));
            }

            let fields = fields.as_object().ok_or_else(|| {
                RecordStoreError::InvalidQuery(format!("{} requires a document of fields", op))
            })?;

            for (field, value) in fields {
                let operator = match (op.as_str(), value) {
                    ("$set", _) => UpdateOperator::Set(field.clone(), value.clone()),
                    ("$unset", _) => UpdateOperator::Unset(field.clone()),
                    (_, Value::Number(n)) => UpdateOperator::Inc(field.clone(), n.clone()),
                    _ => {
                        return Err(RecordStoreError::InvalidQuery(format!(
                            "$inc value for '{}' must be numeric",
                            field
                        )))
                    }
                };
                operators.push(operator);
            }
        }

        Ok(Update { operators })
    }

    /// Apply to `document` in place; returns whether anything changed.
    ///
    /// On error the document may be partially updated, callers apply to a copy.
    pub fn apply(&self, document: &mut Document) -> Result<bool> {
        let mut modified = false;

        for operator in &self.operators {
            match operator {
                UpdateOperator::Set(field, value) => {
                    if get_path(document, field) != Some(value) {
                        set_path(document, field, value.clone())?;
                        modified = true;
                    }
                }
                UpdateOperator::Unset(field) => {
                    if remove_path(document, field).is_some() {
                        modified = true;
                    }
                }
                UpdateOperator::Inc(field, by) => {
                    let next = match get_path(document, field) {
                        None => Value::Number(by.clone()),
                        Some(Value::Number(current)) => increment(current, by)?,
                        Some(_) => {
                            return Err(RecordStoreError::InvalidQuery(format!(
                                "cannot apply $inc to non-numeric field '{}'",
                                field
                            )))
                        }
                    };
                    if get_path(document, field) != Some(&next) {
                        set_path(document, field, next)?;
                        modified = true;
                    }
                }
            }
        }

        Ok(modified)
    }
}

/// Integer arithmetic when both sides are integers, float otherwise.
fn increment(current: &Number, by: &Number) -> Result<Value> {
    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        return a
            .checked_add(b)
            .map(Value::from)
            .ok_or_else(|| RecordStoreError::InvalidQuery("$inc overflowed i64".into()));
    }

    let a = current.as_f64().unwrap_or(0.0);
    let b = by.as_f64().unwrap_or(0.0);
    Number::from_f64(a + b)
        .map(Value::Number)
        .ok_or_else(|| RecordStoreError::InvalidQuery("$inc produced a non-finite number".into()))
}
