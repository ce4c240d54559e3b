// recordstore-core/src/sort.rs
// Sort specifications for find_one

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;

use crate::document::{get_path, Document};
use crate::error::{RecordStoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl TryFrom<i32> for SortDirection {
    type Error = RecordStoreError;

    /// Mongo-style `1` / `-1`
    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(SortDirection::Ascending),
            -1 => Ok(SortDirection::Descending),
            other => Err(RecordStoreError::InvalidQuery(format!(
                "sort direction must be 1 or -1, got {}",
                other
            ))),
        }
    }
}

/// Sort on a single (possibly dotted) field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        SortSpec { field: field.into(), direction: SortDirection::Ascending }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        SortSpec { field: field.into(), direction: SortDirection::Descending }
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let cmp = compare_values(get_path(a, &self.field), get_path(b, &self.field));
        match self.direction {
            SortDirection::Ascending => cmp,
            SortDirection::Descending => cmp.reverse(),
        }
    }
}

/// Stable sort; documents that compare equal keep their stored order.
pub fn apply_sort(docs: &mut [Document], sort: &[SortSpec]) {
    if sort.is_empty() {
        return;
    }

    docs.sort_by(|a, b| compare_documents(a, b, sort));
}

/// Ordering of two documents under a multi-field sort
pub fn compare_documents(a: &Document, b: &Document, sort: &[SortSpec]) -> Ordering {
    sort.iter()
        .map(|spec| spec.compare(a, b))
        .find(|cmp| *cmp != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Compare two JSON values for sorting. Missing sorts with null.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    static NULL: Value = Value::Null;
    let a = a.unwrap_or(&NULL);
    let b = b.unwrap_or(&NULL);

    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            compare_numbers(n1, n2).unwrap_or(Ordering::Equal)
        }
        (Value::String(s1), Value::String(s2)) => s1.cmp(s2),
        (Value::Bool(b1), Value::Bool(b2)) => b1.cmp(b2),
        _ => type_priority(a).cmp(&type_priority(b)),
    }
}

/// Integers compare exactly; f64 only when either side is a float.
pub(crate) fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (as_integer(a), as_integer(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Type priority for mixed-type sorting
fn type_priority(val: &Value) -> u8 {
    match val {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
    }
}
