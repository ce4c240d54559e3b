// src/query.rs
// Filter evaluation for the in-memory collection
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;

use crate::document::{get_path, Document};
use crate::error::{RecordStoreError, Result};
use crate::sort::compare_numbers;

/// Field-level operators
#[derive(Debug, Clone)]
pub enum QueryOperator {
    Eq(Value),           // $eq
    Ne(Value),           // $ne
    Gt(Value),           // $gt
    Gte(Value),          // $gte
    Lt(Value),           // $lt
    Lte(Value),          // $lte
    In(Vec<Value>),      // $in
    Nin(Vec<Value>),     // $nin
    Exists(bool),        // $exists
    Regex(Regex),        // $regex (+ $options)
    Not(Box<QueryOperator>), // $not
    All(Vec<QueryOperator>), // several operators on one field
}

#[derive(Debug, Clone)]
enum Condition {
    Field { path: String, operator: QueryOperator },
    And(Vec<Query>),
    Or(Vec<Query>),
    Nor(Vec<Query>),
}

/// Parsed Mongo-style filter document
#[derive(Debug, Clone, Default)]
pub struct Query {
    conditions: Vec<Condition>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn from_json(json: &Value) -> Result<Self> {
        let map = json.as_object().ok_or_else(|| {
            RecordStoreError::InvalidQuery("filter must be a document".into())
        })?;

        let mut conditions = Vec::with_capacity(map.len());
        for (field, condition) in map {
            if field.starts_with('$') {
                conditions.push(Self::parse_logical_operator(field, condition)?);
            } else {
                conditions.push(Condition::Field {
                    path: field.clone(),
                    operator: Self::parse_operator(condition)?,
                });
            }
        }

        Ok(Query { conditions })
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Condition> {
        let arr = value.as_array().ok_or_else(|| {
            RecordStoreError::InvalidQuery(format!("{} requires array", op))
        })?;
        let queries = arr.iter().map(Self::from_json).collect::<Result<Vec<_>>>()?;

        match op {
            "$and" => Ok(Condition::And(queries)),
            "$or" => Ok(Condition::Or(queries)),
            "$nor" => Ok(Condition::Nor(queries)),
            _ => Err(RecordStoreError::InvalidQuery(format!(
                "Unknown logical operator: {}",
                op
            ))),
        }
    }

    fn parse_operator(value: &Value) -> Result<QueryOperator> {
        let map = match value {
            Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
            // Plain values and embedded documents are equality matches
            _ => return Ok(QueryOperator::Eq(value.clone())),
        };

        let mut operators = Vec::with_capacity(map.len());
        for (op, val) in map {
            let operator = match op.as_str() {
                "$eq" => QueryOperator::Eq(val.clone()),
                "$ne" => QueryOperator::Ne(val.clone()),
                "$gt" => QueryOperator::Gt(val.clone()),
                "$gte" => QueryOperator::Gte(val.clone()),
                "$lt" => QueryOperator::Lt(val.clone()),
                "$lte" => QueryOperator::Lte(val.clone()),
                "$in" => QueryOperator::In(Self::expect_array(op, val)?),
                "$nin" => QueryOperator::Nin(Self::expect_array(op, val)?),
                "$exists" => match val {
                    Value::Bool(b) => QueryOperator::Exists(*b),
                    _ => return Err(RecordStoreError::InvalidQuery("$exists requires bool".into())),
                },
                "$regex" => {
                    let options = map.get("$options").and_then(Value::as_str).unwrap_or("");
                    QueryOperator::Regex(Self::compile_regex(val, options)?)
                }
                "$options" => {
                    if !map.contains_key("$regex") {
                        return Err(RecordStoreError::InvalidQuery(
                            "$options requires $regex".into(),
                        ));
                    }
                    continue;
                }
                "$not" => QueryOperator::Not(Box::new(Self::parse_operator(val)?)),
                _ => {
                    return Err(RecordStoreError::InvalidQuery(format!(
                        "Unknown operator: {}",
                        op
                    )))
                }
            };
            operators.push(operator);
        }

        if operators.len() == 1 {
            Ok(operators.remove(0))
        } else {
            Ok(QueryOperator::All(operators))
        }
    }

    fn expect_array(op: &str, value: &Value) -> Result<Vec<Value>> {
        value
            .as_array()
            .cloned()
            .ok_or_else(|| RecordStoreError::InvalidQuery(format!("{} requires array", op)))
    }

    fn compile_regex(pattern: &Value, options: &str) -> Result<Regex> {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| RecordStoreError::InvalidQuery("$regex requires string".into()))?;

        let mut builder = RegexBuilder::new(pattern);
        for flag in options.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(RecordStoreError::InvalidQuery(format!(
                        "Unknown $regex option: {}",
                        other
                    )))
                }
            };
        }

        builder
            .build()
            .map_err(|e| RecordStoreError::InvalidQuery(format!("bad $regex: {}", e)))
    }

    /// Does the document satisfy every condition?
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Field { path, operator } => {
                Self::matches_operator(get_path(document, path), operator)
            }
            Condition::And(queries) => queries.iter().all(|q| q.matches(document)),
            Condition::Or(queries) => queries.iter().any(|q| q.matches(document)),
            Condition::Nor(queries) => !queries.iter().any(|q| q.matches(document)),
        })
    }

    fn matches_operator(value: Option<&Value>, operator: &QueryOperator) -> bool {
        match operator {
            QueryOperator::Eq(target) => Self::equals(value, target),
            QueryOperator::Ne(target) => !Self::equals(value, target),
            QueryOperator::Gt(target) => Self::ordered(value, target, |o| o == Ordering::Greater),
            QueryOperator::Gte(target) => Self::ordered(value, target, |o| o != Ordering::Less),
            QueryOperator::Lt(target) => Self::ordered(value, target, |o| o == Ordering::Less),
            QueryOperator::Lte(target) => Self::ordered(value, target, |o| o != Ordering::Greater),
            QueryOperator::In(targets) => targets.iter().any(|t| Self::equals(value, t)),
            QueryOperator::Nin(targets) => !targets.iter().any(|t| Self::equals(value, t)),
            QueryOperator::Exists(should_exist) => value.is_some() == *should_exist,
            QueryOperator::Regex(re) => match value {
                Some(Value::String(s)) => re.is_match(s),
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| item.as_str().map_or(false, |s| re.is_match(s))),
                _ => false,
            },
            QueryOperator::Not(inner) => !Self::matches_operator(value, inner),
            QueryOperator::All(operators) => {
                operators.iter().all(|op| Self::matches_operator(value, op))
            }
        }
    }

    /// Equality with Mongo conveniences: `null` matches a missing field and
    /// an array field matches any of its elements.
    fn equals(value: Option<&Value>, target: &Value) -> bool {
        match value {
            None => target.is_null(),
            Some(v) if v == target => true,
            Some(Value::Number(a)) => match target {
                Value::Number(b) => compare_numbers(a, b) == Some(Ordering::Equal),
                _ => false,
            },
            Some(Value::Array(items)) => items.iter().any(|item| item == target),
            Some(_) => false,
        }
    }

    fn ordered(value: Option<&Value>, target: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        value
            .and_then(|v| Self::compare_values(v, target))
            .map_or(false, accept)
    }

    fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Number(n1), Value::Number(n2)) => compare_numbers(n1, n2),
            (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
            (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
            _ => None,
        }
    }
}
