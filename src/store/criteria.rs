//! Query criteria in the document-store dialect.
//!
//! A `Criteria` is a conjunction of per-field conditions. It converts to and
//! from the JSON filter form (`{"field": value}`, `{"field": {"$in": [...]}}`)
//! so prechunked filters can be handed to external workers verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::BuildError;
use crate::types::FieldName;

/// A stored document.
pub type Document = Map<String, Value>;

/// A single per-field predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Field equals the value (or, for array fields, contains it).
    Eq(Value),
    /// Field equals any of the values.
    In(Vec<Value>),
    /// Field is absent or differs from the value.
    Ne(Value),
    /// Field presence (`true`) or absence (`false`). `null` counts as present.
    Exists(bool),
}

impl Condition {
    fn matches(&self, found: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => found.is_some_and(|value| value_matches(value, expected)),
            Self::In(options) => found.is_some_and(|value| {
                options
                    .iter()
                    .any(|expected| value_matches(value, expected))
            }),
            Self::Ne(expected) => !found.is_some_and(|value| value_matches(value, expected)),
            Self::Exists(wanted) => found.is_some() == *wanted,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Eq(value) => value.clone(),
            Self::In(values) => single("$in", Value::Array(values.clone())),
            Self::Ne(value) => single("$ne", value.clone()),
            Self::Exists(flag) => single("$exists", Value::Bool(*flag)),
        }
    }

    fn from_json(field: &str, raw: Value) -> Result<Vec<Self>, BuildError> {
        let Value::Object(map) = raw else {
            return Ok(vec![Self::Eq(raw)]);
        };
        if !map.keys().any(|key| key.starts_with('$')) {
            return Ok(vec![Self::Eq(Value::Object(map))]);
        }
        let mut conditions = Vec::with_capacity(map.len());
        for (op, operand) in map {
            let condition = match (op.as_str(), operand) {
                ("$eq", value) => Self::Eq(value),
                ("$in", Value::Array(values)) => Self::In(values),
                ("$ne", value) => Self::Ne(value),
                ("$exists", Value::Bool(flag)) => Self::Exists(flag),
                ("$exists", Value::Number(n)) => Self::Exists(n.as_f64() != Some(0.0)),
                (op, _) => {
                    return Err(BuildError::Configuration(format!(
                        "unsupported operator '{op}' on field '{field}'"
                    )));
                }
            };
            conditions.push(condition);
        }
        Ok(conditions)
    }
}

/// Conjunction of field conditions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Criteria {
    clauses: Vec<(FieldName, Condition)>,
}

impl Criteria {
    /// Criteria matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(self, field: impl Into<FieldName>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    /// Require `field` to equal one of `values`.
    pub fn is_in<I, V>(self, field: impl Into<FieldName>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(
            field,
            Condition::In(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Require `field != value`.
    pub fn ne(self, field: impl Into<FieldName>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Ne(value.into()))
    }

    /// Require `field` to be present (`true`) or absent (`false`).
    pub fn exists(self, field: impl Into<FieldName>, present: bool) -> Self {
        self.with(field, Condition::Exists(present))
    }

    /// Append an arbitrary clause.
    pub fn with(mut self, field: impl Into<FieldName>, condition: Condition) -> Self {
        self.clauses.push((field.into(), condition));
        self
    }

    /// Conjoin `other` onto this criteria.
    pub fn merge(mut self, other: &Criteria) -> Self {
        self.clauses.extend(other.clauses.iter().cloned());
        self
    }

    /// Returns `true` when no clause is present.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Iterate the clauses in insertion order.
    pub fn clauses(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.clauses
            .iter()
            .map(|(field, condition)| (field.as_str(), condition))
    }

    /// Evaluate the criteria against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, condition)| condition.matches(lookup(doc, field)))
    }

    /// Render in the JSON filter dialect. Repeated fields are folded into one operator object.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (field, condition) in &self.clauses {
            let rendered = condition.to_json();
            match out.get_mut(field) {
                Some(existing) => {
                    let mut ops = operator_map(existing.take());
                    ops.extend(operator_map(rendered));
                    *existing = Value::Object(ops);
                }
                None => {
                    out.insert(field.clone(), rendered);
                }
            }
        }
        Value::Object(out)
    }

    /// Parse the JSON filter dialect.
    pub fn from_json(raw: Value) -> Result<Self, BuildError> {
        let Value::Object(map) = raw else {
            return Err(BuildError::Configuration(
                "criteria must be a JSON object".to_string(),
            ));
        };
        let mut criteria = Self::new();
        for (field, value) in map {
            for condition in Condition::from_json(&field, value)? {
                criteria.clauses.push((field.clone(), condition));
            }
        }
        Ok(criteria)
    }
}

impl TryFrom<Value> for Criteria {
    type Error = BuildError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

impl From<Criteria> for Value {
    fn from(criteria: Criteria) -> Self {
        criteria.to_json()
    }
}

/// Resolve a dotted field path inside a document.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Keep only the requested top-level fields (dotted paths keep their root field).
pub fn project(doc: &Document, fields: &[&str]) -> Document {
    let mut out = Document::new();
    for field in fields {
        let root = field.split('.').next().unwrap_or(field);
        if let Some(value) = doc.get(root) {
            out.insert(root.to_string(), value.clone());
        }
    }
    out
}

fn value_matches(found: &Value, expected: &Value) -> bool {
    if found == expected {
        return true;
    }
    match found {
        Value::Array(items) if !expected.is_array() => items.iter().any(|item| item == expected),
        _ => false,
    }
}

fn operator_map(rendered: Value) -> Map<String, Value> {
    match rendered {
        Value::Object(ops) if !ops.is_empty() && ops.keys().all(|key| key.starts_with('$')) => ops,
        other => {
            let mut ops = Map::new();
            ops.insert("$eq".to_string(), other);
            ops
        }
    }
}

fn single(op: &str, operand: Value) -> Value {
    let mut map = Map::new();
    map.insert(op.to_string(), operand);
    Value::Object(map)
}
