//! Item model: a schemaless field map keyed by a string `id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::StoreError;

/// Name of the distinguished primary-key field.
pub const ID_FIELD: &str = "id";

/// An arbitrary mapping from field names to scalar, list, or nested-map
/// values, with one distinguished field `id` acting as the primary key.
///
/// Numeric fields travel to the store in a decimal-safe encoding and come
/// back as floating point; [`Item::normalized`] applies that boundary
/// locally so non-network backends observe the same contract. Values
/// outside `f64` precision do not survive the round trip exactly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Map<String, Value>);

impl Item {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The primary key, when present and string-typed.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Apply the store's decimal-to-float numeric boundary: every number
    /// in the item (nested values included) is re-expressed as the `f64`
    /// a read from the store would produce.
    pub fn normalized(&self) -> Item {
        let fields = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), normalize_value(v)))
            .collect();
        Self(fields)
    }
}

impl From<Map<String, Value>> for Item {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// An item is a JSON object; anything else is rejected.
impl TryFrom<Value> for Item {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(StoreError::InvalidItem(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
