//! Open key-value representation of one table row.
//!
//! Fields are discovered from the data passed in, not declared at the type
//! level; typed accessors cover the narrow set of known columns (primary
//! key, parent links, extras bookkeeping).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object; anything else yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Record { fields }),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Integer view of a field; numeric strings parse too (extras are
    /// stored as text).
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Row identifier under the given primary-key field, when present and
    /// non-empty.
    pub fn row_id(&self, primary_key: &str) -> Option<i64> {
        self.get_i64(primary_key).filter(|id| *id != 0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Record { fields }
    }
}

/// Empty in the loose sense used by persistence: null or the empty string.
/// `0` and `false` are values, not absences.
pub(crate) fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Empty as a row key: additionally treats `0` (and `"0"`) as unset, so a
/// zero primary key routes a save to insert.
pub(crate) fn is_empty_key(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == "0",
        Value::Number(n) => n.as_i64() == Some(0) || n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        _ => false,
    }
}

/// Text rendering used when a value lands in the extras side table.
pub(crate) fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".into(),
        Value::Bool(false) => "0".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_read_as_integers() {
        let mut rec = Record::new();
        rec.insert("id", json!("42"));
        assert_eq!(rec.get_i64("id"), Some(42));
        assert_eq!(rec.row_id("id"), Some(42));
    }

    #[test]
    fn zero_and_false_are_not_empty_values() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!("")));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
    }

    #[test]
    fn zero_is_an_empty_key() {
        assert!(is_empty_key(&json!(0)));
        assert!(is_empty_key(&json!("0")));
        assert!(!is_empty_key(&json!(7)));
    }

    #[test]
    fn from_value_requires_an_object() {
        assert!(Record::from_value(json!({"id": 1})).is_some());
        assert!(Record::from_value(json!([1, 2])).is_none());
    }
}
