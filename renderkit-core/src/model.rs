//! Data Model - Named Values for a Single Render

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Variable name to value mapping supplied per render call.
///
/// Values are JSON values: scalars, arrays (used for sets and lists) and
/// nested objects. Keys are kept sorted so iteration is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataModel {
    values: BTreeMap<String, Value>,
}

impl DataModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a collection of values. Duplicates are dropped and the remaining
    /// items are sorted, giving set semantics with a stable iteration order.
    pub fn with_set<I, T>(mut self, name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut items: Vec<String> = items.into_iter().map(Into::into).collect();
        items.sort();
        items.dedup();
        self.values
            .insert(name.into(), Value::Array(items.into_iter().map(Value::String).collect()));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build from a JSON value. Anything but an object yields `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.into()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for DataModel {
    fn from(map: Map<String, Value>) -> Self {
        Self { values: map.into_iter().collect() }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DataModel {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let model = DataModel::new().with("name", "World").with("count", 3);
        assert_eq!(model.len(), 2);
        assert_eq!(model.get("name"), Some(&json!("World")));
        assert_eq!(model.get("count"), Some(&json!(3)));
    }

    #[test]
    fn test_set_dedup_and_sorted() {
        let model = DataModel::new().with_set("codes", ["EU", "CA", "EU"]);
        assert_eq!(model.get("codes"), Some(&json!(["CA", "EU"])));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let model = DataModel::new().with("b", 1).with("a", json!({"x": true}));
        let s = serde_json::to_string(&model).unwrap();
        assert_eq!(s, r#"{"a":{"x":true},"b":1}"#);
    }

    #[test]
    fn test_from_json_requires_object() {
        assert!(DataModel::from_json(json!([1, 2])).is_none());
        let model = DataModel::from_json(json!({"k": "v"})).unwrap();
        assert_eq!(model.get("k"), Some(&json!("v")));
    }

    #[test]
    fn test_from_iterator() {
        let model: DataModel = vec![("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(model.len(), 2);
    }
}
