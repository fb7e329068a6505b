//! Session-scoped variable store.

use crate::Map;
use serde_json::Value;
use std::collections::BTreeMap;

/// Mapping from variable names to JSON-serialized values.
///
/// Values are always stored in their serialized form, so a variable written
/// by one function call can be decoded by any later one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    values: BTreeMap<String, String>,
}

impl VariableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes `value` and stores it under `name`.
    pub fn set(&mut self, name: impl Into<String>, value: &Value) {
        let name = name.into();
        tracing::debug!(variable = %name, "variable stored");
        self.values.insert(name, value.to_string());
    }

    /// Stores an already serialized value under `name`.
    ///
    /// The input must be valid JSON; otherwise it is stored as a JSON string.
    pub fn set_raw(&mut self, name: impl Into<String>, json: impl Into<String>) {
        let json = json.into();
        let json = if serde_json::from_str::<Value>(&json).is_ok() {
            json
        } else {
            Value::String(json).to_string()
        };
        self.values.insert(name.into(), json);
    }

    /// Returns the serialized value of the variable.
    #[inline]
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    /// Returns the decoded value of the variable.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values
            .get(name)
            .and_then(|json| serde_json::from_str(json).ok())
    }

    /// Returns `true` if the variable exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Removes the variable and returns its serialized value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    /// Returns all variables decoded into a JSON object.
    pub fn decoded(&self) -> Map {
        self.values
            .iter()
            .filter_map(|(name, json)| {
                serde_json::from_str(json)
                    .ok()
                    .map(|value| (name.clone(), value))
            })
            .collect()
    }

    /// Iterates over the variable names and serialized values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of variables.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no variables.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_stores_serialized_values() {
        let mut store = VariableStore::new();
        store.set("y", &json!("hi"));
        store.set("n", &json!({"a": [1, 2]}));
        assert_eq!(store.get_raw("y"), Some("\"hi\""));
        assert_eq!(store.get("n"), Some(json!({"a": [1, 2]})));
        assert_eq!(store.decoded().len(), 2);
    }

    #[test]
    fn it_keeps_raw_values_serializable() {
        let mut store = VariableStore::new();
        store.set_raw("a", "[1,2]");
        store.set_raw("b", "not json");
        assert_eq!(store.get("a"), Some(json!([1, 2])));
        assert_eq!(store.get_raw("b"), Some("\"not json\""));
        assert_eq!(store.remove("a").as_deref(), Some("[1,2]"));
        assert!(!store.contains("a"));
    }
}
