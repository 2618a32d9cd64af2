//! Attribute storage and the owner-level error list

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ResourceError, ResourceResult};

/// Raw attributes of a resource as received from (or sent to) the remote API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build attributes from a JSON object; any other JSON value is rejected
    pub fn from_value(value: Value) -> ResourceResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ResourceError::Serialization(format!(
                "expected a JSON object for resource attributes, got {}",
                other
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn includes(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Present and not JSON `null`
    pub fn is_present(&self, key: &str) -> bool {
        !matches!(self.0.get(key), None | Some(Value::Null))
    }

    /// Merge `other` into `self`, overwriting existing keys
    pub fn merge(&mut self, other: Attributes) {
        self.0.extend(other.0);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Key values compare by their string form: `7` and `"7"` address the same record
pub fn key_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Contract the association core uses to read and write owner state
pub trait AttributeStore {
    /// Attribute value, if the key is present
    fn get(&self, key: &str) -> Option<Value>;

    /// Assign an attribute
    fn set(&self, key: &str, value: Value);

    /// Whether the key is present at all (a JSON `null` counts as present)
    fn includes(&self, key: &str) -> bool;

    /// Whether the record exists remotely
    fn is_persisted(&self) -> bool;

    /// Whether the record has never been saved
    fn is_new_record(&self) -> bool {
        !self.is_persisted()
    }
}

/// Scope an error is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorScope {
    /// The record as a whole
    Base,
    /// A single attribute
    Attribute(String),
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorScope::Base => write!(f, "base"),
            ErrorScope::Attribute(name) => write!(f, "{}", name),
        }
    }
}

/// A single registered error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub scope: ErrorScope,
    pub code: String,
    pub context: BTreeMap<String, String>,
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.scope, self.code)?;
        for (key, value) in &self.context {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Errors registered on a resource by dependency handling or remote validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errors {
    entries: Vec<ErrorEntry>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, scope: ErrorScope, code: impl Into<String>, context: BTreeMap<String, String>) {
        self.entries.push(ErrorEntry {
            scope,
            code: code.into(),
            context,
        });
    }

    pub fn on(&self, scope: &ErrorScope) -> Vec<&ErrorEntry> {
        self.entries.iter().filter(|e| &e.scope == scope).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All messages joined for error reporting
    pub fn full_messages(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes_from_value() {
        let attrs = Attributes::from_value(json!({"id": 1, "title": "Hello", "author_id": null})).unwrap();
        assert!(attrs.includes("author_id"));
        assert!(!attrs.is_present("author_id"));
        assert!(attrs.is_present("title"));
        assert_eq!(attrs.get("id"), Some(&json!(1)));

        assert!(Attributes::from_value(json!([1, 2])).is_err());
        assert!(Attributes::from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_key_to_string() {
        assert_eq!(key_to_string(&json!(7)), Some("7".to_string()));
        assert_eq!(key_to_string(&json!("7")), Some("7".to_string()));
        assert_eq!(key_to_string(&Value::Null), None);
    }

    #[test]
    fn test_errors() {
        let mut errors = Errors::new();
        let mut context = BTreeMap::new();
        context.insert("record".to_string(), "comments".to_string());
        errors.add(ErrorScope::Base, "restrict_dependent_destroy.many", context);
        errors.add(ErrorScope::Attribute("title".to_string()), "blank", BTreeMap::new());

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.on(&ErrorScope::Base).len(), 1);
        assert_eq!(
            errors.full_messages(),
            "base restrict_dependent_destroy.many record=comments, title blank"
        );
    }
}
