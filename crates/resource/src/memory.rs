//! In-memory remote
//!
//! A [`RemoteFinder`] + [`RemotePersistence`] backed by process memory. It
//! keeps a journal of every call so tests can assert how often (and whether)
//! the remote was hit.

use std::sync::Mutex;

use dashmap::DashMap;
use serde_json::Value;

use crate::attributes::{key_to_string, Attributes, ErrorScope};
use crate::error::{ResourceError, ResourceResult};
use crate::model::ResourceClass;
use crate::remote::{NestedScope, RemoteFinder, RemotePersistence, SaveOutcome};

/// Remote operations recorded by [`MemoryRemote`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    Find,
    FindAll,
    FindSingleton,
    Count,
    Save,
    Destroy,
    Delete,
}

/// One journal entry
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub operation: RemoteOperation,
    pub class_name: String,
    pub detail: String,
}

/// Remote API simulated in memory, keyed by resource type name
#[derive(Debug, Default)]
pub struct MemoryRemote {
    records: DashMap<String, Vec<Attributes>>,
    required: DashMap<String, Vec<String>>,
    failures: DashMap<RemoteOperation, String>,
    journal: Mutex<Vec<RemoteCall>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record for a type without journaling
    pub fn insert(&self, class_name: &str, attributes: Value) -> ResourceResult<()> {
        let attributes = Attributes::from_value(attributes)?;
        self.records
            .entry(class_name.to_string())
            .or_default()
            .push(attributes);
        Ok(())
    }

    /// Reject saves of `class_name` records where `attribute` is blank
    pub fn require(&self, class_name: &str, attribute: &str) {
        self.required
            .entry(class_name.to_string())
            .or_default()
            .push(attribute.to_string());
    }

    /// Make the next call of `operation` fail with a remote error
    pub fn fail_next(&self, operation: RemoteOperation, message: impl Into<String>) {
        self.failures.insert(operation, message.into());
    }

    /// Current records of a type
    pub fn records(&self, class_name: &str) -> Vec<Attributes> {
        self.records
            .get(class_name)
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of journaled calls of `operation`
    pub fn calls(&self, operation: RemoteOperation) -> usize {
        self.journal()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Number of lookups of any kind
    pub fn lookups(&self) -> usize {
        self.journal()
            .iter()
            .filter(|call| {
                matches!(
                    call.operation,
                    RemoteOperation::Find
                        | RemoteOperation::FindAll
                        | RemoteOperation::FindSingleton
                        | RemoteOperation::Count
                )
            })
            .count()
    }

    pub fn journal(&self) -> Vec<RemoteCall> {
        match self.journal.lock() {
            Ok(journal) => journal.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear_journal(&self) {
        match self.journal.lock() {
            Ok(mut journal) => journal.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    fn record(&self, operation: RemoteOperation, class: &ResourceClass, detail: String) -> ResourceResult<()> {
        let call = RemoteCall {
            operation,
            class_name: class.name().to_string(),
            detail,
        };
        match self.journal.lock() {
            Ok(mut journal) => journal.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }

        match self.failures.remove(&operation) {
            Some((_, message)) => Err(ResourceError::Remote(message)),
            None => Ok(()),
        }
    }

    fn matching(&self, class: &ResourceClass, filters: &Attributes) -> Vec<Attributes> {
        self.records(class.name())
            .into_iter()
            .filter(|record| {
                filters.as_map().iter().all(|(key, expected)| {
                    record.get(key).and_then(key_to_string) == key_to_string(expected)
                })
            })
            .collect()
    }

    fn position(&self, class: &ResourceClass, id: &Value) -> Option<usize> {
        let wanted = key_to_string(id)?;
        let records = self.records.get(class.name())?;
        records
            .iter()
            .position(|record| record.get(class.primary_key()).and_then(key_to_string).as_deref() == Some(&wanted))
    }

    fn next_id(&self, class: &ResourceClass) -> Value {
        let max = self
            .records(class.name())
            .iter()
            .filter_map(|record| record.get(class.primary_key()).and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        Value::from(max + 1)
    }

    fn remove(&self, class: &ResourceClass, id: &Value) -> ResourceResult<()> {
        let position = self.position(class, id).ok_or_else(|| ResourceError::NotFound {
            resource: class.name().to_string(),
            key: class.primary_key().to_string(),
            id: key_to_string(id).unwrap_or_default(),
        })?;
        if let Some(mut records) = self.records.get_mut(class.name()) {
            records.remove(position);
        }
        Ok(())
    }
}

impl RemoteFinder for MemoryRemote {
    fn find(&self, class: &ResourceClass, id: &Value) -> ResourceResult<Option<Attributes>> {
        self.record(RemoteOperation::Find, class, key_to_string(id).unwrap_or_default())?;

        Ok(self
            .position(class, id)
            .and_then(|idx| self.records.get(class.name()).map(|records| records[idx].clone())))
    }

    fn find_all(&self, class: &ResourceClass, filters: &Attributes) -> ResourceResult<Vec<Attributes>> {
        self.record(RemoteOperation::FindAll, class, Value::from(filters.as_map().clone()).to_string())?;
        Ok(self.matching(class, filters))
    }

    fn find_singleton(&self, class: &ResourceClass, scope: &NestedScope) -> ResourceResult<Option<Attributes>> {
        self.record(RemoteOperation::FindSingleton, class, scope.path())?;

        let mut filters = scope.conditions.clone();
        filters.set(scope.parent_key.clone(), scope.parent_id.clone());
        Ok(self.matching(class, &filters).into_iter().next())
    }

    fn count(&self, class: &ResourceClass, filters: &Attributes) -> ResourceResult<usize> {
        self.record(RemoteOperation::Count, class, Value::from(filters.as_map().clone()).to_string())?;
        Ok(self.matching(class, filters).len())
    }
}

impl RemotePersistence for MemoryRemote {
    fn save(
        &self,
        class: &ResourceClass,
        attributes: &Attributes,
        new_record: bool,
        validate: bool,
    ) -> ResourceResult<SaveOutcome> {
        self.record(RemoteOperation::Save, class, Value::from(attributes.as_map().clone()).to_string())?;

        if validate {
            let blank: Vec<(ErrorScope, String)> = self
                .required
                .get(class.name())
                .map(|required| {
                    required
                        .iter()
                        .filter(|attribute| !attributes.is_present(attribute))
                        .map(|attribute| (ErrorScope::Attribute(attribute.clone()), "blank".to_string()))
                        .collect()
                })
                .unwrap_or_default();

            if !blank.is_empty() {
                return Ok(SaveOutcome::Invalid(blank));
            }
        }

        let mut saved = attributes.clone();
        if new_record && !saved.is_present(class.primary_key()) {
            saved.set(class.primary_key(), self.next_id(class));
        }

        let existing = saved
            .get(class.primary_key())
            .cloned()
            .and_then(|id| self.position(class, &id));

        let mut records = self.records.entry(class.name().to_string()).or_default();
        match existing {
            Some(idx) => records[idx] = saved.clone(),
            None => records.push(saved.clone()),
        }

        Ok(SaveOutcome::Saved(saved))
    }

    fn destroy(&self, class: &ResourceClass, id: &Value) -> ResourceResult<()> {
        self.record(RemoteOperation::Destroy, class, key_to_string(id).unwrap_or_default())?;
        self.remove(class, id)
    }

    fn delete(&self, class: &ResourceClass, id: &Value) -> ResourceResult<()> {
        self.record(RemoteOperation::Delete, class, key_to_string(id).unwrap_or_default())?;
        self.remove(class, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_journal_and_injected_failures() {
        let schema = Schema::new();
        let remote = Arc::new(MemoryRemote::new());
        let post = schema.define("Post").remote(Arc::clone(&remote)).register().unwrap();
        remote.insert("Post", json!({"id": 1, "title": "Hello"})).unwrap();

        assert!(post.find(1).is_ok());
        assert!(post.find("1").is_ok());
        assert_eq!(remote.calls(RemoteOperation::Find), 2);

        remote.fail_next(RemoteOperation::Find, "unavailable");
        assert!(matches!(post.find(1), Err(ResourceError::Remote(_))));
        assert!(post.find(1).is_ok());
        assert_eq!(remote.lookups(), 4);

        remote.clear_journal();
        assert!(remote.journal().is_empty());
    }

    #[test]
    fn test_save_assigns_next_id_and_validates() {
        let schema = Schema::new();
        let remote = Arc::new(MemoryRemote::new());
        let post = schema.define("Post").remote(Arc::clone(&remote)).register().unwrap();
        remote.insert("Post", json!({"id": 4})).unwrap();
        remote.require("Post", "title");

        let attributes = Attributes::from_value(json!({"title": "New"})).unwrap();
        match remote.save(&post, &attributes, true, true).unwrap() {
            SaveOutcome::Saved(saved) => assert_eq!(saved.get("id"), Some(&json!(5))),
            SaveOutcome::Invalid(errors) => panic!("unexpected validation errors: {errors:?}"),
        }

        let blank = Attributes::new();
        assert!(matches!(
            remote.save(&post, &blank, true, true).unwrap(),
            SaveOutcome::Invalid(ref errors) if errors.len() == 1
        ));
        assert_eq!(remote.records("Post").len(), 2);
    }
}
