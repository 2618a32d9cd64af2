//! Remote collaborators
//!
//! The association core never talks HTTP itself. Lookups go through a
//! [`RemoteFinder`] and writes through a [`RemotePersistence`], both attached
//! to a resource type when it is defined.

use serde_json::Value;

use crate::attributes::{Attributes, ErrorScope};
use crate::error::{ResourceError, ResourceResult};
use crate::model::ResourceClass;

/// Scope of a singleton lookup nested under an owner,
/// e.g. `/products/1/inventory`
#[derive(Debug, Clone, PartialEq)]
pub struct NestedScope {
    /// Collection name of the owner type (`products`)
    pub parent_collection: String,
    /// Owner-scoping key on the nested record (`product_id`)
    pub parent_key: String,
    /// Owner identifier
    pub parent_id: Value,
    /// Association name (`inventory`)
    pub association: String,
    /// Additional filter parameters from the `conditions` option
    pub conditions: Attributes,
}

impl NestedScope {
    /// Conventional request path for the scope
    pub fn path(&self) -> String {
        let id = crate::attributes::key_to_string(&self.parent_id).unwrap_or_default();
        format!("/{}/{}/{}", self.parent_collection, id, self.association)
    }
}

/// Lookup side of the remote API for one resource type
pub trait RemoteFinder: Send + Sync {
    /// Fetch a single record by primary key; `None` when the remote has no such record
    fn find(&self, class: &ResourceClass, id: &Value) -> ResourceResult<Option<Attributes>>;

    /// List records matching the filter parameters, in remote order
    fn find_all(&self, class: &ResourceClass, filters: &Attributes) -> ResourceResult<Vec<Attributes>>;

    /// Fetch the singleton record nested under an owner
    fn find_singleton(&self, class: &ResourceClass, scope: &NestedScope) -> ResourceResult<Option<Attributes>>;

    /// Count records matching the filter parameters
    fn count(&self, class: &ResourceClass, filters: &Attributes) -> ResourceResult<usize> {
        Ok(self.find_all(class, filters)?.len())
    }
}

/// Result of a remote save
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Saved; carries the attributes the remote answered with
    Saved(Attributes),
    /// Rejected by remote validation
    Invalid(Vec<(ErrorScope, String)>),
}

/// Write side of the remote API for one resource type
pub trait RemotePersistence: Send + Sync {
    /// Create (`new_record`) or update a record
    fn save(
        &self,
        class: &ResourceClass,
        attributes: &Attributes,
        new_record: bool,
        validate: bool,
    ) -> ResourceResult<SaveOutcome>;

    /// Destroy a record; the caller has already run its dependents
    fn destroy(&self, class: &ResourceClass, id: &Value) -> ResourceResult<()>;

    /// Delete a record without running any hooks
    fn delete(&self, class: &ResourceClass, id: &Value) -> ResourceResult<()>;
}

/// Placeholder remote for types defined without one; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredRemote;

impl UnconfiguredRemote {
    fn error(class: &ResourceClass) -> ResourceError {
        ResourceError::Remote(format!("no remote configured for {}", class.name()))
    }
}

impl RemoteFinder for UnconfiguredRemote {
    fn find(&self, class: &ResourceClass, _id: &Value) -> ResourceResult<Option<Attributes>> {
        Err(Self::error(class))
    }

    fn find_all(&self, class: &ResourceClass, _filters: &Attributes) -> ResourceResult<Vec<Attributes>> {
        Err(Self::error(class))
    }

    fn find_singleton(&self, class: &ResourceClass, _scope: &NestedScope) -> ResourceResult<Option<Attributes>> {
        Err(Self::error(class))
    }
}

impl RemotePersistence for UnconfiguredRemote {
    fn save(&self, class: &ResourceClass, _: &Attributes, _: bool, _: bool) -> ResourceResult<SaveOutcome> {
        Err(Self::error(class))
    }

    fn destroy(&self, class: &ResourceClass, _id: &Value) -> ResourceResult<()> {
        Err(Self::error(class))
    }

    fn delete(&self, class: &ResourceClass, _id: &Value) -> ResourceResult<()> {
        Err(Self::error(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_scope_path() {
        let scope = NestedScope {
            parent_collection: "products".to_string(),
            parent_key: "product_id".to_string(),
            parent_id: json!(12),
            association: "inventory".to_string(),
            conditions: Attributes::new(),
        };
        assert_eq!(scope.path(), "/products/12/inventory");
    }
}
