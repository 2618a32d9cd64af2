//! Resource types - per-type metadata, association declarations and remotes

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;
use tracing::debug;

use crate::attributes::{key_to_string, Attributes};
use crate::config::ResourceConfig;
use crate::error::{ResourceError, ResourceResult};
use crate::relationships::{
    AccessorTable, AssociationMacro, AssociationReflection, IntoAssociationOptions, ReflectionRegistry,
};
use crate::remote::{RemoteFinder, RemotePersistence};
use crate::schema::Schema;

use super::instance::Resource;

/// A resource type: `Post`, `Comment`, `Myblog::Post`
///
/// Types are created through [`Schema::define`] and shared via `Arc`.
/// Associations are declared on the type after it is registered.
pub struct ResourceClass {
    pub(crate) name: String,
    pub(crate) element_name: String,
    pub(crate) collection_name: String,
    pub(crate) primary_key: String,
    pub(crate) parent: Option<Arc<ResourceClass>>,
    pub(crate) finder: Arc<dyn RemoteFinder>,
    pub(crate) persistence: Arc<dyn RemotePersistence>,
    pub(crate) reflections: ReflectionRegistry,
    pub(crate) accessors: AccessorTable,
    pub(crate) config: ResourceConfig,
    pub(crate) schema: Weak<Schema>,
}

impl ResourceClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Singular element name used in payloads and owner-scoping keys
    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    /// Collection name used in nested paths
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn parent(&self) -> Option<&Arc<ResourceClass>> {
        self.parent.as_ref()
    }

    pub fn finder(&self) -> &Arc<dyn RemoteFinder> {
        &self.finder
    }

    pub fn persistence(&self) -> &Arc<dyn RemotePersistence> {
        &self.persistence
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Schema the type was defined in
    pub fn schema(&self) -> ResourceResult<Arc<Schema>> {
        self.schema
            .upgrade()
            .ok_or_else(|| ResourceError::Configuration(format!("schema of {} has been dropped", self.name)))
    }

    /// Whether this type is `class_name` or one of its subtypes
    pub fn is_a(&self, class_name: &str) -> bool {
        self.name == class_name || self.parent.as_ref().map_or(false, |parent| parent.is_a(class_name))
    }

    /// Declare `belongs_to :name`
    pub fn belongs_to(
        &self,
        name: &str,
        options: impl IntoAssociationOptions,
    ) -> ResourceResult<Arc<AssociationReflection>> {
        self.create_reflection(AssociationMacro::BelongsTo, name, options)
    }

    /// Declare `has_one :name`
    pub fn has_one(&self, name: &str, options: impl IntoAssociationOptions) -> ResourceResult<Arc<AssociationReflection>> {
        self.create_reflection(AssociationMacro::HasOne, name, options)
    }

    /// Declare `has_many :name`
    pub fn has_many(&self, name: &str, options: impl IntoAssociationOptions) -> ResourceResult<Arc<AssociationReflection>> {
        self.create_reflection(AssociationMacro::HasMany, name, options)
    }

    /// Build a reflection, register it and synthesize its accessors
    ///
    /// Re-declaring a name replaces both the reflection and the accessors.
    pub fn create_reflection(
        &self,
        macro_kind: AssociationMacro,
        name: &str,
        options: impl IntoAssociationOptions,
    ) -> ResourceResult<Arc<AssociationReflection>> {
        let options = options.into_options()?;
        let reflection = Arc::new(AssociationReflection::new(macro_kind, name, &self.name, options)?);

        if self.reflections.insert(Arc::clone(&reflection)).is_some() {
            debug!("Redeclared association {}.{}", self.name, name);
        }
        self.accessors.define_accessors(&reflection);

        Ok(reflection)
    }

    /// Reflection for an association name
    pub fn reflect_on_association(&self, name: &str) -> Option<Arc<AssociationReflection>> {
        self.reflections.get(name)
    }

    /// Reflection for an association name, or `AssociationNotFound`
    pub fn reflection(&self, name: &str) -> ResourceResult<Arc<AssociationReflection>> {
        self.reflect_on_association(name)
            .ok_or_else(|| ResourceError::AssociationNotFound {
                resource: self.name.clone(),
                association: name.to_string(),
            })
    }

    /// The full reflection registry
    pub fn reflections(&self) -> &ReflectionRegistry {
        &self.reflections
    }

    pub fn accessors(&self) -> &AccessorTable {
        &self.accessors
    }

    /// New, unsaved instance
    pub fn build(self: &Arc<Self>, attributes: Attributes) -> Resource {
        Resource::new(Arc::clone(self), attributes, false)
    }

    /// New, unsaved instance from a JSON object
    pub fn new_resource(self: &Arc<Self>, attributes: Value) -> ResourceResult<Resource> {
        Ok(self.build(Attributes::from_value(attributes)?))
    }

    /// Instance from attributes received from the remote
    pub fn instantiate(self: &Arc<Self>, attributes: Attributes, persisted: bool) -> Resource {
        Resource::new(Arc::clone(self), attributes, persisted)
    }

    /// Fetch a single record by primary key
    pub fn find(self: &Arc<Self>, id: impl Into<Value>) -> ResourceResult<Resource> {
        let id = id.into();
        match self.finder.find(self, &id)? {
            Some(attributes) => Ok(self.instantiate(attributes, true)),
            None => Err(ResourceError::NotFound {
                resource: self.name.clone(),
                key: self.primary_key.clone(),
                id: key_to_string(&id).unwrap_or_default(),
            }),
        }
    }

    /// Fetch every record matching the filter parameters
    pub fn find_all(self: &Arc<Self>, filters: &Attributes) -> ResourceResult<Vec<Resource>> {
        Ok(self
            .finder
            .find_all(self, filters)?
            .into_iter()
            .map(|attributes| self.instantiate(attributes, true))
            .collect())
    }

    /// Build and save a record
    pub fn create(self: &Arc<Self>, attributes: Value) -> ResourceResult<Resource> {
        let record = self.new_resource(attributes)?;
        record.save()?;
        Ok(record)
    }
}

impl fmt::Debug for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClass")
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .field("parent", &self.parent.as_ref().map(|parent| parent.name()))
            .field("reflections", &self.reflections.names())
            .finish()
    }
}
