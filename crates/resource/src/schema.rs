//! Schema - the set of resource types that can refer to each other
//!
//! Associations name their targets by class name; the schema resolves those
//! names lazily, so types may be defined in any order.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{trace, warn};

use crate::config::ResourceConfig;
use crate::error::{ResourceError, ResourceResult};
use crate::inflector;
use crate::model::ResourceClass;
use crate::relationships::{default_inverse_providers, AccessorTable, InverseProvider, ReflectionRegistry};
use crate::remote::{RemoteFinder, RemotePersistence, UnconfiguredRemote};

/// Resolves class names to resource types
pub trait TypeResolver {
    fn classify(&self, class_name: &str) -> ResourceResult<Arc<ResourceClass>>;
}

/// Registry of resource types sharing one configuration
pub struct Schema {
    types: DashMap<String, Arc<ResourceClass>>,
    config: ResourceConfig,
    inverse_providers: Vec<Box<dyn InverseProvider>>,
    this: Weak<Schema>,
}

impl Schema {
    /// Schema with the default configuration and inverse providers
    ///
    /// The defaults try the target-named inverse first, then the owner-named
    /// one. Build with `with_inverse_providers(vec![Box::new(TargetNamedInverse)])`
    /// to infer from the target-named rule alone.
    pub fn new() -> Arc<Self> {
        Self::with_parts(ResourceConfig::default(), default_inverse_providers())
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    fn with_parts(config: ResourceConfig, inverse_providers: Vec<Box<dyn InverseProvider>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            types: DashMap::new(),
            config,
            inverse_providers,
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Inverse providers in the order they are tried
    pub fn inverse_providers(&self) -> &[Box<dyn InverseProvider>] {
        &self.inverse_providers
    }

    /// Start defining a resource type
    pub fn define(&self, name: &str) -> ResourceClassBuilder {
        ResourceClassBuilder::new(self.this.clone(), self.config.clone(), name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceClass>> {
        self.types.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Names of every defined type, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn register(&self, class: Arc<ResourceClass>) {
        if self.types.insert(class.name().to_string(), Arc::clone(&class)).is_some() {
            warn!("Resource type {} was redefined", class.name());
        }
    }
}

impl TypeResolver for Schema {
    fn classify(&self, class_name: &str) -> ResourceResult<Arc<ResourceClass>> {
        if let Some(class) = self.get(class_name) {
            return Ok(class);
        }

        let classified = inflector::classify(class_name);
        trace!("Resolving {} as {}", class_name, classified);
        self.get(&classified)
            .ok_or_else(|| ResourceError::UnknownResourceType(class_name.to_string()))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("types", &self.type_names())
            .field("config", &self.config)
            .field("inverse_providers", &self.inverse_providers)
            .finish()
    }
}

/// Builder for a [`Schema`]
#[derive(Default)]
pub struct SchemaBuilder {
    config: Option<ResourceConfig>,
    inverse_providers: Option<Vec<Box<dyn InverseProvider>>>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default inverse providers; an empty list disables inference
    pub fn with_inverse_providers(mut self, providers: Vec<Box<dyn InverseProvider>>) -> Self {
        self.inverse_providers = Some(providers);
        self
    }

    /// Append a provider after the ones already configured
    pub fn add_inverse_provider(mut self, provider: Box<dyn InverseProvider>) -> Self {
        self.inverse_providers
            .get_or_insert_with(default_inverse_providers)
            .push(provider);
        self
    }

    /// Validate the configuration and build the schema
    pub fn build(self) -> ResourceResult<Arc<Schema>> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Schema::with_parts(
            config,
            self.inverse_providers.unwrap_or_else(default_inverse_providers),
        ))
    }
}

/// Builder for a resource type, obtained from [`Schema::define`]
pub struct ResourceClassBuilder {
    schema: Weak<Schema>,
    config: ResourceConfig,
    name: String,
    primary_key: Option<String>,
    element_name: Option<String>,
    collection_name: Option<String>,
    parent: Option<Arc<ResourceClass>>,
    finder: Option<Arc<dyn RemoteFinder>>,
    persistence: Option<Arc<dyn RemotePersistence>>,
}

impl ResourceClassBuilder {
    fn new(schema: Weak<Schema>, config: ResourceConfig, name: &str) -> Self {
        Self {
            schema,
            config,
            name: name.to_string(),
            primary_key: None,
            element_name: None,
            collection_name: None,
            parent: None,
            finder: None,
            persistence: None,
        }
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    pub fn element_name(mut self, element_name: impl Into<String>) -> Self {
        self.element_name = Some(element_name.into());
        self
    }

    pub fn collection_name(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = Some(collection_name.into());
        self
    }

    /// Define a subtype: it starts with a snapshot of the parent's associations
    /// and inherits its primary key and remotes unless overridden
    pub fn extends(mut self, parent: &Arc<ResourceClass>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Use one remote for both lookups and writes
    pub fn remote<R>(mut self, remote: Arc<R>) -> Self
    where
        R: RemoteFinder + RemotePersistence + 'static,
    {
        self.finder = Some(remote.clone() as Arc<dyn RemoteFinder>);
        self.persistence = Some(remote as Arc<dyn RemotePersistence>);
        self
    }

    pub fn finder(mut self, finder: Arc<dyn RemoteFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn RemotePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Create the type and add it to the schema
    pub fn register(self) -> ResourceResult<Arc<ResourceClass>> {
        let schema = self
            .schema
            .upgrade()
            .ok_or_else(|| ResourceError::Configuration("schema has been dropped".to_string()))?;

        if self.name.trim().is_empty() {
            return Err(ResourceError::Configuration("resource type name cannot be empty".to_string()));
        }

        let parent = self.parent.as_ref();
        let primary_key = self
            .primary_key
            .or_else(|| parent.map(|p| p.primary_key().to_string()))
            .unwrap_or_else(|| self.config.default_primary_key.clone());
        let finder = self
            .finder
            .or_else(|| parent.map(|p| Arc::clone(p.finder())))
            .unwrap_or_else(|| Arc::new(UnconfiguredRemote) as Arc<dyn RemoteFinder>);
        let persistence = self
            .persistence
            .or_else(|| parent.map(|p| Arc::clone(p.persistence())))
            .unwrap_or_else(|| Arc::new(UnconfiguredRemote) as Arc<dyn RemotePersistence>);

        let (reflections, accessors) = match parent {
            Some(parent) => (
                ReflectionRegistry::inherit(parent.reflections()),
                AccessorTable::inherit(parent.accessors()),
            ),
            None => (ReflectionRegistry::new(), AccessorTable::new()),
        };

        let element_name = self
            .element_name
            .unwrap_or_else(|| inflector::element_name(&self.name));
        let collection_name = self
            .collection_name
            .unwrap_or_else(|| inflector::pluralize(&element_name));

        let class = Arc::new(ResourceClass {
            name: self.name,
            element_name,
            collection_name,
            primary_key,
            parent: self.parent,
            finder,
            persistence,
            reflections,
            accessors,
            config: self.config,
            schema: self.schema,
        });

        schema.register(Arc::clone(&class));
        Ok(class)
    }
}
