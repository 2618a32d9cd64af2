//! Resource instances - attribute state, association cache and accessor dispatch

use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::attributes::{AttributeStore, Attributes, ErrorScope, Errors};
use crate::error::{ResourceError, ResourceResult};
use crate::relationships::{
    Accessor, Association, AssociationCache, AssociationReflection, AssociationTarget, HasManyAssociation,
};

use super::class::ResourceClass;

pub(crate) struct ResourceInner {
    pub(crate) class: Arc<ResourceClass>,
    pub(crate) attributes: RefCell<Attributes>,
    pub(crate) persisted: Cell<bool>,
    pub(crate) destroyed: Cell<bool>,
    pub(crate) destroying: Cell<bool>,
    pub(crate) errors: RefCell<Errors>,
    pub(crate) associations: RefCell<AssociationCache>,
    pub(crate) destroyed_by_association: RefCell<Option<Arc<AssociationReflection>>>,
}

/// Handle to one resource instance
///
/// Cloning the handle shares the instance. Association proxies refer back to
/// their owner through a [`WeakResource`].
#[derive(Clone)]
pub struct Resource(pub(crate) Rc<ResourceInner>);

/// Non-owning handle to a resource instance
#[derive(Clone, Default)]
pub struct WeakResource(Weak<ResourceInner>);

impl WeakResource {
    /// Handle that never upgrades
    pub fn new() -> Self {
        Self(Weak::new())
    }

    pub fn upgrade(&self) -> Option<Resource> {
        self.0.upgrade().map(Resource)
    }
}

impl fmt::Debug for WeakResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(resource) => write!(f, "WeakResource({}#{})", resource.class().name(), resource.id_string()),
            None => f.write_str("WeakResource(dropped)"),
        }
    }
}

impl Resource {
    pub(crate) fn new(class: Arc<ResourceClass>, attributes: Attributes, persisted: bool) -> Self {
        Self(Rc::new(ResourceInner {
            class,
            attributes: RefCell::new(attributes),
            persisted: Cell::new(persisted),
            destroyed: Cell::new(false),
            destroying: Cell::new(false),
            errors: RefCell::new(Errors::new()),
            associations: RefCell::new(AssociationCache::new()),
            destroyed_by_association: RefCell::new(None),
        }))
    }

    pub fn class(&self) -> &Arc<ResourceClass> {
        &self.0.class
    }

    pub fn downgrade(&self) -> WeakResource {
        WeakResource(Rc::downgrade(&self.0))
    }

    /// Whether both handles refer to the same instance
    pub fn ptr_eq(&self, other: &Resource) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Primary key value, if set
    pub fn id(&self) -> Option<Value> {
        self.attribute(self.class().primary_key()).filter(|id| !id.is_null())
    }

    fn id_string(&self) -> String {
        self.id()
            .as_ref()
            .and_then(crate::attributes::key_to_string)
            .unwrap_or_else(|| "new".to_string())
    }

    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.0.attributes.borrow().get(key).cloned()
    }

    pub fn set_attribute(&self, key: &str, value: Value) {
        self.0.attributes.borrow_mut().set(key, value);
    }

    pub fn remove_attribute(&self, key: &str) -> Option<Value> {
        self.0.attributes.borrow_mut().remove(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.0.attributes.borrow().includes(key)
    }

    /// Copy of every attribute
    pub fn attributes(&self) -> Attributes {
        self.0.attributes.borrow().clone()
    }

    pub fn is_persisted(&self) -> bool {
        self.0.persisted.get()
    }

    pub fn is_new_record(&self) -> bool {
        !self.is_persisted() && !self.is_destroyed()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn errors(&self) -> Ref<'_, Errors> {
        self.0.errors.borrow()
    }

    pub fn add_error(&self, scope: ErrorScope, code: &str, context: BTreeMap<String, String>) {
        self.0.errors.borrow_mut().add(scope, code, context);
    }

    /// Reflection of the association whose dependent policy is destroying this record
    pub fn destroyed_by_association(&self) -> Option<Arc<AssociationReflection>> {
        self.0.destroyed_by_association.borrow().clone()
    }

    pub fn set_destroyed_by_association(&self, reflection: Option<Arc<AssociationReflection>>) {
        *self.0.destroyed_by_association.borrow_mut() = reflection;
    }

    /// Association proxy for `name`, created from the reflection on first access
    pub fn association(&self, name: &str) -> ResourceResult<Rc<RefCell<Association>>> {
        let reflection = self.class().reflection(name)?;

        if let Some(association) = self.0.associations.borrow().get(&reflection) {
            return Ok(association);
        }

        if self.class().config().strict_inverse_validation {
            let schema = self.class().schema()?;
            reflection.check_validity(&schema)?;
        }

        trace!("Creating association proxy {}.{}", self.class().name(), name);
        let association = Rc::new(RefCell::new(Association::new(self.downgrade(), Arc::clone(&reflection))));
        self.0
            .associations
            .borrow_mut()
            .insert(reflection, Rc::clone(&association));
        Ok(association)
    }

    /// Run `f` against the association proxy for `name`
    pub fn with_association<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Association) -> ResourceResult<R>,
    ) -> ResourceResult<R> {
        let association = self.association(name)?;
        let mut guard = association
            .try_borrow_mut()
            .map_err(|_| ResourceError::AssociationBusy(name.to_string()))?;
        f(&mut *guard)
    }

    /// Run `f` against the `has_many` proxy for `name`
    pub fn collection<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut HasManyAssociation) -> ResourceResult<R>,
    ) -> ResourceResult<R> {
        self.with_association(name, |association| {
            let reflection = Arc::clone(association.reflection());
            match association.as_has_many_mut() {
                Some(collection) => f(collection),
                None => Err(ResourceError::AssociationTypeMismatch {
                    expected: "has_many".to_string(),
                    got: format!("{} :{}", reflection.macro_kind(), reflection.name()),
                }),
            }
        })
    }

    fn accessor(&self, accessor: &str) -> ResourceResult<Accessor> {
        self.class()
            .accessors()
            .get(accessor)
            .ok_or_else(|| ResourceError::UndefinedAccessor {
                resource: self.class().name().to_string(),
                accessor: accessor.to_string(),
            })
    }

    fn undefined(&self, accessor: &str) -> ResourceError {
        ResourceError::UndefinedAccessor {
            resource: self.class().name().to_string(),
            accessor: accessor.to_string(),
        }
    }

    /// Invoke the `name` reader
    pub fn read(&self, name: &str) -> ResourceResult<AssociationTarget> {
        self.read_with(name, false)
    }

    /// Invoke the `name` reader, resolving again when `force_reload` is set
    pub fn read_with(&self, name: &str, force_reload: bool) -> ResourceResult<AssociationTarget> {
        match self.accessor(name)? {
            Accessor::Reader(reader) => reader(self, force_reload),
            _ => Err(self.undefined(name)),
        }
    }

    /// Read a singular association
    pub fn read_one(&self, name: &str) -> ResourceResult<Option<Resource>> {
        self.read(name)?.into_one()
    }

    /// Read a collection association
    pub fn read_many(&self, name: &str) -> ResourceResult<Vec<Resource>> {
        self.read(name)?.into_many()
    }

    /// Invoke the `name=` writer
    pub fn write(&self, name: &str, value: impl Into<AssociationTarget>) -> ResourceResult<()> {
        let accessor = format!("{}=", name);
        match self.accessor(&accessor)? {
            Accessor::Writer(writer) => writer(self, value.into()),
            _ => Err(self.undefined(&accessor)),
        }
    }

    /// Invoke `build_<name>`
    pub fn build_association(&self, name: &str, attributes: Value) -> ResourceResult<Resource> {
        self.construct(&format!("build_{}", name), attributes)
    }

    /// Invoke `create_<name>`
    pub fn create_association(&self, name: &str, attributes: Value) -> ResourceResult<Resource> {
        self.construct(&format!("create_{}", name), attributes)
    }

    /// Invoke `create_<name>!`
    pub fn create_association_strict(&self, name: &str, attributes: Value) -> ResourceResult<Resource> {
        self.construct(&format!("create_{}!", name), attributes)
    }

    fn construct(&self, accessor: &str, attributes: Value) -> ResourceResult<Resource> {
        match self.accessor(accessor)? {
            Accessor::Constructor(constructor) => constructor(self, Attributes::from_value(attributes)?),
            _ => Err(self.undefined(accessor)),
        }
    }

    /// Drop every cached association proxy; only applies to persisted records
    pub fn clear_association_cache(&self) {
        if self.is_persisted() {
            self.0.associations.borrow_mut().clear();
        }
    }

    /// Names of the associations with a cached proxy
    pub fn cached_associations(&self) -> Vec<String> {
        self.0.associations.borrow().names()
    }

    /// Reassign attributes from a payload
    ///
    /// Proxies of associations whose embedded attribute is part of the
    /// payload are reset. A `belongs_to` whose foreign key changed fetches
    /// its target again on the next read, skipping an embedded payload that
    /// belongs to the old key.
    pub fn load_attributes(&self, attributes: Value) -> ResourceResult<()> {
        let attributes = Attributes::from_value(attributes)?;
        let touched: Vec<String> = attributes.keys().cloned().collect();
        self.0.attributes.borrow_mut().merge(attributes);

        for name in touched {
            let cached = self.0.associations.borrow().get_by_name(&name);
            if let Some(association) = cached {
                let mut association = association
                    .try_borrow_mut()
                    .map_err(|_| ResourceError::AssociationBusy(name.clone()))?;
                association.reset();
            }
        }

        Ok(())
    }
}

impl AttributeStore for Resource {
    fn get(&self, key: &str) -> Option<Value> {
        self.attribute(key)
    }

    fn set(&self, key: &str, value: Value) {
        self.set_attribute(key, value)
    }

    fn includes(&self, key: &str) -> bool {
        self.has_attribute(key)
    }

    fn is_persisted(&self) -> bool {
        Resource::is_persisted(self)
    }

    fn is_new_record(&self) -> bool {
        Resource::is_new_record(self)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("class", &self.class().name())
            .field("attributes", &*self.0.attributes.borrow())
            .field("persisted", &self.is_persisted())
            .finish()
    }
}
