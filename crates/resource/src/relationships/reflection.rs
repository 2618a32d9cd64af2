//! Association Reflection - immutable metadata for one declared association
//!
//! A reflection is created once per `(owning type, association name)` and is
//! shared read-only by every association proxy built from it. Derived values
//! (class name, foreign key, target type, inverse name) are computed lazily
//! and memoized, so an association may name a type that is defined later.

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::attributes::{Attributes, AttributeStore};
use crate::error::{ResourceError, ResourceResult};
use crate::inflector;
use crate::model::{Resource, ResourceClass};
use crate::schema::{Schema, TypeResolver};

use super::inference;
use super::metadata::{
    AssociationKind, AssociationMacro, AssociationOptions, DependentPolicy, InverseOf,
};

/// Metadata describing one declared association
pub struct AssociationReflection {
    macro_kind: AssociationMacro,
    kind: AssociationKind,
    name: String,
    active_resource: String,
    options: AssociationOptions,
    dependent: Option<DependentPolicy>,
    constructable: bool,
    collection: bool,
    class_name: OnceCell<String>,
    foreign_key: OnceCell<String>,
    klass: OnceCell<Weak<ResourceClass>>,
    automatic_inverse: OnceCell<Option<String>>,
}

impl AssociationReflection {
    /// Build a reflection, rejecting options the macro does not recognize
    pub fn new(
        macro_kind: AssociationMacro,
        name: impl Into<String>,
        active_resource: impl Into<String>,
        options: AssociationOptions,
    ) -> ResourceResult<Self> {
        let name = name.into();
        let dependent = options.assert_valid_keys(macro_kind, &name)?;

        if let Some(ref through) = options.through {
            if through == &name {
                return Err(ResourceError::Configuration(format!(
                    "association :{} cannot go through itself",
                    name
                )));
            }
            if dependent.is_some() {
                return Err(ResourceError::Configuration(format!(
                    "the :dependent option is not supported on :through association :{}",
                    name
                )));
            }
        }

        Ok(Self {
            kind: AssociationKind::select(macro_kind, &options),
            constructable: calculate_constructable(macro_kind, &options),
            collection: macro_kind.is_collection(),
            macro_kind,
            name,
            active_resource: active_resource.into(),
            options,
            dependent,
            class_name: OnceCell::new(),
            foreign_key: OnceCell::new(),
            klass: OnceCell::new(),
            automatic_inverse: OnceCell::new(),
        })
    }

    /// Association name: `has_many :clients` returns `clients`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Macro: `has_many :clients` returns `has_many`
    pub fn macro_kind(&self) -> AssociationMacro {
        self.macro_kind
    }

    /// Concrete association variant used for proxies built from this reflection
    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    /// Options given at declaration
    pub fn options(&self) -> &AssociationOptions {
        &self.options
    }

    /// Name of the type that declared the association
    pub fn active_resource(&self) -> &str {
        &self.active_resource
    }

    pub fn dependent(&self) -> Option<DependentPolicy> {
        self.dependent
    }

    pub fn is_collection(&self) -> bool {
        self.collection
    }

    /// Whether build/create helpers make sense for this association
    pub fn is_constructable(&self) -> bool {
        self.constructable
    }

    pub fn is_polymorphic(&self) -> bool {
        self.options.polymorphic
    }

    pub fn through(&self) -> Option<&str> {
        self.options.through.as_deref()
    }

    /// Extra filter parameters for remote lookups
    pub fn conditions(&self) -> Option<&Attributes> {
        self.options.conditions.as_ref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.options.limit
    }

    /// Whether associated records are validated with the owner; defaults to
    /// true for `has_many` only
    pub fn validate(&self) -> bool {
        self.options
            .validate
            .unwrap_or(self.macro_kind == AssociationMacro::HasMany)
    }

    /// Class name of the target: `has_many :clients` returns `Client`
    pub fn class_name(&self) -> &str {
        self.class_name.get_or_init(|| self.derive_class_name())
    }

    /// Foreign key for the macro: `options.foreign_key` or `<name>_id`
    pub fn foreign_key(&self) -> &str {
        self.foreign_key.get_or_init(|| {
            self.options
                .foreign_key
                .clone()
                .unwrap_or_else(|| format!("{}_id", self.name.to_lowercase()))
        })
    }

    /// Attribute naming the target type of a polymorphic `belongs_to`
    pub fn foreign_type(&self) -> String {
        format!("{}_type", self.name)
    }

    /// Key on associated records that scopes them to the owner, used by
    /// `has_one` and `has_many`: `options.foreign_key` or `<owner element>_id`
    pub fn owner_key(&self, owner_class: &ResourceClass) -> String {
        self.options
            .foreign_key
            .clone()
            .unwrap_or_else(|| format!("{}_id", owner_class.element_name()))
    }

    /// Primary key on the associated record copied into the owner's foreign key
    pub fn association_primary_key(&self, class: &ResourceClass) -> String {
        self.options
            .primary_key
            .clone()
            .unwrap_or_else(|| class.primary_key().to_string())
    }

    /// Target type of the association, resolved on first use
    pub fn klass(&self, resolver: &dyn TypeResolver) -> ResourceResult<Arc<ResourceClass>> {
        if self.options.polymorphic {
            return Err(ResourceError::Configuration(format!(
                "polymorphic association :{} does not support computing the class",
                self.name
            )));
        }

        if let Some(class) = self.klass.get().and_then(Weak::upgrade) {
            return Ok(class);
        }

        let class = resolver.classify(self.class_name())?;
        // The schema owns its types; memoize weakly so types can refer to each other
        let _ = self.klass.set(Arc::downgrade(&class));
        Ok(class)
    }

    /// Build a new, unsaved instance of the target type
    pub fn build_association(&self, resolver: &dyn TypeResolver, attributes: Attributes) -> ResourceResult<Resource> {
        let class = self.klass(resolver)?;
        Ok(class.build(attributes))
    }

    /// Name of the inverse association, explicit or inferred
    pub fn inverse_name(&self, schema: &Schema) -> Option<String> {
        match &self.options.inverse_of {
            InverseOf::Named(name) => Some(name.clone()),
            InverseOf::Disabled => None,
            InverseOf::Unset => {
                if let Some(memoized) = self.automatic_inverse.get() {
                    return memoized.clone();
                }

                let (inverse, conclusive) = inference::automatic_inverse_of(self, schema);
                if conclusive {
                    let _ = self.automatic_inverse.set(inverse.clone());
                }
                inverse
            }
        }
    }

    pub fn has_inverse(&self, schema: &Schema) -> bool {
        self.inverse_name(schema).is_some()
    }

    /// Reflection of the inverse association on the target type
    pub fn inverse_of(&self, schema: &Schema) -> Option<Arc<AssociationReflection>> {
        let inverse_name = self.inverse_name(schema)?;
        let class = self.klass(schema).ok()?;
        class.reflect_on_association(&inverse_name)
    }

    /// Raise when an explicit inverse does not resolve
    pub fn check_validity(&self, schema: &Schema) -> ResourceResult<()> {
        self.check_validity_of_inverse(schema)
    }

    fn check_validity_of_inverse(&self, schema: &Schema) -> ResourceResult<()> {
        if self.options.polymorphic {
            return Ok(());
        }

        if let Some(inverse) = self.inverse_name(schema) {
            if self.inverse_of(schema).is_none() {
                return Err(ResourceError::InverseOfAssociationNotFound {
                    association: self.name.clone(),
                    inverse,
                    class_name: self.class_name().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Class name as derived from `class_name` or the association name
    pub fn derive_class_name(&self) -> String {
        let source = self.options.class_name.as_deref().unwrap_or(&self.name);
        inflector::classify(source)
    }

    /// Stringified value of the owner's foreign key
    pub(crate) fn foreign_key_value(&self, owner: &dyn AttributeStore) -> Option<Value> {
        owner
            .get(self.foreign_key())
            .filter(|value| !value.is_null())
    }
}

fn calculate_constructable(macro_kind: AssociationMacro, options: &AssociationOptions) -> bool {
    match macro_kind {
        AssociationMacro::BelongsTo => !options.polymorphic,
        AssociationMacro::HasOne => options.through.is_none(),
        AssociationMacro::HasMany => true,
    }
}

impl fmt::Debug for AssociationReflection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationReflection")
            .field("macro", &self.macro_kind)
            .field("name", &self.name)
            .field("active_resource", &self.active_resource)
            .field("options", &self.options)
            .finish()
    }
}
