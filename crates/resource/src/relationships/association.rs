//! Association - closed dispatch over the association variants

use std::sync::Arc;

use crate::attributes::Attributes;
use crate::error::{ResourceError, ResourceResult};
use crate::model::{Resource, WeakResource};

use super::belongs_to::BelongsToAssociation;
use super::has_many::HasManyAssociation;
use super::has_one::HasOneAssociation;
use super::metadata::AssociationKind;
use super::reflection::AssociationReflection;
use super::through::{HasManyThroughAssociation, HasOneThroughAssociation};
use super::traits::{AssociationProxy, SingularTarget};

/// Whether an owner's destroy may continue after a dependency ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyOutcome {
    Proceed,
    /// Soft restriction: an error was registered on the owner
    Abort,
}

/// Value read from or written to an association
#[derive(Debug, Clone)]
pub enum AssociationTarget {
    One(Option<Resource>),
    Many(Vec<Resource>),
}

impl AssociationTarget {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(record) => record.is_none(),
            Self::Many(records) => records.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(record) => usize::from(record.is_some()),
            Self::Many(records) => records.len(),
        }
    }

    /// Single record, or an error for collections
    pub fn into_one(self) -> ResourceResult<Option<Resource>> {
        match self {
            Self::One(record) => Ok(record),
            Self::Many(_) => Err(ResourceError::AssociationTypeMismatch {
                expected: "a single record".to_string(),
                got: "a collection".to_string(),
            }),
        }
    }

    /// Collection, or an error for singular targets
    pub fn into_many(self) -> ResourceResult<Vec<Resource>> {
        match self {
            Self::Many(records) => Ok(records),
            Self::One(_) => Err(ResourceError::AssociationTypeMismatch {
                expected: "a collection".to_string(),
                got: "a single record".to_string(),
            }),
        }
    }
}

impl From<Resource> for AssociationTarget {
    fn from(record: Resource) -> Self {
        Self::One(Some(record))
    }
}

impl From<Option<Resource>> for AssociationTarget {
    fn from(record: Option<Resource>) -> Self {
        Self::One(record)
    }
}

impl From<Vec<Resource>> for AssociationTarget {
    fn from(records: Vec<Resource>) -> Self {
        Self::Many(records)
    }
}

/// Association proxy for one (owner, association name) pair
#[derive(Debug)]
pub enum Association {
    BelongsTo(BelongsToAssociation),
    HasOne(HasOneAssociation),
    HasMany(HasManyAssociation),
    HasOneThrough(HasOneThroughAssociation),
    HasManyThrough(HasManyThroughAssociation),
}

macro_rules! dispatch {
    ($self:expr, $proxy:ident => $body:expr) => {
        match $self {
            Association::BelongsTo($proxy) => $body,
            Association::HasOne($proxy) => $body,
            Association::HasMany($proxy) => $body,
            Association::HasOneThrough($proxy) => $body,
            Association::HasManyThrough($proxy) => $body,
        }
    };
}

impl Association {
    /// Proxy for the variant the reflection selected
    pub fn new(owner: WeakResource, reflection: Arc<AssociationReflection>) -> Self {
        match reflection.kind() {
            AssociationKind::BelongsTo | AssociationKind::BelongsToPolymorphic => {
                Self::BelongsTo(BelongsToAssociation::new(owner, reflection))
            }
            AssociationKind::HasOne => Self::HasOne(HasOneAssociation::new(owner, reflection)),
            AssociationKind::HasMany => Self::HasMany(HasManyAssociation::new(owner, reflection)),
            AssociationKind::HasOneThrough => Self::HasOneThrough(HasOneThroughAssociation::new(owner, reflection)),
            AssociationKind::HasManyThrough => {
                Self::HasManyThrough(HasManyThroughAssociation::new(owner, reflection))
            }
        }
    }

    pub fn reflection(&self) -> &Arc<AssociationReflection> {
        dispatch!(self, proxy => proxy.reflection())
    }

    pub fn is_loaded(&self) -> bool {
        dispatch!(self, proxy => proxy.is_loaded())
    }

    pub fn reset(&mut self) {
        dispatch!(self, proxy => proxy.reset())
    }

    pub fn is_stale_target(&self) -> ResourceResult<bool> {
        dispatch!(self, proxy => {
            let owner = proxy.owner()?;
            Ok(proxy.is_stale_target(&owner))
        })
    }

    /// Current target without resolving
    pub fn target(&self) -> AssociationTarget {
        match self {
            Self::BelongsTo(proxy) => AssociationTarget::One(proxy.current()),
            Self::HasOne(proxy) => AssociationTarget::One(proxy.current()),
            Self::HasOneThrough(proxy) => AssociationTarget::One(proxy.current()),
            Self::HasMany(proxy) => AssociationTarget::Many(proxy.current()),
            Self::HasManyThrough(proxy) => AssociationTarget::Many(proxy.current()),
        }
    }

    pub fn reader(&mut self, force_reload: bool) -> ResourceResult<AssociationTarget> {
        match self {
            Self::BelongsTo(proxy) => proxy.reader(force_reload).map(AssociationTarget::One),
            Self::HasOne(proxy) => proxy.reader(force_reload).map(AssociationTarget::One),
            Self::HasOneThrough(proxy) => proxy.reader(force_reload).map(AssociationTarget::One),
            Self::HasMany(proxy) => proxy.reader(force_reload).map(AssociationTarget::Many),
            Self::HasManyThrough(proxy) => proxy.reader(force_reload).map(AssociationTarget::Many),
        }
    }

    pub fn reload(&mut self) -> ResourceResult<AssociationTarget> {
        self.reader(true)
    }

    pub fn writer(&mut self, value: AssociationTarget) -> ResourceResult<()> {
        match self {
            Self::BelongsTo(proxy) => proxy.writer(value.into_one()?),
            Self::HasOne(proxy) => proxy.writer(value.into_one()?),
            Self::HasOneThrough(proxy) => proxy.writer(value.into_one()?),
            Self::HasMany(proxy) => proxy.writer(value.into_many()?),
            Self::HasManyThrough(proxy) => proxy.writer(value.into_many()?),
        }
    }

    /// Install a weak back-reference to `owner` set by the inverse side
    pub fn set_inverse_target(&mut self, owner: &Resource) -> ResourceResult<()> {
        let target = SingularTarget::BackRef(owner.downgrade());
        match self {
            Self::BelongsTo(proxy) => proxy.set_target(target),
            Self::HasOne(proxy) => proxy.set_target(target),
            _ => Ok(()),
        }
    }

    /// `build_<name>` for singular associations, `build` for collections
    pub fn build(&mut self, attributes: Attributes) -> ResourceResult<Resource> {
        match self {
            Self::BelongsTo(proxy) => {
                let owner = proxy.owner()?;
                let schema = owner.class().schema()?;
                let record = proxy.reflection().build_association(&*schema, attributes)?;
                proxy.writer(Some(record.clone()))?;
                Ok(record)
            }
            Self::HasOne(proxy) => proxy.build(attributes),
            Self::HasMany(proxy) => proxy.build(attributes),
            _ => Err(self.not_constructable()),
        }
    }

    /// `create_<name>` / `create_<name>!` for singular associations, `create` for collections
    pub fn create(&mut self, attributes: Attributes, strict: bool) -> ResourceResult<Resource> {
        match self {
            Self::BelongsTo(proxy) => {
                let owner = proxy.owner()?;
                let schema = owner.class().schema()?;
                let record = proxy.reflection().build_association(&*schema, attributes)?;
                if strict {
                    record.save_strict()?;
                } else {
                    record.save_with(proxy.reflection().validate())?;
                }
                proxy.writer(Some(record.clone()))?;
                Ok(record)
            }
            Self::HasOne(proxy) => proxy.create(attributes, strict),
            Self::HasMany(proxy) => proxy.create(attributes, strict),
            _ => Err(self.not_constructable()),
        }
    }

    /// Run the reflection's `dependent` policy
    pub fn handle_dependency(&mut self) -> ResourceResult<DependencyOutcome> {
        match self {
            Self::BelongsTo(proxy) => proxy.handle_dependency().map(|_| DependencyOutcome::Proceed),
            Self::HasOne(proxy) => proxy.handle_dependency(),
            Self::HasMany(proxy) => proxy.handle_dependency(),
            _ => Ok(DependencyOutcome::Proceed),
        }
    }

    pub fn as_has_many_mut(&mut self) -> Option<&mut HasManyAssociation> {
        match self {
            Self::HasMany(proxy) => Some(proxy),
            _ => None,
        }
    }

    fn not_constructable(&self) -> ResourceError {
        let reflection = self.reflection();
        ResourceError::Configuration(format!(
            "{} :{} is not constructable",
            reflection.macro_kind(),
            reflection.name()
        ))
    }
}
