//! Association Traits - the load/cache/reset state machine shared by every proxy

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::attributes::AttributeStore;
use crate::error::{ResourceError, ResourceResult};
use crate::model::{Resource, WeakResource};
use crate::schema::Schema;

use super::reflection::AssociationReflection;

/// Storage for a resolved target
pub trait TargetSlot: Default {
    /// False when the slot refers to a record that no longer exists
    fn is_alive(&self) -> bool {
        true
    }
}

/// Target of a singular association
#[derive(Debug, Clone, Default)]
pub enum SingularTarget {
    /// Resolved to nothing, or not resolved yet
    #[default]
    Empty,
    /// Record owned by this association
    Held(Resource),
    /// Back-reference installed by the inverse side; does not keep the record alive
    BackRef(WeakResource),
}

impl SingularTarget {
    pub fn from_record(record: Option<Resource>) -> Self {
        match record {
            Some(record) => Self::Held(record),
            None => Self::Empty,
        }
    }

    pub fn get(&self) -> Option<Resource> {
        match self {
            Self::Empty => None,
            Self::Held(record) => Some(record.clone()),
            Self::BackRef(weak) => weak.upgrade(),
        }
    }
}

impl TargetSlot for SingularTarget {
    fn is_alive(&self) -> bool {
        match self {
            Self::BackRef(weak) => weak.upgrade().is_some(),
            _ => true,
        }
    }
}

impl TargetSlot for Vec<Resource> {}

/// State shared by every association proxy
#[derive(Debug)]
pub struct AssociationState<T> {
    pub owner: WeakResource,
    pub reflection: Arc<AssociationReflection>,
    pub target: T,
    pub loaded: bool,
    pub stale_state: Option<String>,
}

impl<T: TargetSlot> AssociationState<T> {
    pub fn new(owner: WeakResource, reflection: Arc<AssociationReflection>) -> Self {
        Self {
            owner,
            reflection,
            target: T::default(),
            loaded: false,
            stale_state: None,
        }
    }
}

/// A per-instance association proxy
///
/// Implementors supply the macro-specific pieces (the `find_target` gate, the
/// lookup itself, `replace` and the stale-state key); the lifecycle around
/// them is shared.
pub trait AssociationProxy {
    type Target: TargetSlot;
    type Value;

    fn state(&self) -> &AssociationState<Self::Target>;

    fn state_mut(&mut self) -> &mut AssociationState<Self::Target>;

    /// Whether a lookup should run for an unloaded association
    fn should_find_target(&self, owner: &Resource) -> ResourceResult<bool>;

    /// Resolve the target from embedded attributes or the remote
    fn find_target(&mut self, owner: &Resource) -> ResourceResult<Self::Target>;

    /// Replace the target, rewriting owner or record keys as the macro requires
    fn replace(&mut self, owner: &Resource, value: Self::Value) -> ResourceResult<()>;

    /// Current target as a value
    fn current(&self) -> Self::Value;

    /// Key whose change invalidates the loaded target
    fn stale_state(&self, _owner: &Resource) -> Option<String> {
        None
    }

    /// Combine a freshly found target with the current one
    fn merge_target(&mut self, found: Self::Target) -> Self::Target {
        found
    }

    /// Extra state to clear on reset
    fn on_reset(&mut self) {}

    fn reflection(&self) -> &Arc<AssociationReflection> {
        &self.state().reflection
    }

    fn owner(&self) -> ResourceResult<Resource> {
        self.state()
            .owner
            .upgrade()
            .ok_or_else(|| ResourceError::OwnerDropped(self.state().reflection.name().to_string()))
    }

    fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    /// Mark loaded and snapshot the stale state
    fn loaded(&mut self, owner: &Resource) {
        let stale_state = self.stale_state(owner);
        let state = self.state_mut();
        state.loaded = true;
        state.stale_state = stale_state;
    }

    /// Forget the target; the next read resolves again
    fn reset(&mut self) {
        let state = self.state_mut();
        state.loaded = false;
        state.target = Self::Target::default();
        state.stale_state = None;
        self.on_reset();
    }

    /// Whether the loaded target no longer matches the owner's keys
    fn is_stale_target(&self, owner: &Resource) -> bool {
        self.is_loaded() && self.state().stale_state != self.stale_state(owner)
    }

    fn load_target(&mut self) -> ResourceResult<Self::Value> {
        let owner = self.owner()?;

        if self.is_loaded() {
            if !self.state().target.is_alive() {
                warn!(
                    "Dropping dead inverse reference for association '{}'",
                    self.reflection().name()
                );
                self.reset();
            } else if self.is_stale_target(&owner) {
                trace!("Association '{}' is stale", self.reflection().name());
                self.reset();
            }
        }

        if !self.is_loaded() {
            if self.should_find_target(&owner)? {
                let found = self.find_target(&owner)?;
                let merged = self.merge_target(found);
                self.state_mut().target = merged;

                if owner.class().config().log_resolutions {
                    debug!(
                        "Resolved association '{}' on {}",
                        self.reflection().name(),
                        owner.class().name()
                    );
                }
            }
            self.loaded(&owner);
        }

        Ok(self.current())
    }

    /// Read the target, resolving it first when forced or not loaded
    fn reader(&mut self, force_reload: bool) -> ResourceResult<Self::Value> {
        if force_reload {
            self.reset();
        }
        self.load_target()
    }

    fn writer(&mut self, value: Self::Value) -> ResourceResult<()> {
        let owner = self.owner()?;
        self.replace(&owner, value)?;
        self.loaded(&owner);
        Ok(())
    }

    fn reload(&mut self) -> ResourceResult<Self::Value> {
        self.reset();
        self.load_target()
    }

    /// Set the target without any key rewriting and mark it loaded
    fn set_target(&mut self, target: Self::Target) -> ResourceResult<()> {
        let owner = self.owner()?;
        self.state_mut().target = target;
        self.loaded(&owner);
        Ok(())
    }
}

/// Schema the owner's type belongs to
pub(crate) fn schema_of(owner: &Resource) -> ResourceResult<Arc<Schema>> {
    owner.class().schema()
}

/// Point the inverse association of `record` back at `owner`
///
/// Only singular inverses are set; the back-reference is weak.
pub(crate) fn set_inverse_instance(
    reflection: &AssociationReflection,
    schema: &Schema,
    record: &Resource,
    owner: &Resource,
) -> ResourceResult<()> {
    let Some(inverse) = reflection.inverse_of(schema) else {
        return Ok(());
    };

    if inverse.is_collection() {
        trace!(
            "Skipping collection inverse '{}' of '{}'",
            inverse.name(),
            reflection.name()
        );
        return Ok(());
    }

    if !record.class().reflections().contains(inverse.name()) {
        return Ok(());
    }

    record.with_association(inverse.name(), |association| {
        association.set_inverse_target(owner)
    })
}

/// Verify `record` is an instance of the association's target type
pub(crate) fn raise_on_type_mismatch(
    reflection: &AssociationReflection,
    schema: &Schema,
    record: &Resource,
) -> ResourceResult<()> {
    if reflection.is_polymorphic() {
        return Ok(());
    }

    let klass = reflection.klass(schema)?;
    if record.class().is_a(klass.name()) {
        Ok(())
    } else {
        Err(ResourceError::AssociationTypeMismatch {
            expected: klass.name().to_string(),
            got: record.class().name().to_string(),
        })
    }
}

/// Copy the owner's primary key into the record's owner-scoping attribute
pub(crate) fn set_owner_attributes(reflection: &AssociationReflection, owner: &Resource, record: &Resource) {
    let key = reflection.owner_key(owner.class());
    record.set(&key, owner.id().unwrap_or(serde_json::Value::Null));
}
