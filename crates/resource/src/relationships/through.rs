//! Through Associations - read-only associations reached via another association
//!
//! `Post has_many :tags, through: :taggings` reads `taggings` on the owner,
//! then `tag` (or `tags`) on each tagging, and flattens the result.

use std::sync::Arc;

use serde_json::Value;

use crate::attributes::{AttributeStore, Attributes};
use crate::error::{ResourceError, ResourceResult};
use crate::inflector;
use crate::model::{Resource, WeakResource};

use super::association::AssociationTarget;
use super::reflection::AssociationReflection;
use super::traits::{schema_of, AssociationProxy, AssociationState, SingularTarget};

/// Resolve the records at the end of a `through` chain
fn resolve_through(reflection: &AssociationReflection, owner: &Resource) -> ResourceResult<Vec<Resource>> {
    let schema = schema_of(owner)?;
    let klass = reflection.klass(&*schema)?;

    if owner.includes(reflection.name()) {
        return match owner.get(reflection.name()) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| Ok(klass.instantiate(Attributes::from_value(item)?, true)))
                .collect(),
            Some(Value::Object(map)) => Ok(vec![klass.instantiate(Attributes::from(map), true)]),
            _ => Ok(Vec::new()),
        };
    }

    let through = reflection.through().unwrap_or_default();
    if !owner.class().reflections().contains(through) {
        return Err(ResourceError::AssociationNotFound {
            resource: owner.class().name().to_string(),
            association: through.to_string(),
        });
    }

    let intermediates = match owner.read(through)? {
        AssociationTarget::One(record) => record.into_iter().collect(),
        AssociationTarget::Many(records) => records,
    };

    let singular = inflector::singularize(reflection.name());
    let mut records = Vec::new();
    for intermediate in intermediates {
        let registry = intermediate.class().reflections();
        let source = if registry.contains(reflection.name()) {
            reflection.name().to_string()
        } else if registry.contains(&singular) {
            singular.clone()
        } else {
            return Err(ResourceError::Configuration(format!(
                "could not find the source association :{} or :{} in {} for {}.{}",
                reflection.name(),
                singular,
                intermediate.class().name(),
                reflection.active_resource(),
                reflection.name()
            )));
        };

        match intermediate.read(&source)? {
            AssociationTarget::One(Some(record)) => records.push(record),
            AssociationTarget::One(None) => {}
            AssociationTarget::Many(many) => records.extend(many),
        }
    }

    if let Some(limit) = reflection.limit() {
        records.truncate(limit);
    }

    Ok(records)
}

fn read_only(reflection: &AssociationReflection) -> ResourceError {
    ResourceError::Configuration(format!(
        "cannot modify association :{} because it goes through :{}",
        reflection.name(),
        reflection.through().unwrap_or_default()
    ))
}

/// `has_many :through` proxy
#[derive(Debug)]
pub struct HasManyThroughAssociation {
    state: AssociationState<Vec<Resource>>,
}

impl HasManyThroughAssociation {
    pub fn new(owner: WeakResource, reflection: Arc<AssociationReflection>) -> Self {
        Self {
            state: AssociationState::new(owner, reflection),
        }
    }
}

impl AssociationProxy for HasManyThroughAssociation {
    type Target = Vec<Resource>;
    type Value = Vec<Resource>;

    fn state(&self) -> &AssociationState<Vec<Resource>> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AssociationState<Vec<Resource>> {
        &mut self.state
    }

    fn should_find_target(&self, owner: &Resource) -> ResourceResult<bool> {
        let schema = schema_of(owner)?;
        self.state.reflection.klass(&*schema)?;
        Ok(true)
    }

    fn find_target(&mut self, owner: &Resource) -> ResourceResult<Vec<Resource>> {
        resolve_through(&self.state.reflection, owner)
    }

    fn replace(&mut self, _owner: &Resource, _records: Vec<Resource>) -> ResourceResult<()> {
        Err(read_only(&self.state.reflection))
    }

    fn current(&self) -> Vec<Resource> {
        self.state.target.clone()
    }
}

/// `has_one :through` proxy
#[derive(Debug)]
pub struct HasOneThroughAssociation {
    state: AssociationState<SingularTarget>,
}

impl HasOneThroughAssociation {
    pub fn new(owner: WeakResource, reflection: Arc<AssociationReflection>) -> Self {
        Self {
            state: AssociationState::new(owner, reflection),
        }
    }
}

impl AssociationProxy for HasOneThroughAssociation {
    type Target = SingularTarget;
    type Value = Option<Resource>;

    fn state(&self) -> &AssociationState<SingularTarget> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AssociationState<SingularTarget> {
        &mut self.state
    }

    fn should_find_target(&self, owner: &Resource) -> ResourceResult<bool> {
        let schema = schema_of(owner)?;
        self.state.reflection.klass(&*schema)?;
        Ok(true)
    }

    fn find_target(&mut self, owner: &Resource) -> ResourceResult<SingularTarget> {
        let records = resolve_through(&self.state.reflection, owner)?;
        Ok(SingularTarget::from_record(records.into_iter().next()))
    }

    fn replace(&mut self, _owner: &Resource, _record: Option<Resource>) -> ResourceResult<()> {
        Err(read_only(&self.state.reflection))
    }

    fn current(&self) -> Option<Resource> {
        self.state.target.get()
    }
}
