//! HasOne Association - a single record nested under the owner

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::attributes::{AttributeStore, Attributes, ErrorScope};
use crate::error::{ResourceError, ResourceResult};
use crate::inflector;
use crate::model::{Resource, WeakResource};
use crate::remote::NestedScope;

use super::association::DependencyOutcome;
use super::metadata::DependentPolicy;
use super::reflection::AssociationReflection;
use super::traits::{
    raise_on_type_mismatch, schema_of, set_inverse_instance, set_owner_attributes, AssociationProxy,
    AssociationState, SingularTarget,
};

/// `has_one` proxy
#[derive(Debug)]
pub struct HasOneAssociation {
    state: AssociationState<SingularTarget>,
}

impl HasOneAssociation {
    pub fn new(owner: WeakResource, reflection: Arc<AssociationReflection>) -> Self {
        Self {
            state: AssociationState::new(owner, reflection),
        }
    }

    /// Build an unsaved target scoped to the owner and make it the target
    pub fn build(&mut self, attributes: Attributes) -> ResourceResult<Resource> {
        let owner = self.owner()?;
        let schema = schema_of(&owner)?;
        let reflection = Arc::clone(&self.state.reflection);

        let record = reflection.build_association(&*schema, attributes)?;
        set_owner_attributes(&reflection, &owner, &record);
        set_inverse_instance(&reflection, &schema, &record, &owner)?;

        self.set_target(SingularTarget::Held(record.clone()))?;
        Ok(record)
    }

    /// Build and save the target; the owner must already be persisted
    pub fn create(&mut self, attributes: Attributes, strict: bool) -> ResourceResult<Resource> {
        let owner = self.owner()?;
        if owner.is_new_record() {
            return Err(ResourceError::RecordNotSaved(
                "You cannot call create unless the parent is saved".to_string(),
            ));
        }

        let record = self.build(attributes)?;
        if strict {
            record.save_strict()?;
        } else {
            record.save_with(self.state.reflection.validate())?;
        }
        Ok(record)
    }

    /// Run the `dependent` policy before the owner is destroyed
    pub fn handle_dependency(&mut self) -> ResourceResult<DependencyOutcome> {
        let Some(policy) = self.state.reflection.dependent() else {
            return Ok(DependencyOutcome::Proceed);
        };

        let owner = self.owner()?;
        let Some(target) = self.load_target()? else {
            return Ok(DependencyOutcome::Proceed);
        };
        let reflection = Arc::clone(&self.state.reflection);

        match policy {
            DependentPolicy::RestrictWithException => {
                return Err(ResourceError::DeleteRestriction(reflection.name().to_string()));
            }
            DependentPolicy::RestrictWithError => {
                let mut context = BTreeMap::new();
                context.insert(
                    "record".to_string(),
                    inflector::human_attribute_name(reflection.name()).to_lowercase(),
                );
                owner.add_error(ErrorScope::Base, "restrict_dependent_destroy.one", context);
                warn!(
                    "Destroy of {} aborted: dependent {} exists",
                    owner.class().name(),
                    reflection.name()
                );
                return Ok(DependencyOutcome::Abort);
            }
            DependentPolicy::Destroy => {
                target.set_destroyed_by_association(Some(Arc::clone(&reflection)));
                target.destroy_strict()?;
            }
            DependentPolicy::Nullify => {
                target.set(&reflection.owner_key(owner.class()), Value::Null);
                target.save_with(false)?;
            }
            DependentPolicy::Delete | DependentPolicy::DeleteAll => target.delete()?,
        }

        self.reset();
        Ok(DependencyOutcome::Proceed)
    }
}

impl AssociationProxy for HasOneAssociation {
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
        Ok(owner.is_persisted() || owner.includes(self.state.reflection.name()))
    }

    fn find_target(&mut self, owner: &Resource) -> ResourceResult<SingularTarget> {
        let schema = schema_of(owner)?;
        let reflection = Arc::clone(&self.state.reflection);
        let klass = reflection.klass(&*schema)?;

        let found = if owner.includes(reflection.name()) {
            match owner.get(reflection.name()) {
                Some(Value::Null) | None => None,
                Some(value) => Some(Attributes::from_value(value)?),
            }
        } else {
            let scope = NestedScope {
                parent_collection: owner.class().collection_name().to_string(),
                parent_key: reflection.owner_key(owner.class()),
                parent_id: owner.id().unwrap_or(Value::Null),
                association: reflection.name().to_string(),
                conditions: reflection.conditions().cloned().unwrap_or_default(),
            };

            if owner.class().config().log_resolutions {
                debug!("Fetching {} from {}", klass.name(), scope.path());
            }
            klass.finder().find_singleton(&klass, &scope)?
        };

        let Some(attributes) = found else {
            return Ok(SingularTarget::Empty);
        };

        let record = klass.instantiate(attributes, true);
        set_inverse_instance(&reflection, &schema, &record, owner)?;
        Ok(SingularTarget::Held(record))
    }

    fn replace(&mut self, owner: &Resource, record: Option<Resource>) -> ResourceResult<()> {
        let reflection = Arc::clone(&self.state.reflection);
        let schema = schema_of(owner)?;

        if let Some(ref record) = record {
            raise_on_type_mismatch(&reflection, &schema, record)?;
            set_owner_attributes(&reflection, owner, record);
            set_inverse_instance(&reflection, &schema, record, owner)?;
        }

        self.state.target = SingularTarget::from_record(record);
        owner.remove_attribute(reflection.name());
        Ok(())
    }

    fn current(&self) -> Option<Resource> {
        self.state.target.get()
    }
}
