//! BelongsTo Association - the owner holds the foreign key of its target

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::attributes::{key_to_string, AttributeStore, Attributes};
use crate::error::{ResourceError, ResourceResult};
use crate::model::{Resource, ResourceClass, WeakResource};
use crate::schema::{Schema, TypeResolver};

use super::metadata::{AssociationMacro, DependentPolicy};
use super::reflection::AssociationReflection;
use super::traits::{
    raise_on_type_mismatch, schema_of, set_inverse_instance, AssociationProxy, AssociationState,
    SingularTarget,
};

/// `belongs_to` proxy, plain or polymorphic
#[derive(Debug)]
pub struct BelongsToAssociation {
    state: AssociationState<SingularTarget>,
    updated: bool,
}

impl BelongsToAssociation {
    pub fn new(owner: WeakResource, reflection: Arc<AssociationReflection>) -> Self {
        Self {
            state: AssociationState::new(owner, reflection),
            updated: false,
        }
    }

    /// Whether the target was replaced since it was loaded
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Target type; read from `<name>_type` when polymorphic
    fn target_class(&self, owner: &Resource, schema: &Schema) -> ResourceResult<Option<Arc<ResourceClass>>> {
        let reflection = &self.state.reflection;
        if !reflection.is_polymorphic() {
            return reflection.klass(schema).map(Some);
        }

        match owner.get(&reflection.foreign_type()) {
            Some(Value::String(type_name)) if !type_name.is_empty() => schema.classify(&type_name).map(Some),
            _ => Ok(None),
        }
    }

    fn embedded(&self, owner: &Resource) -> Option<Value> {
        owner
            .get(self.state.reflection.name())
            .filter(|value| !value.is_null())
    }

    /// Embedded payload, unless the foreign key now points at another record
    fn embedded_for_key(&self, owner: &Resource, klass: &ResourceClass) -> Option<Value> {
        let value = self.embedded(owner)?;
        let Some(id) = self.state.reflection.foreign_key_value(owner) else {
            return Some(value);
        };

        let primary_key = self.state.reflection.association_primary_key(klass);
        let embedded_id = value.get(primary_key.as_str()).and_then(key_to_string);
        match embedded_id {
            Some(ref embedded_id) if Some(embedded_id.clone()) != key_to_string(&id) => None,
            _ => Some(value),
        }
    }

    fn find_remote(&self, owner: &Resource, klass: &Arc<ResourceClass>, id: Value) -> ResourceResult<Resource> {
        let primary_key = self.state.reflection.association_primary_key(klass);

        if owner.class().config().log_resolutions {
            debug!(
                "Fetching {} with {}={} for {}.{}",
                klass.name(),
                primary_key,
                id,
                owner.class().name(),
                self.state.reflection.name()
            );
        }

        let found = if primary_key == klass.primary_key() {
            klass.finder().find(klass, &id)?
        } else {
            let filters: Attributes = std::iter::once((primary_key.clone(), id.clone())).collect();
            klass.finder().find_all(klass, &filters)?.into_iter().next()
        };

        match found {
            Some(attributes) => Ok(klass.instantiate(attributes, true)),
            None => Err(ResourceError::NotFound {
                resource: klass.name().to_string(),
                key: primary_key,
                id: key_to_string(&id).unwrap_or_default(),
            }),
        }
    }

    /// Run the `dependent` policy against the target after the owner is destroyed
    pub fn handle_dependency(&mut self) -> ResourceResult<()> {
        let Some(policy) = self.state.reflection.dependent() else {
            return Ok(());
        };

        let Some(target) = self.load_target()? else {
            return Ok(());
        };

        match policy {
            DependentPolicy::Destroy => target.destroy_strict(),
            _ => target.delete(),
        }
    }
}

impl AssociationProxy for BelongsToAssociation {
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
        if self.target_class(owner, &schema)?.is_none() {
            return Ok(false);
        }

        Ok(self.state.reflection.foreign_key_value(owner).is_some() || self.embedded(owner).is_some())
    }

    fn find_target(&mut self, owner: &Resource) -> ResourceResult<SingularTarget> {
        let schema = schema_of(owner)?;
        let Some(klass) = self.target_class(owner, &schema)? else {
            return Ok(SingularTarget::Empty);
        };

        let record = match self.embedded_for_key(owner, &klass) {
            Some(value) => klass.instantiate(Attributes::from_value(value)?, true),
            None => match self.state.reflection.foreign_key_value(owner) {
                Some(id) => self.find_remote(owner, &klass, id)?,
                None => return Ok(SingularTarget::Empty),
            },
        };

        set_has_one_inverse(&self.state.reflection, &schema, &record, owner)?;
        Ok(SingularTarget::Held(record))
    }

    fn replace(&mut self, owner: &Resource, record: Option<Resource>) -> ResourceResult<()> {
        let reflection = Arc::clone(&self.state.reflection);
        let schema = schema_of(owner)?;

        match record {
            Some(record) => {
                raise_on_type_mismatch(&reflection, &schema, &record)?;

                let primary_key = reflection.association_primary_key(record.class());
                owner.set(
                    reflection.foreign_key(),
                    record.get(&primary_key).unwrap_or(Value::Null),
                );
                if reflection.is_polymorphic() {
                    owner.set(
                        &reflection.foreign_type(),
                        Value::String(record.class().name().to_string()),
                    );
                }

                set_has_one_inverse(&reflection, &schema, &record, owner)?;
                self.updated = true;
                self.state.target = SingularTarget::Held(record);
            }
            None => {
                owner.set(reflection.foreign_key(), Value::Null);
                if reflection.is_polymorphic() {
                    owner.set(&reflection.foreign_type(), Value::Null);
                }
                self.state.target = SingularTarget::Empty;
            }
        }

        owner.remove_attribute(reflection.name());
        Ok(())
    }

    fn current(&self) -> Option<Resource> {
        self.state.target.get()
    }

    fn stale_state(&self, owner: &Resource) -> Option<String> {
        let reflection = &self.state.reflection;
        let foreign_key = owner.get(reflection.foreign_key()).as_ref().and_then(key_to_string);

        if reflection.is_polymorphic() {
            let foreign_type = owner.get(&reflection.foreign_type()).as_ref().and_then(key_to_string);
            return match (foreign_key, foreign_type) {
                (None, None) => None,
                (key, kind) => Some(format!("{}:{}", kind.unwrap_or_default(), key.unwrap_or_default())),
            };
        }

        foreign_key
    }

    fn on_reset(&mut self) {
        self.updated = false;
    }
}

/// A `belongs_to` only sets the back-reference when the inverse is a `has_one`
fn set_has_one_inverse(
    reflection: &AssociationReflection,
    schema: &Schema,
    record: &Resource,
    owner: &Resource,
) -> ResourceResult<()> {
    match reflection.inverse_of(schema) {
        Some(inverse) if inverse.macro_kind() == AssociationMacro::HasOne => {
            set_inverse_instance(reflection, schema, record, owner)
        }
        _ => Ok(()),
    }
}
