//! HasMany Association - an ordered collection scoped to the owner

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::attributes::{AttributeStore, Attributes, ErrorScope};
use crate::error::{ResourceError, ResourceResult};
use crate::inflector;
use crate::model::{Resource, ResourceClass, WeakResource};

use super::association::DependencyOutcome;
use super::metadata::DependentPolicy;
use super::reflection::AssociationReflection;
use super::traits::{
    raise_on_type_mismatch, schema_of, set_inverse_instance, set_owner_attributes, AssociationProxy,
    AssociationState,
};

/// `has_many` proxy
#[derive(Debug)]
pub struct HasManyAssociation {
    state: AssociationState<Vec<Resource>>,
}

impl HasManyAssociation {
    pub fn new(owner: WeakResource, reflection: Arc<AssociationReflection>) -> Self {
        Self {
            state: AssociationState::new(owner, reflection),
        }
    }

    /// Records currently held, without resolving
    pub fn target(&self) -> &[Resource] {
        &self.state.target
    }

    /// Filter parameters scoping remote lookups to the owner
    fn filters(&self, owner: &Resource) -> Attributes {
        let reflection = &self.state.reflection;
        let mut filters = reflection.conditions().cloned().unwrap_or_default();
        filters.set(
            reflection.owner_key(owner.class()),
            owner.id().unwrap_or(Value::Null),
        );
        filters
    }

    fn embedded(&self, owner: &Resource, klass: &Arc<ResourceClass>) -> ResourceResult<Option<Vec<Resource>>> {
        if !owner.includes(self.state.reflection.name()) {
            return Ok(None);
        }

        let records = match owner.get(self.state.reflection.name()) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| Ok(klass.instantiate(Attributes::from_value(item)?, true)))
                .collect::<ResourceResult<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(ResourceError::Serialization(format!(
                    "expected an array for embedded association '{}', got {}",
                    self.state.reflection.name(),
                    other
                )))
            }
        };

        Ok(Some(records))
    }

    /// Resolve the members: embedded collection, remote list, or nothing
    pub fn scope(&self, owner: &Resource) -> ResourceResult<Vec<Resource>> {
        let schema = schema_of(owner)?;
        let reflection = &self.state.reflection;
        let klass = reflection.klass(&*schema)?;

        let mut records = match self.embedded(owner, &klass)? {
            Some(records) => records,
            None if owner.is_persisted() => {
                let filters = self.filters(owner);
                if owner.class().config().log_resolutions {
                    debug!(
                        "Fetching {} for {}.{} with {:?}",
                        klass.name(),
                        owner.class().name(),
                        reflection.name(),
                        filters
                    );
                }

                klass
                    .finder()
                    .find_all(&klass, &filters)?
                    .into_iter()
                    .map(|attributes| klass.instantiate(attributes, true))
                    .collect()
            }
            None => Vec::new(),
        };

        if let Some(limit) = reflection.limit() {
            records.truncate(limit);
        }

        for record in &records {
            set_inverse_instance(reflection, &schema, record, owner)?;
        }

        Ok(records)
    }

    /// Count members without loading them
    ///
    /// A zero count marks the collection loaded; unsaved records already in
    /// the target are kept.
    pub fn count_records(&mut self) -> ResourceResult<usize> {
        let owner = self.owner()?;
        let schema = schema_of(&owner)?;
        let klass = self.state.reflection.klass(&*schema)?;

        let count = match self.embedded(&owner, &klass)? {
            Some(records) => records.len(),
            None if owner.is_persisted() => klass.finder().count(&klass, &self.filters(&owner))?,
            None => 0,
        };

        if count == 0 {
            self.state.target.retain(Resource::is_new_record);
            self.loaded(&owner);
        }

        Ok(match self.state.reflection.limit() {
            Some(limit) => count.min(limit),
            None => count,
        })
    }

    /// Number of members; counts remotely when not loaded
    pub fn size(&mut self) -> ResourceResult<usize> {
        let owner = self.owner()?;
        if self.is_loaded() || !self.should_find_target(&owner)? {
            return Ok(self.state.target.len());
        }

        let unsaved = self.state.target.iter().filter(|r| r.is_new_record()).count();
        Ok(self.count_records()? + unsaved)
    }

    pub fn is_empty(&mut self) -> ResourceResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Scope `record` to the owner and save it
    pub fn insert_record(&mut self, record: &Resource, validate: bool, raise: bool) -> ResourceResult<bool> {
        let owner = self.owner()?;
        let schema = schema_of(&owner)?;

        set_owner_attributes(&self.state.reflection, &owner, record);
        set_inverse_instance(&self.state.reflection, &schema, record, &owner)?;

        if raise {
            record.save_strict()?;
            Ok(true)
        } else {
            record.save_with(validate)
        }
    }

    /// Append records, saving each when the owner is persisted
    ///
    /// Returns false when any record failed to save; every record is appended
    /// regardless.
    pub fn concat(&mut self, records: Vec<Resource>) -> ResourceResult<bool> {
        let owner = self.owner()?;
        let schema = schema_of(&owner)?;
        let reflection = Arc::clone(&self.state.reflection);

        for record in &records {
            raise_on_type_mismatch(&reflection, &schema, record)?;
        }

        let mut saved = true;
        for record in records {
            if owner.is_persisted() {
                saved &= self.insert_record(&record, reflection.validate(), false)?;
            } else {
                set_owner_attributes(&reflection, &owner, &record);
                set_inverse_instance(&reflection, &schema, &record, &owner)?;
            }
            self.add_to_target(record);
        }

        Ok(saved)
    }

    /// Build an unsaved member and append it
    pub fn build(&mut self, attributes: Attributes) -> ResourceResult<Resource> {
        let owner = self.owner()?;
        let schema = schema_of(&owner)?;
        let reflection = Arc::clone(&self.state.reflection);

        let record = reflection.build_association(&*schema, attributes)?;
        set_owner_attributes(&reflection, &owner, &record);
        set_inverse_instance(&reflection, &schema, &record, &owner)?;

        self.add_to_target(record.clone());
        Ok(record)
    }

    /// Build, append and save a member; the owner must already be persisted
    pub fn create(&mut self, attributes: Attributes, strict: bool) -> ResourceResult<Resource> {
        let owner = self.owner()?;
        if owner.is_new_record() {
            return Err(ResourceError::RecordNotSaved(
                "You cannot call create unless the parent is saved".to_string(),
            ));
        }

        let record = self.build(attributes)?;
        let validate = self.state.reflection.validate();
        self.insert_record(&record, validate, strict)?;
        Ok(record)
    }

    /// Destroy every member, running their own dependents
    pub fn destroy_all(&mut self) -> ResourceResult<()> {
        let records = self.load_target()?;
        for record in &records {
            record.destroy_strict()?;
        }
        self.clear_target()
    }

    /// Delete every member without hooks
    pub fn delete_all(&mut self) -> ResourceResult<()> {
        let records = self.load_target()?;
        for record in records.iter().filter(|r| r.is_persisted()) {
            record.delete()?;
        }
        self.clear_target()
    }

    /// Clear the owner-scoping key on every member and save it
    pub fn nullify(&mut self) -> ResourceResult<()> {
        let owner = self.owner()?;
        let key = self.state.reflection.owner_key(owner.class());

        let records = self.load_target()?;
        for record in &records {
            record.set(&key, Value::Null);
            if record.is_persisted() {
                record.save_with(false)?;
            }
        }
        self.clear_target()
    }

    /// Run the `dependent` policy before the owner is destroyed
    pub fn handle_dependency(&mut self) -> ResourceResult<DependencyOutcome> {
        let Some(policy) = self.state.reflection.dependent() else {
            return Ok(DependencyOutcome::Proceed);
        };
        let reflection = Arc::clone(&self.state.reflection);

        match policy {
            DependentPolicy::RestrictWithException => {
                if !self.is_empty()? {
                    return Err(ResourceError::DeleteRestriction(reflection.name().to_string()));
                }
            }
            DependentPolicy::RestrictWithError => {
                if !self.is_empty()? {
                    let owner = self.owner()?;
                    let mut context = BTreeMap::new();
                    context.insert(
                        "record".to_string(),
                        inflector::human_attribute_name(reflection.name()).to_lowercase(),
                    );
                    owner.add_error(ErrorScope::Base, "restrict_dependent_destroy.many", context);
                    warn!(
                        "Destroy of {} aborted: dependent {} exist",
                        owner.class().name(),
                        reflection.name()
                    );
                    return Ok(DependencyOutcome::Abort);
                }
            }
            DependentPolicy::Destroy => {
                let records = self.load_target()?;
                for record in &records {
                    record.set_destroyed_by_association(Some(Arc::clone(&reflection)));
                }
                for record in &records {
                    record.destroy_strict()?;
                }
                self.clear_target()?;
            }
            DependentPolicy::Nullify => self.nullify()?,
            DependentPolicy::Delete | DependentPolicy::DeleteAll => self.delete_all()?,
        }

        Ok(DependencyOutcome::Proceed)
    }

    fn add_to_target(&mut self, record: Resource) {
        if !self.state.target.iter().any(|r| r.ptr_eq(&record)) {
            self.state.target.push(record);
        }
    }

    fn clear_target(&mut self) -> ResourceResult<()> {
        self.set_target(Vec::new())
    }
}

impl AssociationProxy for HasManyAssociation {
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
        Ok(owner.is_persisted() || owner.includes(self.state.reflection.name()))
    }

    fn find_target(&mut self, owner: &Resource) -> ResourceResult<Vec<Resource>> {
        self.scope(owner)
    }

    /// Keep unsaved records built before the collection was loaded
    fn merge_target(&mut self, mut found: Vec<Resource>) -> Vec<Resource> {
        let unsaved: Vec<Resource> = self
            .state
            .target
            .drain(..)
            .filter(|record| record.is_new_record() && !found.iter().any(|f| f.ptr_eq(record)))
            .collect();
        found.extend(unsaved);
        found
    }

    fn replace(&mut self, owner: &Resource, records: Vec<Resource>) -> ResourceResult<()> {
        let schema = schema_of(owner)?;
        let reflection = Arc::clone(&self.state.reflection);

        for record in &records {
            raise_on_type_mismatch(&reflection, &schema, record)?;
        }
        for record in &records {
            set_owner_attributes(&reflection, owner, record);
            set_inverse_instance(&reflection, &schema, record, owner)?;
        }

        self.state.target = records;
        owner.remove_attribute(reflection.name());
        Ok(())
    }

    fn current(&self) -> Vec<Resource> {
        self.state.target.clone()
    }
}
