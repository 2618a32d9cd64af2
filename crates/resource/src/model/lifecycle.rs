//! Resource lifecycle - save, destroy, delete and reload against the remote

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::attributes::key_to_string;
use crate::error::{ResourceError, ResourceResult};
use crate::relationships::{AssociationMacro, DependencyOutcome, DependentPolicy};
use crate::remote::SaveOutcome;

use super::instance::Resource;

impl Resource {
    /// Save with remote validation; `false` when the remote rejected the record
    pub fn save(&self) -> ResourceResult<bool> {
        self.save_with(true)
    }

    /// Create or update the record remotely
    ///
    /// New records become persisted. Validation errors reported by the remote
    /// replace the record's errors.
    pub fn save_with(&self, validate: bool) -> ResourceResult<bool> {
        if self.is_destroyed() {
            return Err(ResourceError::RecordNotSaved(format!(
                "{} has been destroyed",
                self.class().name()
            )));
        }

        let class = self.class();
        let attributes = self.attributes();
        let outcome = class
            .persistence()
            .save(class, &attributes, self.is_new_record(), validate)?;

        let mut errors = self.0.errors.borrow_mut();
        errors.clear();

        match outcome {
            SaveOutcome::Saved(saved) => {
                self.0.attributes.borrow_mut().merge(saved);
                self.0.persisted.set(true);
                debug!("Saved {}#{}", class.name(), self.id().as_ref().and_then(key_to_string).unwrap_or_default());
                Ok(true)
            }
            SaveOutcome::Invalid(failures) => {
                for (scope, code) in failures {
                    errors.add(scope, code, BTreeMap::new());
                }
                Ok(false)
            }
        }
    }

    /// Save, turning a remote validation failure into `RecordInvalid`
    pub fn save_strict(&self) -> ResourceResult<()> {
        if self.save_with(true)? {
            Ok(())
        } else {
            Err(ResourceError::RecordInvalid(self.errors().full_messages()))
        }
    }

    /// Destroy the record and run its dependent policies
    ///
    /// `has_one`/`has_many` dependents run before the remote destroy and a
    /// restriction stops everything; `belongs_to` dependents run afterwards.
    /// Returns `false` when a `restrict_with_error` association aborted.
    pub fn destroy(&self) -> ResourceResult<bool> {
        if self.0.destroying.get() || self.is_destroyed() {
            return Ok(true);
        }

        self.0.destroying.set(true);
        let result = self.run_destroy();
        self.0.destroying.set(false);
        result
    }

    fn run_destroy(&self) -> ResourceResult<bool> {
        let reflections = self.class().reflections().all();
        let (restrictions, others): (Vec<_>, Vec<_>) = reflections
            .iter()
            .filter(|reflection| reflection.dependent().is_some() && reflection.through().is_none())
            .partition(|reflection| {
                matches!(
                    reflection.dependent(),
                    Some(DependentPolicy::RestrictWithException | DependentPolicy::RestrictWithError)
                )
            });
        let (belongs_to, has): (Vec<_>, Vec<_>) = others
            .into_iter()
            .partition(|reflection| reflection.macro_kind() == AssociationMacro::BelongsTo);

        for reflection in restrictions.into_iter().chain(has) {
            let outcome = self.with_association(reflection.name(), |association| association.handle_dependency())?;
            if outcome == DependencyOutcome::Abort {
                warn!("Destroy of {} aborted by :{}", self.class().name(), reflection.name());
                return Ok(false);
            }
        }

        if self.is_persisted() {
            let id = self.id().unwrap_or(Value::Null);
            self.class().persistence().destroy(self.class(), &id)?;
        }
        self.mark_destroyed();

        for reflection in belongs_to {
            self.with_association(reflection.name(), |association| association.handle_dependency())?;
        }

        Ok(true)
    }

    /// Destroy, turning an abort into `RecordNotDestroyed`
    pub fn destroy_strict(&self) -> ResourceResult<()> {
        if self.destroy()? {
            Ok(())
        } else {
            Err(ResourceError::RecordNotDestroyed(self.errors().full_messages()))
        }
    }

    /// Delete the record remotely without running any dependent policy
    pub fn delete(&self) -> ResourceResult<()> {
        if self.is_persisted() {
            let id = self.id().unwrap_or(Value::Null);
            self.class().persistence().delete(self.class(), &id)?;
        }
        self.mark_destroyed();
        Ok(())
    }

    /// Refetch the attributes and drop every cached association
    pub fn reload(&self) -> ResourceResult<()> {
        let id = self.id().ok_or_else(|| {
            ResourceError::RecordNotSaved(format!("cannot reload a new {}", self.class().name()))
        })?;
        let fresh = self.class().find(id)?;

        *self.0.attributes.borrow_mut() = fresh.attributes();
        self.0.persisted.set(true);
        self.clear_association_cache();
        Ok(())
    }

    fn mark_destroyed(&self) {
        self.0.persisted.set(false);
        self.0.destroyed.set(true);
    }
}
