//! Inverse Inference - automatic detection of the inverse association
//!
//! Candidates come from an ordered list of [`InverseProvider`]s held by the
//! schema. The first candidate that passes validation wins; when no provider
//! yields one the association simply has no inverse.

use std::fmt;

use tracing::trace;

use crate::inflector;
use crate::model::ResourceClass;
use crate::schema::Schema;

use super::metadata::InverseOf;
use super::reflection::AssociationReflection;

/// A proposed inverse: the association name to look up on the target type
/// and the class name that association must point back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseCandidate {
    pub name: String,
    pub expected_class: String,
}

/// Strategy deriving an inverse candidate for a reflection
pub trait InverseProvider: Send + Sync + fmt::Debug {
    /// Short name used in trace output
    fn name(&self) -> &'static str;

    /// Candidate for `reflection`, whose target type resolved to `klass`
    fn candidate(&self, reflection: &AssociationReflection, klass: &ResourceClass) -> Option<InverseCandidate>;
}

/// Candidate named after the reflection's own target class
///
/// `has_many :comments` proposes `comment`, which must point back at `Comment`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetNamedInverse;

impl InverseProvider for TargetNamedInverse {
    fn name(&self) -> &'static str {
        "target_named"
    }

    fn candidate(&self, reflection: &AssociationReflection, klass: &ResourceClass) -> Option<InverseCandidate> {
        Some(InverseCandidate {
            name: inflector::underscore(&reflection.derive_class_name()),
            expected_class: klass.name().to_string(),
        })
    }
}

/// Candidate named after the declaring type
///
/// `Post has_many :comments` proposes `post` on `Comment`, which must point
/// back at `Post`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerNamedInverse;

impl InverseProvider for OwnerNamedInverse {
    fn name(&self) -> &'static str {
        "owner_named"
    }

    fn candidate(&self, reflection: &AssociationReflection, _klass: &ResourceClass) -> Option<InverseCandidate> {
        Some(InverseCandidate {
            name: inflector::underscore(reflection.active_resource()),
            expected_class: reflection.active_resource().to_string(),
        })
    }
}

/// Providers installed when a schema is built without an explicit list
pub fn default_inverse_providers() -> Vec<Box<dyn InverseProvider>> {
    vec![Box::new(TargetNamedInverse), Box::new(OwnerNamedInverse)]
}

/// Whether a reflection may take part in automatic inverse detection
pub fn can_find_inverse_of_automatically(reflection: &AssociationReflection) -> bool {
    let options = reflection.options();

    options.inverse_of != InverseOf::Disabled
        && !["conditions", "through", "polymorphic", "foreign_key"]
            .iter()
            .any(|key| options.has(key))
}

/// Whether `candidate` on the target type is an acceptable inverse
pub fn valid_inverse_reflection(candidate: &AssociationReflection, expected_class: &str) -> bool {
    candidate.class_name() == expected_class && can_find_inverse_of_automatically(candidate)
}

/// Infer the inverse name of `reflection`
///
/// Returns the inverse (if any) and whether the answer is final. The answer is
/// not final while the target type cannot be resolved yet, so a later call
/// can still find the inverse once the type is defined.
pub fn automatic_inverse_of(reflection: &AssociationReflection, schema: &Schema) -> (Option<String>, bool) {
    if !can_find_inverse_of_automatically(reflection) {
        trace!("No automatic inverse for '{}': not eligible", reflection.name());
        return (None, true);
    }

    let klass = match reflection.klass(schema) {
        Ok(klass) => klass,
        Err(e) => {
            trace!("No automatic inverse for '{}': {}", reflection.name(), e);
            return (None, false);
        }
    };

    for provider in schema.inverse_providers() {
        let Some(candidate) = provider.candidate(reflection, &klass) else {
            continue;
        };

        let accepted = klass
            .reflect_on_association(&candidate.name)
            .map(|inverse| valid_inverse_reflection(&inverse, &candidate.expected_class))
            .unwrap_or(false);

        trace!(
            "Inverse candidate '{}' for {}.{} from {}: {}",
            candidate.name,
            reflection.active_resource(),
            reflection.name(),
            provider.name(),
            if accepted { "accepted" } else { "rejected" }
        );

        if accepted {
            return (Some(candidate.name), true);
        }
    }

    (None, true)
}
