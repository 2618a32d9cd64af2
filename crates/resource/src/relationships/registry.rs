//! Reflection Registry - per-type storage of association reflections

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use super::metadata::AssociationMacro;
use super::reflection::AssociationReflection;

/// Reflections declared on one resource type, keyed by association name
///
/// Declaration order is preserved. Re-declaring a name replaces the
/// reflection in place.
#[derive(Debug, Default)]
pub struct ReflectionRegistry {
    reflections: RwLock<IndexMap<String, Arc<AssociationReflection>>>,
}

impl ReflectionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with a snapshot of another type's reflections
    pub fn inherit(parent: &ReflectionRegistry) -> Self {
        Self {
            reflections: RwLock::new(parent.snapshot()),
        }
    }

    /// Insert a reflection, returning the one it replaced
    pub fn insert(&self, reflection: Arc<AssociationReflection>) -> Option<Arc<AssociationReflection>> {
        let mut reflections = self.reflections.write().unwrap_or_else(PoisonError::into_inner);
        reflections.insert(reflection.name().to_string(), reflection)
    }

    /// Get a reflection by association name
    pub fn get(&self, name: &str) -> Option<Arc<AssociationReflection>> {
        self.reflections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.reflections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// All reflections in declaration order
    pub fn all(&self) -> Vec<Arc<AssociationReflection>> {
        self.reflections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Reflections declared with the given macro
    pub fn by_macro(&self, macro_kind: AssociationMacro) -> Vec<Arc<AssociationReflection>> {
        self.all()
            .into_iter()
            .filter(|reflection| reflection.macro_kind() == macro_kind)
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.reflections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.reflections.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current name -> reflection map
    pub fn snapshot(&self) -> IndexMap<String, Arc<AssociationReflection>> {
        self.reflections.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Get statistics about the registry
    pub fn stats(&self) -> RegistryStats {
        let reflections = self.all();
        let mut macro_counts = HashMap::new();
        for reflection in &reflections {
            *macro_counts.entry(reflection.macro_kind()).or_insert(0) += 1;
        }

        RegistryStats {
            total_reflections: reflections.len(),
            polymorphic_reflections: reflections.iter().filter(|r| r.is_polymorphic()).count(),
            through_reflections: reflections.iter().filter(|r| r.through().is_some()).count(),
            macro_counts,
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_reflections: usize,
    pub polymorphic_reflections: usize,
    pub through_reflections: usize,
    pub macro_counts: HashMap<AssociationMacro, usize>,
}
