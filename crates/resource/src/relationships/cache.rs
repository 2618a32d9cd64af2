//! Association Cache - per-instance storage of association proxies

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use super::association::Association;
use super::reflection::AssociationReflection;

#[derive(Debug)]
struct CacheEntry {
    reflection: Arc<AssociationReflection>,
    association: Rc<RefCell<Association>>,
}

/// Association proxies of one resource instance, keyed by association name
#[derive(Debug, Default)]
pub struct AssociationCache {
    entries: HashMap<String, CacheEntry>,
}

impl AssociationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached proxy, provided it was built from `reflection`
    ///
    /// A proxy built from a reflection that has since been redeclared is not
    /// returned.
    pub fn get(&self, reflection: &Arc<AssociationReflection>) -> Option<Rc<RefCell<Association>>> {
        self.entries
            .get(reflection.name())
            .filter(|entry| Arc::ptr_eq(&entry.reflection, reflection))
            .map(|entry| Rc::clone(&entry.association))
    }

    /// Cached proxy by name, whatever reflection it was built from
    pub fn get_by_name(&self, name: &str) -> Option<Rc<RefCell<Association>>> {
        self.entries.get(name).map(|entry| Rc::clone(&entry.association))
    }

    pub fn insert(&mut self, reflection: Arc<AssociationReflection>, association: Rc<RefCell<Association>>) {
        self.entries.insert(
            reflection.name().to_string(),
            CacheEntry {
                reflection,
                association,
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<Rc<RefCell<Association>>> {
        self.entries.remove(name).map(|entry| entry.association)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
