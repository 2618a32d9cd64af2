//! Accessor Synthesis - per-type dispatch table of association accessors
//!
//! Declaring `has_many :comments` stores a `comments` reader and a
//! `comments=` writer. Constructable singular associations also get
//! `build_<name>`, `create_<name>` and `create_<name>!`.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use crate::attributes::Attributes;
use crate::error::ResourceResult;
use crate::model::Resource;

use super::association::AssociationTarget;
use super::reflection::AssociationReflection;

pub type Reader = Arc<dyn Fn(&Resource, bool) -> ResourceResult<AssociationTarget> + Send + Sync>;
pub type Writer = Arc<dyn Fn(&Resource, AssociationTarget) -> ResourceResult<()> + Send + Sync>;
pub type Constructor = Arc<dyn Fn(&Resource, Attributes) -> ResourceResult<Resource> + Send + Sync>;

/// Callable accessor stored under one name
#[derive(Clone)]
pub enum Accessor {
    Reader(Reader),
    Writer(Writer),
    Constructor(Constructor),
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader(_) => f.write_str("Reader"),
            Self::Writer(_) => f.write_str("Writer"),
            Self::Constructor(_) => f.write_str("Constructor"),
        }
    }
}

/// Accessor names synthesized for a reflection
pub fn accessor_names(reflection: &AssociationReflection) -> Vec<String> {
    let name = reflection.name();
    let mut names = vec![name.to_string(), format!("{}=", name)];
    if reflection.is_constructable() && !reflection.is_collection() {
        names.push(format!("build_{}", name));
        names.push(format!("create_{}", name));
        names.push(format!("create_{}!", name));
    }
    names
}

/// Dispatch table mapping accessor names to closures bound to an association name
#[derive(Debug, Default)]
pub struct AccessorTable {
    accessors: RwLock<IndexMap<String, Accessor>>,
}

impl AccessorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with another type's accessors
    pub fn inherit(parent: &AccessorTable) -> Self {
        Self {
            accessors: RwLock::new(parent.snapshot()),
        }
    }

    /// Synthesize (or replace) the accessors for a reflection
    pub fn define_accessors(&self, reflection: &AssociationReflection) {
        let name = reflection.name().to_string();
        let mut accessors = self.accessors.write().unwrap_or_else(PoisonError::into_inner);

        // A redeclared association may no longer be constructable
        for stale in [
            format!("build_{}", name),
            format!("create_{}", name),
            format!("create_{}!", name),
        ] {
            accessors.shift_remove(&stale);
        }

        let association = name.clone();
        accessors.insert(
            name.clone(),
            Accessor::Reader(Arc::new(move |owner: &Resource, force_reload: bool| {
                owner.with_association(&association, |a| a.reader(force_reload))
            })),
        );

        let association = name.clone();
        accessors.insert(
            format!("{}=", name),
            Accessor::Writer(Arc::new(move |owner: &Resource, value: AssociationTarget| {
                owner.with_association(&association, |a| a.writer(value))
            })),
        );

        if reflection.is_constructable() && !reflection.is_collection() {
            let association = name.clone();
            accessors.insert(
                format!("build_{}", name),
                Accessor::Constructor(Arc::new(move |owner: &Resource, attributes: Attributes| {
                    owner.with_association(&association, |a| a.build(attributes))
                })),
            );

            let association = name.clone();
            accessors.insert(
                format!("create_{}", name),
                Accessor::Constructor(Arc::new(move |owner: &Resource, attributes: Attributes| {
                    owner.with_association(&association, |a| a.create(attributes, false))
                })),
            );

            let association = name.clone();
            accessors.insert(
                format!("create_{}!", name),
                Accessor::Constructor(Arc::new(move |owner: &Resource, attributes: Attributes| {
                    owner.with_association(&association, |a| a.create(attributes, true))
                })),
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<Accessor> {
        self.accessors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.accessors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// All accessor names in definition order
    pub fn names(&self) -> Vec<String> {
        self.accessors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> IndexMap<String, Accessor> {
        self.accessors.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::metadata::{AssociationMacro, AssociationOptions};

    fn reflection(macro_kind: AssociationMacro, name: &str, options: AssociationOptions) -> AssociationReflection {
        AssociationReflection::new(macro_kind, name, "Post", options).unwrap()
    }

    #[test]
    fn test_accessor_names() {
        assert_eq!(
            accessor_names(&reflection(AssociationMacro::HasMany, "comments", AssociationOptions::new())),
            vec!["comments", "comments="]
        );
        assert_eq!(
            accessor_names(&reflection(AssociationMacro::BelongsTo, "author", AssociationOptions::new())),
            vec!["author", "author=", "build_author", "create_author", "create_author!"]
        );
        assert_eq!(
            accessor_names(&reflection(
                AssociationMacro::BelongsTo,
                "commentable",
                AssociationOptions::new().polymorphic()
            )),
            vec!["commentable", "commentable="]
        );
    }

    #[test]
    fn test_define_accessors_matches_names() {
        let table = AccessorTable::new();
        let author = reflection(AssociationMacro::HasOne, "author", AssociationOptions::new());
        table.define_accessors(&author);
        assert_eq!(table.names(), accessor_names(&author));
        assert!(matches!(table.get("author"), Some(Accessor::Reader(_))));
        assert!(matches!(table.get("author="), Some(Accessor::Writer(_))));
        assert!(matches!(table.get("create_author!"), Some(Accessor::Constructor(_))));
    }

    #[test]
    fn test_redeclaring_drops_constructors() {
        let table = AccessorTable::new();
        table.define_accessors(&reflection(AssociationMacro::HasOne, "tag", AssociationOptions::new()));
        assert!(table.contains("build_tag"));

        table.define_accessors(&reflection(
            AssociationMacro::HasOne,
            "tag",
            AssociationOptions::new().through("taggings"),
        ));
        assert!(!table.contains("build_tag"));
        assert!(table.contains("tag"));
        assert!(table.contains("tag="));
    }
}
