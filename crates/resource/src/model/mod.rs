//! Model System - resource types and their instances
//!
//! - `class`: resource types, association declarations and remote lookups
//! - `instance`: resource instances, the association cache and accessor dispatch
//! - `lifecycle`: save, destroy, delete and reload

pub mod class;
pub mod instance;
pub mod lifecycle;

pub use class::ResourceClass;
pub use instance::{Resource, WeakResource};
