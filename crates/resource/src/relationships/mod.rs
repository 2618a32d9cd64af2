//! Relationships Module - reflections, association proxies and inverse inference

pub mod traits;
pub mod association;
pub mod belongs_to;
pub mod has_one;
pub mod has_many;
pub mod through;
pub mod cache;

// Declaration metadata
pub mod metadata;
pub mod reflection;
pub mod registry;
pub mod accessors;
pub mod inference;

// Re-export main types
pub use traits::{AssociationProxy, AssociationState, SingularTarget, TargetSlot};
pub use association::*;
pub use belongs_to::*;
pub use has_one::*;
pub use has_many::*;
pub use through::*;
pub use cache::*;

// Re-export declaration types
pub use metadata::*;
pub use reflection::*;
pub use registry::*;
pub use accessors::*;
pub use inference::*;
