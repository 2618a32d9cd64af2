//! # elif-resource: Associations for remote resources
//!
//! Maps nested data returned by a REST API onto typed, related in-memory
//! records with `belongs_to`, `has_one` and `has_many` semantics, without a
//! backing database.
//!
//! Declaring an association registers an immutable reflection on the
//! resource type and synthesizes its accessors. Reading an accessor resolves
//! the target from embedded attributes or a follow-up remote lookup and
//! memoizes it until the association is reset or reloaded.
//!
//! ```ignore
//! let schema = Schema::new();
//! let remote = Arc::new(MemoryRemote::new());
//! let post = schema.define("Post").remote(remote.clone()).register()?;
//! let comment = schema.define("Comment").remote(remote).register()?;
//! post.has_many("comments", AssociationOptions::new())?;
//! comment.belongs_to("post", AssociationOptions::new())?;
//!
//! let record = post.find(1)?;
//! for comment in record.read_many("comments")? {
//!     assert!(comment.read_one("post")?.is_some());
//! }
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod inflector;
pub mod memory;
pub mod model;
pub mod relationships;
pub mod remote;
pub mod schema;

// Re-export core types
pub use attributes::*;
pub use config::*;
pub use error::*;
pub use memory::*;
pub use model::*;
pub use relationships::*;
pub use remote::*;
pub use schema::*;
