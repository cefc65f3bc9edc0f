//! Generic relational data access: open records, query specs, CRUD with
//! relation resolution and out-of-schema extra attributes.

pub mod extras;
pub mod query;
pub mod record;
pub mod relations;
pub mod repository;

pub use extras::ensure_extra_table;
pub use query::{Conditions, Projection, QuerySpec};
pub use record::Record;
pub use relations::{RelationDescriptor, RelationKind, RelationLink};
pub use repository::{EntityRepository, Viewer};
