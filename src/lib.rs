//! Vellum: routing and data-access core for a small MVC web framework.
//!
//! Two subsystems: a bidirectional URL router (`routing`) that compiles
//! human-written route patterns into matchers and inverse generators, and a
//! generic relational data-access layer (`repo`) over PostgreSQL with
//! relation resolution, out-of-schema "extra" attributes, and regex-driven
//! validation bounds (`validate`). The HTTP front controller that composes
//! them lives outside this crate.

pub mod config;
pub mod error;
pub mod inflect;
pub mod pool;
pub mod repo;
pub mod routing;
pub mod sql;
pub mod validate;

pub use config::{DatabaseConfig, Settings};
pub use error::{AppError, RouteError};
pub use pool::PoolRegistry;
pub use repo::{
    ensure_extra_table, Conditions, EntityRepository, Projection, QuerySpec, Record,
    RelationDescriptor, RelationKind, RelationLink, Viewer,
};
pub use routing::{RequestResolver, ResolvedRequest, RouteTable, UrlGenerator};
pub use validate::{LengthBounds, ValidationReport, ValidationRule};
