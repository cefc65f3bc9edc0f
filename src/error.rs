//! Typed errors for routing and data access.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Connection(String),
    #[error("unknown database profile: {0}")]
    UnknownProfile(String),
}
