use thiserror::Error;

use crate::repository::Pk;

/// Failures raised by the repositories and the category hierarchy.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot add {entity} with primary key {pk} already set")]
    PkAlreadySet { entity: &'static str, pk: Pk },
    #[error("{entity} has no primary key")]
    PkUnset { entity: &'static str },
    #[error("no {entity} with primary key {pk}")]
    NotFound { entity: &'static str, pk: Pk },
    #[error("{entity} has no field `{field}`")]
    UnknownField { entity: &'static str, field: String },
    #[error("parent category `{0}` is referenced before it is created")]
    UnknownParent(String),
    #[error("category {0} appears twice in its own parent chain")]
    CategoryCycle(Pk),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
