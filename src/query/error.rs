use thiserror::Error;

use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Could not parse WHERE clause, check your syntax.")]
    InvalidWhereClause,

    #[error("Invalid load specifier: {0}")]
    InvalidLoad(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
