pub mod error;
pub mod pipeline;
pub mod types;
pub mod where_clause;

pub use error::QueryError;
pub use pipeline::{apply, QueryOutcome};
pub use types::ListDirectives;
pub use where_clause::WherePredicate;
