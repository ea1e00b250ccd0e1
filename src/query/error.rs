//! Error types for query translation

use thiserror::Error;

use crate::metadata::SchemaError;

/// Fatal errors raised while building a query.
///
/// An expression the document store cannot express is not an error at this
/// level: translation reports it as `Ok(None)` and the query-shape layer turns
/// it into [`QueryError::Untranslatable`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("A limit has already been applied to this query")]
    LimitAlreadyApplied,

    #[error("An offset has already been applied to this query")]
    OffsetAlreadyApplied,

    #[error("Ordering cannot be replaced once distinct or paging has been applied")]
    OrderingAfterPaging,

    #[error("Orderings cannot be reversed once a limit or offset has been applied")]
    ReverseAfterPaging,

    #[error("Member '{member}' is not declared in the hierarchy of entity type '{entity_type}'")]
    UnrelatedMember { entity_type: String, member: String },

    #[error("Entity type '{requested}' is not assignable to '{entity_type}'")]
    UnrelatedEntityType {
        entity_type: String,
        requested: String,
    },

    #[error("Navigation '{entity_type}.{navigation}' doesn't point to an embedded entity.")]
    NotEmbedded {
        entity_type: String,
        navigation: String,
    },

    #[error("No projection is registered for member '{0}'")]
    ProjectionNotFound(String),

    #[error("The expression '{0}' could not be translated")]
    Untranslatable(String),

    #[error("Ordering by '{0}' is not supported; only document fields can be sorted")]
    UnsupportedOrdering(String),

    #[error("No value supplied for query parameter '{0}'")]
    UnboundParameter(String),

    #[error("Paging value '{0}' is not a non-negative integer")]
    InvalidPagingValue(String),

    #[error("Expression '{0}' cannot be rendered into a document filter")]
    UnsupportedFilter(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
