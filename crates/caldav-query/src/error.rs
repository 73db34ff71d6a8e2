//! Error types for query execution.

use thiserror::Error;

use crate::filter::FilterError;
use crate::store::StoreError;

/// A specialized Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while running a calendar query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The filter description could not be compiled.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A collection in the retrieval scope does not exist.
    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    /// The caller may not read a collection in the retrieval scope.
    #[error("access denied to collection {collection}")]
    AccessDenied { collection: String },

    /// The entity store failed.
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] StoreError),
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CollectionNotFound { collection } => {
                QueryError::CollectionNotFound { collection }
            }
            StoreError::AccessDenied { collection } => QueryError::AccessDenied { collection },
            other => QueryError::Retrieval(other),
        }
    }
}

impl QueryError {
    /// Returns the HTTP status a server would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::Filter(err) if err.is_unsupported() => 403,
            QueryError::Filter(_) => 400,
            QueryError::AccessDenied { .. } => 403,
            QueryError::CollectionNotFound { .. } => 404,
            QueryError::Retrieval(_) => 500,
        }
    }

    /// Returns true if the request, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Retrieval(_))
    }
}
