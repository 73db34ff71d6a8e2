//! Error types for filter parsing and compilation.

use thiserror::Error;

/// A specialized Result type for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors that can occur while parsing or compiling a filter description.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The filter is structurally invalid or ambiguous.
    #[error("invalid filter: {reason}")]
    BadFilter {
        /// What made the filter invalid.
        reason: String,
    },

    /// A prop-filter (or VALARM comp-filter) names a property the server
    /// does not support.
    #[error("unsupported property: {name}")]
    UnknownProperty {
        /// The property name as given in the filter.
        name: String,
    },

    /// A param-filter names a parameter the server does not support.
    #[error("unsupported parameter: {name}")]
    UnknownParameter {
        /// The parameter name as given in the filter.
        name: String,
    },

    /// Comp-filters are nested deeper than the calendar grammar allows.
    #[error("comp-filter nested too deeply (depth {depth})")]
    FilterTooDeep {
        /// The depth at which the offending comp-filter was found.
        depth: usize,
    },

    /// A text-match names a collation the server does not support.
    #[error("unsupported collation: {collation}")]
    UnsupportedCollation {
        /// The requested collation identifier.
        collation: String,
    },
}

impl FilterError {
    /// Creates a bad filter error.
    pub fn bad_filter(reason: impl Into<String>) -> Self {
        FilterError::BadFilter {
            reason: reason.into(),
        }
    }

    /// Creates an unknown property error.
    pub fn unknown_property(name: impl Into<String>) -> Self {
        FilterError::UnknownProperty { name: name.into() }
    }

    /// Creates an unknown parameter error.
    pub fn unknown_parameter(name: impl Into<String>) -> Self {
        FilterError::UnknownParameter { name: name.into() }
    }

    /// Creates an unsupported collation error.
    pub fn unsupported_collation(collation: impl Into<String>) -> Self {
        FilterError::UnsupportedCollation {
            collation: collation.into(),
        }
    }

    /// Returns true if the filter is well-formed but references something
    /// the server does not support (a "forbidden" style condition rather
    /// than a bad request).
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            FilterError::UnknownProperty { .. }
                | FilterError::UnknownParameter { .. }
                | FilterError::UnsupportedCollation { .. }
        )
    }
}
