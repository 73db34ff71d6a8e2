//! CalDAV calendar-query filters.
//!
//! A client filter arrives as a generic element tree ([`FilterElement`]),
//! is converted into typed description nodes ([`CompFilter`] and friends),
//! and is then compiled by the [`FilterCompiler`] into a [`FilterExpr`]
//! predicate plus any prop-filters that must be applied after retrieval.
//!
//! # Filter Grammar
//!
//! ```text
//! filter       ::= comp-filter                      (VCALENDAR)
//! comp-filter  ::= is-not-defined
//!                | time-range? prop-filter* comp-filter*
//! prop-filter  ::= is-not-defined
//!                | (time-range | text-match)? param-filter*
//! param-filter ::= is-not-defined | text-match?
//! ```
//!
//! Siblings are combined with the parent's `test` attribute: `allof` is AND,
//! anything else (the default `anyof`) is OR.
//!
//! # Example
//!
//! ```
//! use caldav_query::entity::EntityKind;
//! use caldav_query::filter::{CompFilter, FilterCompiler, FilterExpr};
//! use caldav_query::property::StandardPropertyIndex;
//!
//! let filter = CompFilter::new("VCALENDAR").with_comp_filter(
//!     CompFilter::new("VEVENT")
//!         .with_time_range(Some("20040902T000000Z"), Some("20040903T000000Z")),
//! );
//!
//! let index = StandardPropertyIndex::new();
//! let query = FilterCompiler::new(&index).compile(&filter).unwrap();
//!
//! match query.root {
//!     Some(FilterExpr::And(children)) => {
//!         assert_eq!(children[0], FilterExpr::EntityType(EntityKind::Event));
//!         assert!(matches!(children[1], FilterExpr::EntityTimeRange(_)));
//!     }
//!     other => panic!("unexpected predicate: {other:?}"),
//! }
//! ```

mod ast;
mod compiler;
mod descr;
mod error;
mod evaluator;

pub use ast::FilterExpr;
pub use compiler::{CompiledPropFilter, DeferredGroup, EventQuery, FilterCompiler};
pub use descr::{
    CompFilter, FilterElement, ParamFilter, PropFilter, Test, TextMatch, TimeRangeDescr,
    COLLATION_ASCII_CASEMAP, COLLATION_OCTET,
};
pub use error::{FilterError, FilterResult};
pub use evaluator::FilterEvaluator;

#[cfg(test)]
mod evaluator_tests;
