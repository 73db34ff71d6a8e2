//! CalDAV calendar-query filter engine.
//!
//! This crate compiles RFC 4791 `CALDAV:filter` descriptions into predicate
//! trees, decides which parts an entity store can evaluate itself, and
//! applies the rest to the retrieved calendar entities.
//!
//! The main entry points are:
//!
//! - [`filter::FilterCompiler`] to compile a [`filter::CompFilter`] into an
//!   [`filter::EventQuery`]
//! - [`filter::FilterEvaluator`] to test a compiled predicate against an
//!   [`entity::Entity`]
//! - [`QueryCoordinator`] to run a whole query against an [`EntityStore`]

pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod property;
pub mod query;
pub mod store;
pub mod time_range;

pub use config::{ConfigError, PostFilterMode, QueryConfig};
pub use entity::{Component, Entity, EntityKind, Property};
pub use error::{QueryError, QueryResult};
pub use filter::{CompFilter, EventQuery, FilterCompiler, FilterError, FilterExpr};
pub use property::{PropertyId, PropertyIndex, StandardPropertyIndex};
pub use query::QueryCoordinator;
pub use store::{EntityStore, MemoryStore, Projection, RetrievalScope, StoreError};
pub use time_range::TimeRange;
