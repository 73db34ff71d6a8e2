//! The entity store contract and an in-memory implementation.
//!
//! The query coordinator only talks to storage through [`EntityStore`]. A
//! store receives the pushed-down predicate and must return every entity
//! in scope that satisfies it; what it cannot evaluate is handled by the
//! coordinator's post-filter.
//!
//! [`MemoryStore`] keeps a snapshot of entities in memory and evaluates the
//! predicate with [`FilterEvaluator`]. Snapshots are JSON arrays of
//! [`Entity`] values:
//!
//! ```json
//! [
//!   {
//!     "href": "/calendars/alice/work/1.ics",
//!     "collection": "/calendars/alice/work/",
//!     "component": {
//!       "kind": "event",
//!       "properties": [
//!         { "id": "SUMMARY", "value": "Planning" },
//!         { "id": "DTSTART", "value": "20040902T090000Z" }
//!       ]
//!     }
//!   }
//! ]
//! ```

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

use crate::entity::Entity;
use crate::filter::{FilterEvaluator, FilterExpr};
use crate::property::PropertyId;

/// Errors reported by an entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A requested collection does not exist.
    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    /// The caller may not read a requested collection.
    #[error("access denied to collection {collection}")]
    AccessDenied { collection: String },

    /// I/O error while reading a snapshot.
    #[error("failed to read snapshot '{path}': {source}")]
    Read {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A snapshot is not valid JSON for the entity model.
    #[error("invalid snapshot '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Any other storage backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if the error was caused by the request rather than the
    /// store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::CollectionNotFound { .. } | StoreError::AccessDenied { .. }
        )
    }
}

/// Which collections a retrieval covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalScope {
    /// Collection paths to search. Empty means every collection.
    pub collections: Vec<String>,

    /// Also search collections nested below the listed ones.
    pub recursive: bool,
}

impl RetrievalScope {
    /// Scope covering every collection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Scope covering a single collection.
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            collections: vec![path.into()],
            recursive: false,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Returns true if an entity stored in `collection` is in scope.
    pub fn includes(&self, collection: &str) -> bool {
        if self.collections.is_empty() {
            return true;
        }
        self.collections
            .iter()
            .any(|scope| in_collection(scope, collection, self.recursive))
    }
}

fn in_collection(scope: &str, collection: &str, recursive: bool) -> bool {
    if recursive {
        collection.starts_with(scope)
    } else {
        collection == scope
    }
}

/// How much of each entity the store must return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// Whole entities, alarms included.
    #[default]
    Full,
    /// Only the listed properties of the main component.
    Properties(Vec<PropertyId>),
}

impl Projection {
    /// Applies the projection to an entity.
    pub fn apply(&self, mut entity: Entity) -> Entity {
        if let Projection::Properties(keep) = self {
            entity
                .component
                .properties
                .retain(|property| keep.contains(&property.id));
            if !keep.contains(&PropertyId::Valarm) {
                entity.component.alarms.clear();
            }
        }
        entity
    }
}

/// Retrieval contract consumed by the query coordinator.
pub trait EntityStore: Send + Sync {
    /// Returns the entities in `scope` matching `predicate` (all of them when
    /// `predicate` is `None`), shaped by `projection`.
    fn retrieve(
        &self,
        predicate: Option<&FilterExpr>,
        scope: &RetrievalScope,
        projection: &Projection,
    ) -> impl Future<Output = Result<Vec<Entity>, StoreError>> + Send;
}

/// An entity store backed by an in-memory snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entities: Vec<Entity>,
}

impl MemoryStore {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    /// Loads a JSON snapshot from disk.
    ///
    /// # Errors
    ///
    /// - Returns `StoreError::Read` if the file cannot be read.
    /// - Returns `StoreError::Json` if the file is not a valid snapshot.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let entities: Vec<Entity> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), count = entities.len(), "loaded entity snapshot");
        Ok(Self::new(entities))
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Checks that every collection named by the scope holds something.
    fn check_scope(&self, scope: &RetrievalScope) -> Result<(), StoreError> {
        for collection in &scope.collections {
            let known = self
                .entities
                .iter()
                .any(|entity| in_collection(collection, &entity.collection, scope.recursive));
            if !known {
                return Err(StoreError::CollectionNotFound {
                    collection: collection.clone(),
                });
            }
        }
        Ok(())
    }
}

impl EntityStore for MemoryStore {
    async fn retrieve(
        &self,
        predicate: Option<&FilterExpr>,
        scope: &RetrievalScope,
        projection: &Projection,
    ) -> Result<Vec<Entity>, StoreError> {
        self.check_scope(scope)?;

        let evaluator = predicate.map(FilterEvaluator::new);
        let matched: Vec<Entity> = self
            .entities
            .iter()
            .filter(|entity| scope.includes(&entity.collection))
            .filter(|entity| evaluator.map_or(true, |evaluator| evaluator.matches(entity)))
            .cloned()
            .map(|entity| projection.apply(entity))
            .collect();

        trace!(
            total = self.entities.len(),
            matched = matched.len(),
            "memory store retrieval"
        );
        Ok(matched)
    }
}
