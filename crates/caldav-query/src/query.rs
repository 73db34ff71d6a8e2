//! Query coordination: compile, retrieve, post-filter.
//!
//! [`QueryCoordinator`] drives one calendar-query request end to end. The
//! filter is compiled first, so a bad filter never reaches the store. The
//! pushed-down predicate then goes to the [`EntityStore`], and any
//! prop-filters the store could not evaluate are applied to the returned
//! entities.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::config::{PostFilterMode, QueryConfig};
use crate::entity::{Entity, EntityKind};
use crate::error::QueryResult;
use crate::filter::{
    CompFilter, EventQuery, FilterCompiler, FilterEvaluator, FilterExpr, FilterResult,
};
use crate::property::{PropertyIndex, StandardPropertyIndex};
use crate::store::{EntityStore, Projection, RetrievalScope};

/// Runs calendar queries against an entity store.
///
/// The coordinator keeps no per-request state; a single instance can serve
/// concurrent requests.
///
/// # Example
///
/// ```
/// use caldav_query::config::QueryConfig;
/// use caldav_query::entity::{Component, Entity, EntityKind};
/// use caldav_query::filter::CompFilter;
/// use caldav_query::property::StandardPropertyIndex;
/// use caldav_query::query::QueryCoordinator;
/// use caldav_query::store::{MemoryStore, RetrievalScope};
///
/// # tokio_test(async {
/// let store = MemoryStore::new(vec![
///     Entity::new("/cal/1.ics", "/cal/", Component::new(EntityKind::Event)),
///     Entity::new("/cal/2.ics", "/cal/", Component::new(EntityKind::Todo)),
/// ]);
/// let coordinator =
///     QueryCoordinator::new(store, StandardPropertyIndex::new(), QueryConfig::default());
///
/// let filter = CompFilter::new("VCALENDAR").with_comp_filter(CompFilter::new("VTODO"));
/// let found = coordinator
///     .run_query(&filter, &RetrievalScope::all())
///     .await
///     .unwrap();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].href, "/cal/2.ics");
/// # });
/// # fn tokio_test(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct QueryCoordinator<S, I = StandardPropertyIndex> {
    store: S,
    index: I,
    config: QueryConfig,
}

impl<S: EntityStore, I: PropertyIndex> QueryCoordinator<S, I> {
    pub fn new(store: S, index: I, config: QueryConfig) -> Self {
        Self {
            store,
            index,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn compiler(&self) -> FilterCompiler<'_> {
        FilterCompiler::new(&self.index)
            .with_mode(self.config.post_filter.mode)
            .with_floating_tz(self.config.time_range.floating_timezone.as_deref())
    }

    /// Compiles a filter description with the configured settings.
    pub fn compile(&self, filter: &CompFilter) -> FilterResult<EventQuery> {
        self.compiler().compile(filter)
    }

    /// Runs a calendar query.
    ///
    /// # Errors
    ///
    /// - Returns `QueryError::Filter` if the filter does not compile; the
    ///   store is not called in that case.
    /// - Returns `QueryError::CollectionNotFound` or `QueryError::AccessDenied`
    ///   as reported by the store.
    /// - Returns `QueryError::Retrieval` for any other store failure.
    pub async fn run_query(
        &self,
        filter: &CompFilter,
        scope: &RetrievalScope,
    ) -> QueryResult<Vec<Entity>> {
        let query = self.compile(filter)?;
        debug!(
            predicate = ?query.root,
            residual = ?query.residual,
            post_filter = query.post_filter_required,
            collections = ?scope.collections,
            "running calendar query"
        );

        // Deferred filters may read any property or alarm.
        let candidates = self
            .store
            .retrieve(query.root.as_ref(), scope, &Projection::Full)
            .await
            .inspect_err(|err| {
                if !err.is_client_error() {
                    warn!(error = %err, "entity store retrieval failed");
                }
            })?;
        debug!(candidates = candidates.len(), "retrieved candidate entities");

        if !query.post_filter_required {
            return Ok(candidates);
        }
        self.post_filter(&query, candidates)
    }

    /// Re-checks retrieved entities against what the store could not
    /// evaluate.
    ///
    /// By default each candidate must satisfy the complete compiled
    /// predicate. In legacy mode the deferred prop-filters of the entity's
    /// kind are ORed, and deferred alarm filters are checked against the
    /// alarms of entities that have any.
    pub fn post_filter(
        &self,
        query: &EventQuery,
        candidates: Vec<Entity>,
    ) -> QueryResult<Vec<Entity>> {
        if !query.post_filter_required {
            return Ok(candidates);
        }

        let legacy = match query.mode {
            PostFilterMode::HonorTest => None,
            PostFilterMode::LegacyAnyOf => {
                Some(LegacyPredicates::compile(&self.compiler(), query)?)
            }
        };
        let residual = query.residual.as_ref().map(FilterEvaluator::new);

        let container = self.config.post_filter.container.as_deref();
        let total = candidates.len();

        let retained: Vec<Entity> = candidates
            .into_iter()
            .filter(|entity| {
                let in_container =
                    container.map_or(true, |name| entity.container.eq_ignore_ascii_case(name));
                if !in_container {
                    trace!(
                        href = %entity.href,
                        container = %entity.container,
                        "dropping entity outside container"
                    );
                }
                in_container
            })
            .filter(|entity| match (&legacy, &residual) {
                (Some(legacy), _) => legacy.matches(entity),
                (None, Some(residual)) => residual.matches(entity),
                (None, None) => true,
            })
            .collect();

        debug!(
            candidates = total,
            retained = retained.len(),
            "applied post-filter"
        );
        Ok(retained)
    }
}

/// Deferred prop-filters recombined per entity kind, all ORed.
struct LegacyPredicates {
    by_kind: BTreeMap<EntityKind, FilterExpr>,
    alarm: Option<FilterExpr>,
}

impl LegacyPredicates {
    fn compile(compiler: &FilterCompiler<'_>, query: &EventQuery) -> FilterResult<Self> {
        let mut by_kind = BTreeMap::new();
        for (kind, groups) in &query.deferred {
            let mut exprs = Vec::new();
            for filter in groups.iter().flat_map(|group| &group.filters) {
                exprs.push(compiler.compile_prop_filter(filter)?.expr);
            }
            if let Some(expr) = FilterExpr::combine(exprs, false) {
                by_kind.insert(*kind, expr);
            }
        }
        let alarm = by_kind
            .remove(&EntityKind::Alarm)
            .map(|expr| FilterExpr::WithinAlarm(Box::new(expr)));
        Ok(Self { by_kind, alarm })
    }

    /// Entities whose kind has nothing deferred are kept.
    fn matches(&self, entity: &Entity) -> bool {
        let own = self.by_kind.get(&entity.kind());
        let alarm = self
            .alarm
            .as_ref()
            .filter(|_| !entity.component.alarms.is_empty());
        [own, alarm]
            .into_iter()
            .flatten()
            .all(|expr| FilterEvaluator::new(expr).matches(entity))
    }
}
