//! Recursive compiler from filter descriptions to [`FilterExpr`] trees.
//!
//! Compilation walks the comp-filter tree with a depth counter:
//!
//! ```text
//! depth 0  VCALENDAR             container, no type predicate
//! depth 1  VEVENT | VTODO | ...  EntityType(kind)
//! depth 2  VALARM                WithinAlarm(trigger range, prop-filters)
//! depth 3+                       FilterTooDeep
//! ```
//!
//! Prop-filters whose property (or one of whose parameters) the entity store
//! cannot evaluate are not pushed down. Each node then compiles to two
//! predicates: the complete one, and a weaker one built from the pushable
//! parts that every matching entity still satisfies. The weaker predicate
//! goes to the store and the complete one is checked on what comes back.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::ast::FilterExpr;
use super::descr::{CompFilter, ParamFilter, PropFilter, Test, TimeRangeDescr};
use super::error::{FilterError, FilterResult};
use crate::config::PostFilterMode;
use crate::entity::{EntityKind, VCALENDAR};
use crate::property::{PropertyId, PropertyIndex};
use crate::time_range::TimeRange;

/// Deepest comp-filter level the calendar grammar allows.
const MAX_DEPTH: usize = 2;

/// Prop-filters of one comp-filter that the entity store cannot evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredGroup {
    /// The `test` attribute of the owning comp-filter.
    pub test: Test,
    pub filters: Vec<PropFilter>,
}

/// The result of compiling one filter description.
///
/// Created per request and consumed once by the query coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventQuery {
    /// Predicate pushed down to the entity store; `None` matches everything.
    pub root: Option<FilterExpr>,

    /// True if `deferred` holds anything.
    pub post_filter_required: bool,

    /// The complete predicate, set when `root` only approximates it.
    ///
    /// Candidates returned for `root` are re-checked against it. Legacy
    /// mode leaves it unset and recombines `deferred` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual: Option<FilterExpr>,

    /// Prop-filters left out of `root`, by the kind of component they
    /// apply to.
    pub deferred: BTreeMap<EntityKind, Vec<DeferredGroup>>,

    /// Every entity kind named by a comp-filter.
    pub kinds: BTreeSet<EntityKind>,

    /// How deferred filters were split off and must be recombined.
    pub mode: PostFilterMode,
}

impl EventQuery {
    pub fn new(mode: PostFilterMode) -> Self {
        Self {
            root: None,
            post_filter_required: false,
            residual: None,
            deferred: BTreeMap::new(),
            kinds: BTreeSet::new(),
            mode,
        }
    }

    /// Queues prop-filters for post-filtering.
    pub fn defer(&mut self, kind: EntityKind, test: Test, filters: Vec<PropFilter>) {
        if filters.is_empty() {
            return;
        }
        self.deferred
            .entry(kind)
            .or_default()
            .push(DeferredGroup { test, filters });
        self.post_filter_required = true;
    }

    /// The deferred groups for a kind (empty if none).
    pub fn deferred_for(&self, kind: EntityKind) -> &[DeferredGroup] {
        self.deferred.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns true if the query selects every entity.
    pub fn is_match_all(&self) -> bool {
        self.root.is_none() && !self.post_filter_required
    }
}

/// A compiled prop-filter and whether the store can evaluate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPropFilter {
    pub expr: FilterExpr,
    pub pushable: bool,
}

/// A compiled comp-filter or prop-filter group.
///
/// `pushed` is implied by `full`, and `exact` is set when the two are
/// equivalent. `None` matches everything in both.
#[derive(Debug, Clone)]
struct Fragment {
    full: Option<FilterExpr>,
    pushed: Option<FilterExpr>,
    exact: bool,
}

impl Fragment {
    fn all() -> Self {
        Self {
            full: None,
            pushed: None,
            exact: true,
        }
    }

    fn exact(expr: FilterExpr) -> Self {
        Self {
            full: Some(expr.clone()),
            pushed: Some(expr),
            exact: true,
        }
    }

    fn all_of(parts: Vec<Fragment>) -> Self {
        let exact = parts.iter().all(|p| p.exact);
        let (full, pushed): (Vec<_>, Vec<_>) =
            parts.into_iter().map(|p| (p.full, p.pushed)).unzip();
        Self {
            full: conjunction(full),
            pushed: conjunction(pushed),
            exact,
        }
    }

    /// A member matching everything makes the disjunction match everything.
    fn any_of(parts: Vec<Fragment>) -> Self {
        if parts.is_empty() {
            return Self::all();
        }
        let exact = parts.iter().all(|p| p.exact);
        let (full, pushed): (Vec<_>, Vec<_>) =
            parts.into_iter().map(|p| (p.full, p.pushed)).unzip();
        let full: Option<Vec<_>> = full.into_iter().collect();
        let pushed: Option<Vec<_>> = pushed.into_iter().collect();
        Self {
            full: full.and_then(|f| FilterExpr::combine(f, false)),
            pushed: pushed.and_then(|p| FilterExpr::combine(p, false)),
            exact,
        }
    }

    fn combine(parts: Vec<Fragment>, all: bool) -> Self {
        if all {
            Self::all_of(parts)
        } else {
            Self::any_of(parts)
        }
    }

    /// The negation of an approximation says nothing, so only exact
    /// fragments keep a pushed predicate.
    fn negate(self) -> Self {
        let full = self.full.map(FilterExpr::negate);
        if self.exact {
            Self {
                full,
                pushed: self.pushed.map(FilterExpr::negate),
                exact: true,
            }
        } else {
            Self {
                full,
                pushed: None,
                exact: false,
            }
        }
    }

    /// Scopes the fragment to a single alarm of the entity.
    fn within_alarm(self) -> Self {
        let wrap = |expr: Option<FilterExpr>| match expr {
            Some(expr) => FilterExpr::WithinAlarm(Box::new(expr)),
            None => any_alarm(),
        };
        Self {
            full: Some(wrap(self.full)),
            pushed: Some(wrap(self.pushed)),
            exact: self.exact,
        }
    }
}

/// ANDs the present predicates together, flattening nested `And` nodes.
fn conjunction(exprs: Vec<Option<FilterExpr>>) -> Option<FilterExpr> {
    exprs
        .into_iter()
        .fold(None, |acc, expr| FilterExpr::and_optional(acc, expr))
}

fn any_alarm() -> FilterExpr {
    FilterExpr::PropertyPresence {
        property: PropertyId::Valarm,
        must_exist: true,
    }
}

/// Compiles filter descriptions against a property index.
///
/// The compiler holds no per-request state and can be shared.
///
/// # Example
///
/// ```
/// use caldav_query::filter::{CompFilter, FilterCompiler, FilterExpr};
/// use caldav_query::entity::EntityKind;
/// use caldav_query::property::StandardPropertyIndex;
///
/// let index = StandardPropertyIndex::new();
/// let compiler = FilterCompiler::new(&index);
///
/// let filter = CompFilter::new("VCALENDAR").with_comp_filter(CompFilter::new("VTODO"));
/// let query = compiler.compile(&filter).unwrap();
/// assert_eq!(query.root, Some(FilterExpr::EntityType(EntityKind::Todo)));
/// assert!(!query.post_filter_required);
/// ```
pub struct FilterCompiler<'a> {
    index: &'a dyn PropertyIndex,
    mode: PostFilterMode,
    floating_tz: Option<&'a str>,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(index: &'a dyn PropertyIndex) -> Self {
        Self {
            index,
            mode: PostFilterMode::default(),
            floating_tz: None,
        }
    }

    pub fn with_mode(mut self, mode: PostFilterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Timezone attached to every compiled [`TimeRange`] for resolving
    /// floating times.
    pub fn with_floating_tz(mut self, tzid: Option<&'a str>) -> Self {
        self.floating_tz = tzid;
        self
    }

    /// Compiles a top-level (VCALENDAR) comp-filter.
    ///
    /// `root` receives the predicate the entity store can evaluate. When
    /// some prop-filters cannot be pushed down, `root` is a relaxation of the
    /// filter and `residual` holds the complete predicate for post-filtering.
    ///
    /// # Errors
    ///
    /// Returns the first `FilterError` found; nothing is compiled partially.
    pub fn compile(&self, filter: &CompFilter) -> FilterResult<EventQuery> {
        let mut query = EventQuery::new(self.mode);
        let fragment = self.compile_comp_filter(filter, &mut query, 0)?;
        query.root = fragment.pushed;
        if !fragment.exact {
            query.residual = fragment.full;
        }
        debug!(
            root = ?query.root,
            post_filter = query.post_filter_required,
            "compiled calendar filter"
        );
        Ok(query)
    }

    /// Compiles one comp-filter at the given depth.
    fn compile_comp_filter(
        &self,
        node: &CompFilter,
        query: &mut EventQuery,
        depth: usize,
    ) -> FilterResult<Fragment> {
        if depth > MAX_DEPTH {
            return Err(FilterError::FilterTooDeep { depth });
        }
        trace!(depth, name = %node.name, "compiling comp-filter");

        let fragment = match depth {
            0 => self.compile_calendar(node, query)?,
            1 => self.compile_component(node, query)?,
            _ => self.compile_alarm(node, query)?,
        };
        Ok(if node.is_not_defined {
            fragment.negate()
        } else {
            fragment
        })
    }

    fn compile_calendar(
        &self,
        node: &CompFilter,
        query: &mut EventQuery,
    ) -> FilterResult<Fragment> {
        if !node.name.eq_ignore_ascii_case(VCALENDAR) {
            return Err(FilterError::bad_filter(format!(
                "top-level comp-filter must be {VCALENDAR}, found {}",
                node.name
            )));
        }
        if node.is_not_defined {
            return Err(FilterError::bad_filter(
                "is-not-defined is not allowed on the top-level comp-filter",
            ));
        }
        if node.is_match_all() {
            return Ok(Fragment::all());
        }

        let mut parts = Vec::new();
        if let Some(range) = &node.time_range {
            let range = FilterExpr::EntityTimeRange(self.time_range(range)?);
            parts.push(Fragment::exact(range));
        }
        if !node.prop_filters.is_empty() {
            warn!(
                count = node.prop_filters.len(),
                "ignoring prop-filters on the {VCALENDAR} comp-filter"
            );
        }
        parts.push(self.compile_children(node, query, 0)?);
        Ok(Fragment::all_of(parts))
    }

    fn compile_component(
        &self,
        node: &CompFilter,
        query: &mut EventQuery,
    ) -> FilterResult<Fragment> {
        let kind = EntityKind::from_component_name(&node.name)
            .filter(|k| k.is_top_level())
            .ok_or_else(|| {
                FilterError::bad_filter(format!("unknown calendar component {}", node.name))
            })?;
        query.kinds.insert(kind);

        let base = Fragment::exact(FilterExpr::EntityType(kind));
        if node.is_match_all() {
            return Ok(base);
        }

        let mut parts = vec![base];
        if let Some(range) = &node.time_range {
            let range = FilterExpr::EntityTimeRange(self.time_range(range)?);
            parts.push(Fragment::exact(range));
        }
        parts.push(self.compile_prop_filters(&node.prop_filters, node.test, query, kind)?);
        parts.push(self.compile_children(node, query, 1)?);
        Ok(Fragment::all_of(parts))
    }

    /// Compiles a VALARM comp-filter.
    ///
    /// Its trigger range and prop-filters are all tested against the same
    /// alarm.
    fn compile_alarm(&self, node: &CompFilter, query: &mut EventQuery) -> FilterResult<Fragment> {
        self.index
            .resolve(&node.name)
            .filter(|p| *p == PropertyId::Valarm)
            .ok_or_else(|| {
                FilterError::bad_filter(format!("unsupported sub-component {}", node.name))
            })?;
        query.kinds.insert(EntityKind::Alarm);

        if node.is_match_all() {
            return Ok(Fragment::exact(any_alarm()));
        }

        let mut parts = Vec::new();
        if let Some(range) = &node.time_range {
            let range = FilterExpr::AlarmTriggerRange(self.time_range(range)?);
            parts.push(Fragment::exact(range));
        }
        parts.push(self.compile_prop_filters(
            &node.prop_filters,
            node.test,
            query,
            EntityKind::Alarm,
        )?);
        // Nothing nests below VALARM; this only reports the depth error.
        parts.push(self.compile_children(node, query, MAX_DEPTH)?);
        Ok(Fragment::all_of(parts).within_alarm())
    }

    fn compile_children(
        &self,
        node: &CompFilter,
        query: &mut EventQuery,
        depth: usize,
    ) -> FilterResult<Fragment> {
        let mut children = Vec::with_capacity(node.comp_filters.len());
        for child in &node.comp_filters {
            children.push(self.compile_comp_filter(child, query, depth + 1)?);
        }
        Ok(Fragment::combine(children, node.test.is_all_of()))
    }

    /// Compiles the prop-filters of one comp-filter.
    ///
    /// Filters the store can evaluate are pushed down. The rest are recorded
    /// on `query` under `kind`. Under `anyof` (when honoring the test
    /// attribute) nothing is pushed, since a pushed-down subset of a
    /// disjunction would drop matching entities.
    fn compile_prop_filters(
        &self,
        filters: &[PropFilter],
        test: Test,
        query: &mut EventQuery,
        kind: EntityKind,
    ) -> FilterResult<Fragment> {
        let all = test.is_all_of();
        let mut full = Vec::with_capacity(filters.len());
        let mut pushed = Vec::new();
        let mut deferred = Vec::new();

        for filter in filters {
            let compiled = self.compile_prop_filter(filter)?;
            if compiled.pushable {
                pushed.push(compiled.expr.clone());
            } else {
                debug!(property = %filter.name, ?kind, "deferring prop-filter to post-filter");
                deferred.push(filter.clone());
            }
            full.push(compiled.expr);
        }

        let full = FilterExpr::combine(full, all);
        if deferred.is_empty() {
            return Ok(Fragment {
                pushed: full.clone(),
                full,
                exact: true,
            });
        }

        let pushed = match (self.mode, test) {
            (PostFilterMode::HonorTest, Test::AnyOf) => {
                query.defer(kind, test, filters.to_vec());
                None
            }
            (PostFilterMode::HonorTest, Test::AllOf) => {
                query.defer(kind, test, deferred);
                FilterExpr::combine(pushed, true)
            }
            (PostFilterMode::LegacyAnyOf, _) => {
                query.defer(kind, Test::AnyOf, deferred);
                // Legacy splitting takes the pushed subset as the node's predicate.
                return Ok(Fragment {
                    full,
                    pushed: FilterExpr::combine(pushed, all),
                    exact: true,
                });
            }
        };
        Ok(Fragment {
            full,
            pushed,
            exact: false,
        })
    }

    /// Compiles a single prop-filter, regardless of whether it can be
    /// pushed down.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::UnknownProperty`/`UnknownParameter` for names
    /// the index does not know, and `FilterError::BadFilter` for ambiguous
    /// combinations.
    pub fn compile_prop_filter(&self, filter: &PropFilter) -> FilterResult<CompiledPropFilter> {
        let property = self
            .index
            .resolve(&filter.name)
            .ok_or_else(|| FilterError::unknown_property(&filter.name))?;

        let has_conditions = filter.time_range.is_some()
            || filter.text_match.is_some()
            || !filter.param_filters.is_empty();
        if filter.is_not_defined && has_conditions {
            return Err(FilterError::bad_filter(format!(
                "prop-filter {} combines is-not-defined with other conditions",
                filter.name
            )));
        }
        if filter.time_range.is_some() && filter.text_match.is_some() {
            return Err(FilterError::bad_filter(format!(
                "prop-filter {} has both time-range and text-match",
                filter.name
            )));
        }

        let own = if filter.is_not_defined {
            Some(FilterExpr::PropertyPresence {
                property,
                must_exist: false,
            })
        } else if !has_conditions {
            Some(FilterExpr::PropertyPresence {
                property,
                must_exist: true,
            })
        } else if let Some(range) = &filter.time_range {
            if !property.is_time_valued() {
                return Err(FilterError::bad_filter(format!(
                    "time-range on non date-time property {}",
                    filter.name
                )));
            }
            Some(FilterExpr::PropertyTimeRange {
                property,
                range: self.time_range(range)?,
            })
        } else if let Some(text) = &filter.text_match {
            Some(FilterExpr::PropertyTextMatch {
                property,
                value: text.value.clone(),
                caseless: text.caseless()?,
                negate: text.negate,
            })
        } else {
            None
        };

        let mut pushable = self.index.is_indexed(property);
        let params = self.compile_param_filters(property, filter, &mut pushable)?;

        let expr = FilterExpr::and_optional(own, params).ok_or_else(|| {
            FilterError::bad_filter(format!("prop-filter {} has no condition", filter.name))
        })?;

        Ok(CompiledPropFilter { expr, pushable })
    }

    fn compile_param_filters(
        &self,
        property: PropertyId,
        filter: &PropFilter,
        pushable: &mut bool,
    ) -> FilterResult<Option<FilterExpr>> {
        let mut exprs = Vec::with_capacity(filter.param_filters.len());
        for param_filter in &filter.param_filters {
            let (expr, indexed) = self.compile_param_filter(property, param_filter)?;
            *pushable &= indexed;
            exprs.push(expr);
        }
        Ok(FilterExpr::combine(exprs, filter.test.is_all_of()))
    }

    fn compile_param_filter(
        &self,
        property: PropertyId,
        filter: &ParamFilter,
    ) -> FilterResult<(FilterExpr, bool)> {
        let param = self
            .index
            .resolve_param(&filter.name)
            .ok_or_else(|| FilterError::unknown_parameter(&filter.name))?;

        let expr = match (&filter.text_match, filter.is_not_defined) {
            (Some(_), true) => {
                return Err(FilterError::bad_filter(format!(
                    "param-filter {} combines is-not-defined with text-match",
                    filter.name
                )));
            }
            (Some(text), false) => FilterExpr::ParamTextMatch {
                property,
                param,
                value: text.value.clone(),
                caseless: text.caseless()?,
                negate: text.negate,
            },
            (None, not_defined) => FilterExpr::ParamPresence {
                property,
                param,
                must_exist: !not_defined,
            },
        };

        Ok((expr, self.index.is_param_indexed(param)))
    }

    fn time_range(&self, descr: &TimeRangeDescr) -> FilterResult<TimeRange> {
        let range = TimeRange::parse(descr.start.as_deref(), descr.end.as_deref())?;
        Ok(match self.floating_tz {
            Some(tzid) => range.with_floating_tz(tzid),
            None => range,
        })
    }
}
