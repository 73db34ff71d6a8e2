//! Predicate tree produced by filter compilation.

use serde::Serialize;

use crate::entity::EntityKind;
use crate::property::{ParamId, PropertyId};
use crate::time_range::TimeRange;

/// A compiled filter predicate.
///
/// `FilterExpr` is both the value pushed down to the entity store and the
/// predicate evaluated by the post-filter path. Trees are built once during
/// compilation and are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpr {
    // ==================== Composition ====================
    /// True iff every child is true (an empty list is true).
    And(Vec<FilterExpr>),

    /// True iff some child is true (an empty list is false).
    Or(Vec<FilterExpr>),

    /// Inverts the wrapped predicate (`is-not-defined`).
    Not(Box<FilterExpr>),

    // ==================== Component Level ====================
    /// Matches entities of the given kind.
    EntityType(EntityKind),

    /// Matches entities whose span overlaps the range.
    EntityTimeRange(TimeRange),

    /// Matches entities with at least one VALARM satisfying the predicate.
    WithinAlarm(Box<FilterExpr>),

    /// Matches an alarm whose trigger fires within the range. Only true
    /// inside `WithinAlarm`, where relative triggers can be resolved
    /// against the owning component.
    AlarmTriggerRange(TimeRange),

    // ==================== Property Level ====================
    /// Matches on whether the property is present.
    PropertyPresence {
        property: PropertyId,
        must_exist: bool,
    },

    /// Matches if some instance of the property lies in the range.
    PropertyTimeRange {
        property: PropertyId,
        range: TimeRange,
    },

    /// Substring match on the property value.
    PropertyTextMatch {
        property: PropertyId,
        value: String,
        caseless: bool,
        negate: bool,
    },

    // ==================== Parameter Level ====================
    /// Matches on whether the parameter is present on the property.
    ParamPresence {
        property: PropertyId,
        param: ParamId,
        must_exist: bool,
    },

    /// Substring match on the parameter value.
    ParamTextMatch {
        property: PropertyId,
        param: ParamId,
        value: String,
        caseless: bool,
        negate: bool,
    },
}

impl FilterExpr {
    /// Combines two predicates with AND.
    ///
    /// Nested `And` nodes are flattened so that repeated merging produces a
    /// single n-ary node.
    ///
    /// # Example
    ///
    /// ```
    /// use caldav_query::entity::EntityKind;
    /// use caldav_query::filter::FilterExpr;
    ///
    /// let a = FilterExpr::EntityType(EntityKind::Event);
    /// let b = FilterExpr::EntityType(EntityKind::Todo);
    /// let c = FilterExpr::EntityType(EntityKind::Journal);
    /// let expr = FilterExpr::and(FilterExpr::and(a, b), c);
    /// assert!(matches!(expr, FilterExpr::And(ref children) if children.len() == 3));
    /// ```
    pub fn and(left: FilterExpr, right: FilterExpr) -> Self {
        let mut children = Vec::new();
        for expr in [left, right] {
            match expr {
                FilterExpr::And(inner) => children.extend(inner),
                other => children.push(other),
            }
        }
        FilterExpr::And(children)
    }

    /// Combines two predicates with OR, flattening nested `Or` nodes.
    pub fn or(left: FilterExpr, right: FilterExpr) -> Self {
        let mut children = Vec::new();
        for expr in [left, right] {
            match expr {
                FilterExpr::Or(inner) => children.extend(inner),
                other => children.push(other),
            }
        }
        FilterExpr::Or(children)
    }

    /// Negates a predicate. Negating a `Not` unwraps it.
    pub fn negate(inner: FilterExpr) -> Self {
        match inner {
            FilterExpr::Not(inner) => *inner,
            other => FilterExpr::Not(Box::new(other)),
        }
    }

    /// Combines a list of predicates with AND, or OR when `all` is false.
    ///
    /// Returns `None` for an empty list and the predicate itself for a
    /// single-element list.
    pub fn combine(mut exprs: Vec<FilterExpr>, all: bool) -> Option<Self> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ if all => Some(FilterExpr::And(exprs)),
            _ => Some(FilterExpr::Or(exprs)),
        }
    }

    /// ANDs an optional predicate onto another optional predicate.
    pub fn and_optional(left: Option<FilterExpr>, right: Option<FilterExpr>) -> Option<Self> {
        match (left, right) {
            (Some(l), Some(r)) => Some(FilterExpr::and(l, r)),
            (l, None) => l,
            (None, r) => r,
        }
    }

    /// Returns true if the predicate is a `Not` node.
    pub fn is_negated(&self) -> bool {
        matches!(self, FilterExpr::Not(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> FilterExpr {
        FilterExpr::EntityType(EntityKind::Event)
    }

    fn summary() -> FilterExpr {
        FilterExpr::PropertyPresence {
            property: PropertyId::Summary,
            must_exist: true,
        }
    }

    #[test]
    fn test_and_flattens() {
        let expr = FilterExpr::and(FilterExpr::and(event(), summary()), summary());
        assert_eq!(expr, FilterExpr::And(vec![event(), summary(), summary()]));
    }

    #[test]
    fn test_or_does_not_flatten_and() {
        let expr = FilterExpr::or(FilterExpr::and(event(), summary()), summary());
        assert_eq!(
            expr,
            FilterExpr::Or(vec![FilterExpr::And(vec![event(), summary()]), summary()])
        );
    }

    #[test]
    fn test_double_negation_round_trips() {
        let negated = FilterExpr::negate(summary());
        assert!(negated.is_negated());
        assert_eq!(FilterExpr::negate(negated), summary());
    }

    #[test]
    fn test_combine_sizes() {
        assert_eq!(FilterExpr::combine(vec![], true), None);
        assert_eq!(FilterExpr::combine(vec![event()], false), Some(event()));
        assert_eq!(
            FilterExpr::combine(vec![event(), summary()], true),
            Some(FilterExpr::And(vec![event(), summary()]))
        );
        assert_eq!(
            FilterExpr::combine(vec![event(), summary()], false),
            Some(FilterExpr::Or(vec![event(), summary()]))
        );
    }

    #[test]
    fn test_and_optional() {
        assert_eq!(FilterExpr::and_optional(None, None), None);
        assert_eq!(FilterExpr::and_optional(Some(event()), None), Some(event()));
        assert_eq!(FilterExpr::and_optional(None, Some(event())), Some(event()));
        assert_eq!(
            FilterExpr::and_optional(Some(event()), Some(summary())),
            Some(FilterExpr::And(vec![event(), summary()]))
        );
    }
}
