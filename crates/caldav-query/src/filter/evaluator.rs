//! Filter evaluation against materialized entities.
//!
//! This module provides the [`FilterEvaluator`], used by the post-filter
//! path (and by stores that keep entities in memory) to test compiled
//! predicates against entity data.
//!
//! # Example
//!
//! ```
//! use caldav_query::entity::{Component, Entity, EntityKind, Property};
//! use caldav_query::filter::{FilterEvaluator, FilterExpr};
//! use caldav_query::property::PropertyId;
//!
//! let filter = FilterExpr::PropertyTextMatch {
//!     property: PropertyId::Summary,
//!     value: "meeting".to_string(),
//!     caseless: true,
//!     negate: false,
//! };
//!
//! let entity = Entity::new(
//!     "/cal/1.ics",
//!     "/cal/",
//!     Component::new(EntityKind::Event)
//!         .with_property(Property::new(PropertyId::Summary, "MEETING ROOM")),
//! );
//!
//! let evaluator = FilterEvaluator::new(&filter);
//! assert!(evaluator.matches(&entity));
//! ```

use chrono::Duration;

use super::ast::FilterExpr;
use crate::entity::{Component, Entity, EntityKind};
use crate::property::{ParamId, PropertyId};
use crate::time_range::{CalendarTime, TimeRange};

/// Evaluates a compiled filter against entities.
///
/// The evaluator only borrows the predicate, so one tree can back any number
/// of evaluators on different threads.
#[derive(Debug, Clone, Copy)]
pub struct FilterEvaluator<'a> {
    filter: &'a FilterExpr,
}

impl<'a> FilterEvaluator<'a> {
    /// Creates a new filter evaluator.
    pub fn new(filter: &'a FilterExpr) -> Self {
        Self { filter }
    }

    /// Returns true if the entity matches the filter.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.matches_component(&entity.component)
    }

    /// Returns true if the component matches the filter.
    pub fn matches_component(&self, component: &Component) -> bool {
        self.evaluate(self.filter, component, None)
    }

    /// Returns true if some alarm of the component matches the filter.
    pub fn matches_any_alarm(&self, component: &Component) -> bool {
        component
            .alarms
            .iter()
            .any(|alarm| self.evaluate(self.filter, alarm, Some(component)))
    }

    /// Filters a slice of entities, returning only those that match.
    pub fn filter_entities<'b>(&self, entities: &'b [Entity]) -> Vec<&'b Entity> {
        entities.iter().filter(|e| self.matches(e)).collect()
    }

    /// Evaluates an expression against a component. `owner` is set while
    /// evaluating inside one of the owner's alarms.
    fn evaluate(
        &self,
        filter: &FilterExpr,
        component: &Component,
        owner: Option<&Component>,
    ) -> bool {
        match filter {
            // Composition
            FilterExpr::And(children) => children
                .iter()
                .all(|child| self.evaluate(child, component, owner)),
            FilterExpr::Or(children) => children
                .iter()
                .any(|child| self.evaluate(child, component, owner)),
            FilterExpr::Not(inner) => !self.evaluate(inner, component, owner),

            // Component level
            FilterExpr::EntityType(kind) => component.kind == *kind,
            FilterExpr::EntityTimeRange(range) => self.overlaps_range(component, range),
            FilterExpr::WithinAlarm(inner) => component
                .alarms
                .iter()
                .any(|alarm| self.evaluate(inner, alarm, Some(component))),
            FilterExpr::AlarmTriggerRange(range) => owner
                .and_then(|owner| component.trigger_instant(owner))
                .is_some_and(|instant| range.contains(instant)),

            // Property level
            FilterExpr::PropertyPresence {
                property,
                must_exist,
            } => component.has_property(*property) == *must_exist,
            FilterExpr::PropertyTimeRange { property, range } => {
                self.property_in_range(component, *property, range)
            }
            FilterExpr::PropertyTextMatch {
                property,
                value,
                caseless,
                negate,
            } => self.property_text_matches(component, *property, value, *caseless, *negate),

            // Parameter level
            FilterExpr::ParamPresence {
                property,
                param,
                must_exist,
            } => self.param_present(component, *property, *param, *must_exist),
            FilterExpr::ParamTextMatch {
                property,
                param,
                value,
                caseless,
                negate,
            } => self.param_text_matches(component, *property, *param, value, *caseless, *negate),
        }
    }

    /// Checks the component's own span against the range.
    ///
    /// A to-do without any date information matches every range.
    fn overlaps_range(&self, component: &Component, range: &TimeRange) -> bool {
        match component.span() {
            Some((start, end)) => range.overlaps(start, end),
            None => component.kind == EntityKind::Todo,
        }
    }

    /// Checks whether some value of the property lies in the range.
    fn property_in_range(
        &self,
        component: &Component,
        property: PropertyId,
        range: &TimeRange,
    ) -> bool {
        if property == PropertyId::Valarm {
            return component.alarms.iter().any(|alarm| {
                alarm
                    .trigger_instant(component)
                    .is_some_and(|instant| range.contains(instant))
            });
        }

        component
            .properties(property)
            .flat_map(|p| p.value.split(','))
            .filter_map(CalendarTime::parse)
            .any(|time| match time {
                CalendarTime::Date(day) => range.overlaps(day, Some(day + Duration::days(1))),
                CalendarTime::DateTime(instant) => range.contains(instant),
            })
    }

    /// Substring match on any instance of the property.
    ///
    /// An absent property never matches, negated or not.
    fn property_text_matches(
        &self,
        component: &Component,
        property: PropertyId,
        needle: &str,
        caseless: bool,
        negate: bool,
    ) -> bool {
        let mut values = component.properties(property).map(|p| p.value.as_str()).peekable();
        if values.peek().is_none() {
            return false;
        }
        let found = values.any(|value| text_contains(value, needle, caseless));
        found != negate
    }

    /// Checks parameter presence on any instance of the property.
    fn param_present(
        &self,
        component: &Component,
        property: PropertyId,
        param: ParamId,
        must_exist: bool,
    ) -> bool {
        component
            .properties(property)
            .any(|p| p.param(param).is_some() == must_exist)
    }

    /// Substring match on the parameter of any instance of the property.
    fn param_text_matches(
        &self,
        component: &Component,
        property: PropertyId,
        param: ParamId,
        needle: &str,
        caseless: bool,
        negate: bool,
    ) -> bool {
        let mut values = component
            .properties(property)
            .filter_map(|p| p.param(param))
            .peekable();
        if values.peek().is_none() {
            return false;
        }
        let found = values.any(|value| text_contains(value, needle, caseless));
        found != negate
    }
}

/// Substring test; caseless comparison folds ASCII letters on both sides.
fn text_contains(haystack: &str, needle: &str, caseless: bool) -> bool {
    if caseless {
        haystack
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
    } else {
        haystack.contains(needle)
    }
}
