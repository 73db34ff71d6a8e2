//! Materialized calendar entities.
//!
//! These are the values returned by an [`EntityStore`](crate::store::EntityStore)
//! and evaluated by the post-filter path. Only what filtering needs is
//! modelled: the component kind, its properties with their parameters, and
//! its VALARM sub-components.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::property::{ParamId, PropertyId};
use crate::time_range::{parse_duration, CalendarTime};

/// Name of the calendar container component.
pub const VCALENDAR: &str = "VCALENDAR";

/// The kind of a calendar component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Event,
    Todo,
    Journal,
    FreeBusy,
    Alarm,
}

impl EntityKind {
    /// Maps an iCalendar component name (case-insensitive) to its kind.
    pub fn from_component_name(name: &str) -> Option<Self> {
        [
            EntityKind::Event,
            EntityKind::Todo,
            EntityKind::Journal,
            EntityKind::FreeBusy,
            EntityKind::Alarm,
        ]
        .into_iter()
        .find(|kind| kind.component_name().eq_ignore_ascii_case(name))
    }

    pub fn component_name(self) -> &'static str {
        match self {
            EntityKind::Event => "VEVENT",
            EntityKind::Todo => "VTODO",
            EntityKind::Journal => "VJOURNAL",
            EntityKind::FreeBusy => "VFREEBUSY",
            EntityKind::Alarm => "VALARM",
        }
    }

    /// Returns true for kinds that may appear directly inside VCALENDAR.
    pub fn is_top_level(self) -> bool {
        !matches!(self, EntityKind::Alarm)
    }
}

/// A property parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: ParamId,
    pub value: String,
}

/// One instance of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub value: String,
    #[serde(default)]
    pub params: Vec<Parameter>,
}

impl Property {
    pub fn new(id: PropertyId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter, builder style.
    pub fn with_param(mut self, id: ParamId, value: impl Into<String>) -> Self {
        self.params.push(Parameter {
            id,
            value: value.into(),
        });
        self
    }

    pub fn param(&self, id: ParamId) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.value.as_str())
    }
}

/// A calendar component with its properties and alarms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub kind: EntityKind,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub alarms: Vec<Component>,
}

impl Component {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            properties: Vec::new(),
            alarms: Vec::new(),
        }
    }

    /// Adds a property, builder style.
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds a VALARM sub-component, builder style.
    pub fn with_alarm(mut self, alarm: Component) -> Self {
        self.alarms.push(alarm);
        self
    }

    /// All instances of a property.
    pub fn properties(&self, id: PropertyId) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(move |p| p.id == id)
    }

    /// The first instance of a property.
    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties(id).next()
    }

    pub fn has_property(&self, id: PropertyId) -> bool {
        if id == PropertyId::Valarm {
            return !self.alarms.is_empty();
        }
        self.property(id).is_some()
    }

    fn time_of(&self, id: PropertyId) -> Option<CalendarTime> {
        self.property(id).and_then(|p| CalendarTime::parse(&p.value))
    }

    fn duration(&self) -> Option<Duration> {
        self.property(PropertyId::Duration)
            .and_then(|p| parse_duration(&p.value))
    }

    /// The time span the component occupies, as `(start, end)`.
    ///
    /// Returns `None` when the component has no timing information. An end of
    /// `None` means the component is an instant.
    pub fn span(&self) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>)> {
        let start = self.time_of(PropertyId::Dtstart);
        match self.kind {
            EntityKind::Event => {
                let start = start?;
                let end = self
                    .time_of(PropertyId::Dtend)
                    .map(|e| e.instant())
                    .or_else(|| {
                        self.duration()
                            .and_then(|d| start.instant().checked_add_signed(d))
                    })
                    .or_else(|| start.is_date().then(|| start.instant() + Duration::days(1)));
                Some((start.instant(), end))
            }
            EntityKind::Todo => {
                let due = self.time_of(PropertyId::Due).map(|d| d.instant());
                match (start, due) {
                    (Some(s), Some(d)) => Some((s.instant(), Some(d))),
                    (Some(s), None) => {
                        let end = self
                            .duration()
                            .and_then(|d| s.instant().checked_add_signed(d));
                        Some((s.instant(), end))
                    }
                    (None, Some(d)) => Some((d, None)),
                    (None, None) => None,
                }
            }
            EntityKind::Journal | EntityKind::FreeBusy => {
                let start = start?;
                let end = start
                    .is_date()
                    .then(|| start.instant() + Duration::days(1))
                    .or_else(|| self.time_of(PropertyId::Dtend).map(|e| e.instant()));
                Some((start.instant(), end))
            }
            EntityKind::Alarm => None,
        }
    }

    /// The instant an alarm fires, resolved against its owning component.
    ///
    /// Absolute triggers are used as-is; relative triggers are offset from
    /// the owner's start, or from its end/due when `RELATED=END`.
    pub fn trigger_instant(&self, owner: &Component) -> Option<DateTime<Utc>> {
        let trigger = self.property(PropertyId::Trigger)?;

        if let Some(absolute) = CalendarTime::parse(&trigger.value) {
            return Some(absolute.instant());
        }

        let offset = parse_duration(&trigger.value)?;
        let related_end = trigger
            .param(ParamId::Related)
            .is_some_and(|r| r.eq_ignore_ascii_case("END"));
        let anchor = if related_end {
            owner
                .time_of(PropertyId::Dtend)
                .or_else(|| owner.time_of(PropertyId::Due))?
                .instant()
        } else {
            owner.time_of(PropertyId::Dtstart)?.instant()
        };
        anchor.checked_add_signed(offset)
    }
}

/// A stored calendar object resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Resource path of the entity.
    pub href: String,
    /// Collection the entity lives in.
    pub collection: String,
    /// Top-level container name, normally `VCALENDAR`.
    #[serde(default = "default_container")]
    pub container: String,
    /// The main component of the resource.
    pub component: Component,
}

fn default_container() -> String {
    VCALENDAR.to_string()
}

impl Entity {
    pub fn new(
        href: impl Into<String>,
        collection: impl Into<String>,
        component: Component,
    ) -> Self {
        Self {
            href: href.into(),
            collection: collection.into(),
            container: default_container(),
            component,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.component.kind
    }
}
