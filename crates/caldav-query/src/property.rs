//! Property and parameter name resolution.
//!
//! Filters name properties and parameters by their iCalendar names
//! (`SUMMARY`, `TZID`, ...). Before compilation every name is resolved to a
//! canonical identifier through a [`PropertyIndex`]; the index also tells the
//! compiler which fields the entity store can evaluate itself.

use serde::{Deserialize, Serialize};

/// Canonical identifier for an iCalendar property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum PropertyId {
    // ==================== Descriptive ====================
    Summary,
    Description,
    Location,
    Comment,
    Contact,
    Categories,
    Resources,
    Status,
    Class,
    Priority,
    Geo,
    PercentComplete,
    Attach,

    // ==================== Identification ====================
    Uid,
    Url,
    Sequence,
    RelatedTo,
    RequestStatus,

    // ==================== Date and Time ====================
    Dtstart,
    Dtend,
    Due,
    Duration,
    Dtstamp,
    Created,
    LastModified,
    Completed,
    RecurrenceId,
    Rrule,
    Rdate,
    Exdate,
    Freebusy,
    Transp,

    // ==================== Relationship ====================
    Organizer,
    Attendee,

    // ==================== Alarm ====================
    Trigger,
    Action,
    Repeat,

    /// The VALARM sub-component, addressed like a property by depth-2
    /// comp-filters.
    Valarm,
}

impl PropertyId {
    /// Every known property, in declaration order.
    pub const ALL: &'static [PropertyId] = &[
        PropertyId::Summary,
        PropertyId::Description,
        PropertyId::Location,
        PropertyId::Comment,
        PropertyId::Contact,
        PropertyId::Categories,
        PropertyId::Resources,
        PropertyId::Status,
        PropertyId::Class,
        PropertyId::Priority,
        PropertyId::Geo,
        PropertyId::PercentComplete,
        PropertyId::Attach,
        PropertyId::Uid,
        PropertyId::Url,
        PropertyId::Sequence,
        PropertyId::RelatedTo,
        PropertyId::RequestStatus,
        PropertyId::Dtstart,
        PropertyId::Dtend,
        PropertyId::Due,
        PropertyId::Duration,
        PropertyId::Dtstamp,
        PropertyId::Created,
        PropertyId::LastModified,
        PropertyId::Completed,
        PropertyId::RecurrenceId,
        PropertyId::Rrule,
        PropertyId::Rdate,
        PropertyId::Exdate,
        PropertyId::Freebusy,
        PropertyId::Transp,
        PropertyId::Organizer,
        PropertyId::Attendee,
        PropertyId::Trigger,
        PropertyId::Action,
        PropertyId::Repeat,
        PropertyId::Valarm,
    ];

    /// The iCalendar name of the property.
    pub fn name(self) -> &'static str {
        match self {
            PropertyId::Summary => "SUMMARY",
            PropertyId::Description => "DESCRIPTION",
            PropertyId::Location => "LOCATION",
            PropertyId::Comment => "COMMENT",
            PropertyId::Contact => "CONTACT",
            PropertyId::Categories => "CATEGORIES",
            PropertyId::Resources => "RESOURCES",
            PropertyId::Status => "STATUS",
            PropertyId::Class => "CLASS",
            PropertyId::Priority => "PRIORITY",
            PropertyId::Geo => "GEO",
            PropertyId::PercentComplete => "PERCENT-COMPLETE",
            PropertyId::Attach => "ATTACH",
            PropertyId::Uid => "UID",
            PropertyId::Url => "URL",
            PropertyId::Sequence => "SEQUENCE",
            PropertyId::RelatedTo => "RELATED-TO",
            PropertyId::RequestStatus => "REQUEST-STATUS",
            PropertyId::Dtstart => "DTSTART",
            PropertyId::Dtend => "DTEND",
            PropertyId::Due => "DUE",
            PropertyId::Duration => "DURATION",
            PropertyId::Dtstamp => "DTSTAMP",
            PropertyId::Created => "CREATED",
            PropertyId::LastModified => "LAST-MODIFIED",
            PropertyId::Completed => "COMPLETED",
            PropertyId::RecurrenceId => "RECURRENCE-ID",
            PropertyId::Rrule => "RRULE",
            PropertyId::Rdate => "RDATE",
            PropertyId::Exdate => "EXDATE",
            PropertyId::Freebusy => "FREEBUSY",
            PropertyId::Transp => "TRANSP",
            PropertyId::Organizer => "ORGANIZER",
            PropertyId::Attendee => "ATTENDEE",
            PropertyId::Trigger => "TRIGGER",
            PropertyId::Action => "ACTION",
            PropertyId::Repeat => "REPEAT",
            PropertyId::Valarm => "VALARM",
        }
    }

    /// Returns true if the property holds DATE or DATE-TIME values and can
    /// therefore be tested with a `time-range`.
    pub fn is_time_valued(self) -> bool {
        matches!(
            self,
            PropertyId::Dtstart
                | PropertyId::Dtend
                | PropertyId::Due
                | PropertyId::Dtstamp
                | PropertyId::Created
                | PropertyId::LastModified
                | PropertyId::Completed
                | PropertyId::RecurrenceId
                | PropertyId::Rdate
                | PropertyId::Exdate
                | PropertyId::Valarm
        )
    }
}

/// Canonical identifier for an iCalendar property parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum ParamId {
    Tzid,
    Partstat,
    Role,
    Cutype,
    Rsvp,
    Cn,
    Email,
    Value,
    Language,
    Altrep,
    Related,
    DelegatedFrom,
    DelegatedTo,
    Member,
    SentBy,
    Dir,
    Fmttype,
    Fbtype,
    Reltype,
    Range,
}

impl ParamId {
    /// Every known parameter, in declaration order.
    pub const ALL: &'static [ParamId] = &[
        ParamId::Tzid,
        ParamId::Partstat,
        ParamId::Role,
        ParamId::Cutype,
        ParamId::Rsvp,
        ParamId::Cn,
        ParamId::Email,
        ParamId::Value,
        ParamId::Language,
        ParamId::Altrep,
        ParamId::Related,
        ParamId::DelegatedFrom,
        ParamId::DelegatedTo,
        ParamId::Member,
        ParamId::SentBy,
        ParamId::Dir,
        ParamId::Fmttype,
        ParamId::Fbtype,
        ParamId::Reltype,
        ParamId::Range,
    ];

    /// The iCalendar name of the parameter.
    pub fn name(self) -> &'static str {
        match self {
            ParamId::Tzid => "TZID",
            ParamId::Partstat => "PARTSTAT",
            ParamId::Role => "ROLE",
            ParamId::Cutype => "CUTYPE",
            ParamId::Rsvp => "RSVP",
            ParamId::Cn => "CN",
            ParamId::Email => "EMAIL",
            ParamId::Value => "VALUE",
            ParamId::Language => "LANGUAGE",
            ParamId::Altrep => "ALTREP",
            ParamId::Related => "RELATED",
            ParamId::DelegatedFrom => "DELEGATED-FROM",
            ParamId::DelegatedTo => "DELEGATED-TO",
            ParamId::Member => "MEMBER",
            ParamId::SentBy => "SENT-BY",
            ParamId::Dir => "DIR",
            ParamId::Fmttype => "FMTTYPE",
            ParamId::Fbtype => "FBTYPE",
            ParamId::Reltype => "RELTYPE",
            ParamId::Range => "RANGE",
        }
    }
}

/// Name lookup service consumed by the filter compiler.
///
/// Implementations must be read-only after construction; a single index is
/// shared by every concurrent compilation.
pub trait PropertyIndex: Send + Sync {
    /// Resolves a property name, or `None` if the server does not support it.
    fn resolve(&self, name: &str) -> Option<PropertyId>;

    /// Resolves a parameter name, or `None` if the server does not support it.
    fn resolve_param(&self, name: &str) -> Option<ParamId>;

    /// Returns true if the entity store can evaluate filters on this property.
    fn is_indexed(&self, property: PropertyId) -> bool;

    /// Returns true if the entity store can evaluate filters on this parameter.
    fn is_param_indexed(&self, param: ParamId) -> bool;
}

/// The fixed property table shipped with the server.
///
/// Names are matched ASCII case-insensitively. Experimental (`X-`) and IANA
/// names outside the table are not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPropertyIndex;

impl StandardPropertyIndex {
    pub fn new() -> Self {
        Self
    }
}

impl PropertyIndex for StandardPropertyIndex {
    fn resolve(&self, name: &str) -> Option<PropertyId> {
        PropertyId::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    fn resolve_param(&self, name: &str) -> Option<ParamId> {
        ParamId::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    fn is_indexed(&self, property: PropertyId) -> bool {
        !matches!(
            property,
            PropertyId::Comment
                | PropertyId::Contact
                | PropertyId::Resources
                | PropertyId::Geo
                | PropertyId::PercentComplete
                | PropertyId::Attach
                | PropertyId::Sequence
                | PropertyId::RelatedTo
                | PropertyId::RequestStatus
                | PropertyId::Duration
                | PropertyId::Rrule
                | PropertyId::Rdate
                | PropertyId::Exdate
                | PropertyId::Freebusy
                | PropertyId::Trigger
                | PropertyId::Action
                | PropertyId::Repeat
        )
    }

    fn is_param_indexed(&self, param: ParamId) -> bool {
        matches!(
            param,
            ParamId::Tzid | ParamId::Partstat | ParamId::Role | ParamId::Cutype
        )
    }
}
