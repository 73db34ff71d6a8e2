//! Tests for filter evaluation.

use super::*;
use crate::entity::{Component, Entity, EntityKind, Property};
use crate::property::{ParamId, PropertyId, StandardPropertyIndex};
use crate::time_range::TimeRange;

// ==================== Test Helpers ====================

fn make_event(summary: &str, start: &str, end: &str) -> Entity {
    Entity::new(
        format!("/calendars/user/work/{summary}.ics"),
        "/calendars/user/work/",
        Component::new(EntityKind::Event)
            .with_property(Property::new(PropertyId::Summary, summary))
            .with_property(Property::new(PropertyId::Dtstart, start))
            .with_property(Property::new(PropertyId::Dtend, end)),
    )
}

fn make_todo(summary: &str) -> Entity {
    Entity::new(
        format!("/calendars/user/tasks/{summary}.ics"),
        "/calendars/user/tasks/",
        Component::new(EntityKind::Todo).with_property(Property::new(PropertyId::Summary, summary)),
    )
}

fn with_component(entity: Entity, component: Component) -> Entity {
    Entity { component, ..entity }
}

fn text_match(property: PropertyId, value: &str, caseless: bool, negate: bool) -> FilterExpr {
    FilterExpr::PropertyTextMatch {
        property,
        value: value.to_string(),
        caseless,
        negate,
    }
}

fn range(start: &str, end: &str) -> TimeRange {
    TimeRange::parse(Some(start), Some(end)).unwrap()
}

fn matches(filter: &FilterExpr, entity: &Entity) -> bool {
    FilterEvaluator::new(filter).matches(entity)
}

// ==================== Composition Tests ====================

#[test]
fn test_empty_and_is_true() {
    let event = make_event("standup", "20040902T090000Z", "20040902T091500Z");
    assert!(matches(&FilterExpr::And(vec![]), &event));
}

#[test]
fn test_empty_or_is_false() {
    let event = make_event("standup", "20040902T090000Z", "20040902T091500Z");
    assert!(!matches(&FilterExpr::Or(vec![]), &event));
}

#[test]
fn test_and_or_not() {
    let event = make_event("standup", "20040902T090000Z", "20040902T091500Z");
    let is_event = FilterExpr::EntityType(EntityKind::Event);
    let is_todo = FilterExpr::EntityType(EntityKind::Todo);

    assert!(matches(
        &FilterExpr::and(is_event.clone(), FilterExpr::negate(is_todo.clone())),
        &event
    ));
    assert!(!matches(&FilterExpr::and(is_event.clone(), is_todo.clone()), &event));
    assert!(matches(&FilterExpr::or(is_todo.clone(), is_event.clone()), &event));
    assert!(!matches(&FilterExpr::negate(is_event), &event));
}

#[test]
fn test_double_negation_matches_original() {
    let with_summary = make_todo("call bob");
    let without_summary = Entity::new("/t/2.ics", "/t/", Component::new(EntityKind::Todo));

    for must_exist in [true, false] {
        let presence = FilterExpr::PropertyPresence {
            property: PropertyId::Summary,
            must_exist,
        };
        let negated = FilterExpr::negate(presence.clone());
        let twice = FilterExpr::negate(negated.clone());

        for entity in [&with_summary, &without_summary] {
            assert_eq!(matches(&negated, entity), !matches(&presence, entity));
            assert_eq!(matches(&twice, entity), matches(&presence, entity));
        }
    }
}

// ==================== Entity Type Tests ====================

#[test]
fn test_entity_type() {
    let todo = make_todo("file taxes");
    assert!(matches(&FilterExpr::EntityType(EntityKind::Todo), &todo));
    assert!(!matches(&FilterExpr::EntityType(EntityKind::Event), &todo));
}

// ==================== Entity Time Range Tests ====================

#[test]
fn test_entity_time_range_overlap() {
    let filter = FilterExpr::EntityTimeRange(range("20040902T000000Z", "20040903T000000Z"));
    let inside = make_event("review", "20040902T140000Z", "20040902T150000Z");
    assert!(matches(&filter, &inside));
}

#[test]
fn test_entity_time_range_uses_expanded_bounds() {
    let filter = FilterExpr::EntityTimeRange(range("20040902T000000Z", "20040903T000000Z"));

    // Within one day before the start
    let before = make_event("early", "20040901T060000Z", "20040901T070000Z");
    assert!(matches(&filter, &before));

    // Within one day after the end
    let after = make_event("late", "20040903T200000Z", "20040903T210000Z");
    assert!(matches(&filter, &after));

    // More than a day away
    let far = make_event("far", "20040905T100000Z", "20040905T110000Z");
    assert!(!matches(&filter, &far));
}

#[test]
fn test_entity_time_range_all_day_event() {
    let filter = FilterExpr::EntityTimeRange(range("20040910T000000Z", "20040911T000000Z"));
    let event = Entity::new(
        "/c/holiday.ics",
        "/c/",
        Component::new(EntityKind::Event)
            .with_property(Property::new(PropertyId::Dtstart, "20040908")),
    );
    // All-day on the 8th ends at the 9th, which touches the padded start
    assert!(!matches(&filter, &event));

    let closer = Entity::new(
        "/c/holiday2.ics",
        "/c/",
        Component::new(EntityKind::Event)
            .with_property(Property::new(PropertyId::Dtstart, "20040909")),
    );
    assert!(matches(&filter, &closer));
}

#[test]
fn test_undated_todo_matches_any_range() {
    let filter = FilterExpr::EntityTimeRange(range("20040902T000000Z", "20040903T000000Z"));
    assert!(matches(&filter, &make_todo("someday")));
}

#[test]
fn test_untimed_event_never_matches_range() {
    let filter = FilterExpr::EntityTimeRange(range("20040902T000000Z", "20040903T000000Z"));
    let event = Entity::new(
        "/c/x.ics",
        "/c/",
        Component::new(EntityKind::Event).with_property(Property::new(PropertyId::Summary, "x")),
    );
    assert!(!matches(&filter, &event));
}

// ==================== Property Tests ====================

#[test]
fn test_property_presence() {
    let event = make_event("standup", "20040902T090000Z", "20040902T091500Z");
    let has_summary = FilterExpr::PropertyPresence {
        property: PropertyId::Summary,
        must_exist: true,
    };
    let no_location = FilterExpr::PropertyPresence {
        property: PropertyId::Location,
        must_exist: false,
    };
    assert!(matches(&has_summary, &event));
    assert!(matches(&no_location, &event));
}

#[test]
fn test_text_match_caseless_substring() {
    let filter = text_match(PropertyId::Summary, "Meeting", true, false);
    let room = make_event("MEETING ROOM", "20040902T090000Z", "20040902T100000Z");
    let lunch = make_event("Lunch", "20040902T120000Z", "20040902T130000Z");
    assert!(matches(&filter, &room));
    assert!(!matches(&filter, &lunch));
}

#[test]
fn test_text_match_negated() {
    let filter = text_match(PropertyId::Summary, "Meeting", true, true);
    let meetings = make_event("No meetings here", "20040902T090000Z", "20040902T100000Z");
    let lunch = make_event("Lunch", "20040902T120000Z", "20040902T130000Z");
    assert!(!matches(&filter, &meetings));
    assert!(matches(&filter, &lunch));
}

#[test]
fn test_text_match_case_sensitive() {
    let filter = text_match(PropertyId::Summary, "Meeting", false, false);
    let upper = make_event("MEETING ROOM", "20040902T090000Z", "20040902T100000Z");
    let exact = make_event("Team Meeting", "20040902T090000Z", "20040902T100000Z");
    assert!(!matches(&filter, &upper));
    assert!(matches(&filter, &exact));
}

#[test]
fn test_text_match_absent_property_never_matches() {
    let event = make_event("standup", "20040902T090000Z", "20040902T091500Z");
    assert!(!matches(&text_match(PropertyId::Location, "room", true, false), &event));
    assert!(!matches(&text_match(PropertyId::Location, "room", true, true), &event));
}

#[test]
fn test_text_match_multiple_instances() {
    let todo = make_todo("groceries");
    let component = todo
        .component
        .clone()
        .with_property(Property::new(PropertyId::Categories, "HOME"))
        .with_property(Property::new(PropertyId::Categories, "ERRANDS"));
    let todo = with_component(todo, component);

    assert!(matches(&text_match(PropertyId::Categories, "errand", true, false), &todo));
    assert!(!matches(&text_match(PropertyId::Categories, "home", true, true), &todo));
    assert!(matches(&text_match(PropertyId::Categories, "work", true, true), &todo));
}

#[test]
fn test_property_time_range() {
    let todo = make_todo("ship release");
    let component = todo
        .component
        .clone()
        .with_property(Property::new(PropertyId::Completed, "20040905T101500Z"));
    let todo = with_component(todo, component);

    let hit = FilterExpr::PropertyTimeRange {
        property: PropertyId::Completed,
        range: range("20040905T000000Z", "20040906T000000Z"),
    };
    let miss = FilterExpr::PropertyTimeRange {
        property: PropertyId::Completed,
        range: range("20041001T000000Z", "20041002T000000Z"),
    };
    assert!(matches(&hit, &todo));
    assert!(!matches(&miss, &todo));
}

#[test]
fn test_property_time_range_multi_valued_dates() {
    let event = make_event("recurring", "20040902T090000Z", "20040902T100000Z");
    let component = event
        .component
        .clone()
        .with_property(Property::new(PropertyId::Exdate, "20040909T090000Z,20040916T090000Z"));
    let event = with_component(event, component);

    let filter = FilterExpr::PropertyTimeRange {
        property: PropertyId::Exdate,
        range: range("20040916T000000Z", "20040917T000000Z"),
    };
    assert!(matches(&filter, &event));
}

// ==================== Parameter Tests ====================

fn make_meeting() -> Entity {
    let event = make_event("planning", "20040902T090000Z", "20040902T100000Z");
    let component = event
        .component
        .clone()
        .with_property(
            Property::new(PropertyId::Attendee, "mailto:lisa@example.com")
                .with_param(ParamId::Partstat, "NEEDS-ACTION")
                .with_param(ParamId::Cn, "Lisa Dusseault"),
        )
        .with_property(
            Property::new(PropertyId::Attendee, "mailto:bernard@example.net")
                .with_param(ParamId::Partstat, "ACCEPTED"),
        );
    with_component(event, component)
}

#[test]
fn test_param_presence() {
    let meeting = make_meeting();
    let has_cn = FilterExpr::ParamPresence {
        property: PropertyId::Attendee,
        param: ParamId::Cn,
        must_exist: true,
    };
    let some_without_cn = FilterExpr::ParamPresence {
        property: PropertyId::Attendee,
        param: ParamId::Cn,
        must_exist: false,
    };
    let role = FilterExpr::ParamPresence {
        property: PropertyId::Attendee,
        param: ParamId::Role,
        must_exist: true,
    };
    assert!(matches(&has_cn, &meeting));
    assert!(matches(&some_without_cn, &meeting));
    assert!(!matches(&role, &meeting));
}

#[test]
fn test_param_presence_requires_property() {
    let todo = make_todo("no attendees");
    let missing = FilterExpr::ParamPresence {
        property: PropertyId::Attendee,
        param: ParamId::Cn,
        must_exist: false,
    };
    assert!(!matches(&missing, &todo));
}

#[test]
fn test_param_text_match() {
    let meeting = make_meeting();
    let needs_action = FilterExpr::ParamTextMatch {
        property: PropertyId::Attendee,
        param: ParamId::Partstat,
        value: "needs-action".to_string(),
        caseless: true,
        negate: false,
    };
    let declined = FilterExpr::ParamTextMatch {
        property: PropertyId::Attendee,
        param: ParamId::Partstat,
        value: "DECLINED".to_string(),
        caseless: false,
        negate: false,
    };
    let not_declined = FilterExpr::ParamTextMatch {
        property: PropertyId::Attendee,
        param: ParamId::Partstat,
        value: "DECLINED".to_string(),
        caseless: false,
        negate: true,
    };
    assert!(matches(&needs_action, &meeting));
    assert!(!matches(&declined, &meeting));
    assert!(matches(&not_declined, &meeting));
}

// ==================== Alarm Tests ====================

fn make_alarmed_event() -> Entity {
    let event = make_event("flight", "20040902T100000Z", "20040902T120000Z");
    let alarm = Component::new(EntityKind::Alarm)
        .with_property(Property::new(PropertyId::Trigger, "-PT2H"))
        .with_property(Property::new(PropertyId::Action, "DISPLAY"))
        .with_property(Property::new(PropertyId::Description, "Leave for airport"));
    let component = event.component.clone().with_alarm(alarm);
    with_component(event, component)
}

#[test]
fn test_alarm_presence() {
    let present = FilterExpr::PropertyPresence {
        property: PropertyId::Valarm,
        must_exist: true,
    };
    assert!(matches(&present, &make_alarmed_event()));
    assert!(!matches(
        &present,
        &make_event("quiet", "20040902T100000Z", "20040902T110000Z")
    ));
}

#[test]
fn test_alarm_trigger_time_range() {
    let event = make_alarmed_event();
    // Trigger fires at 08:00 on the 2nd
    let hit = FilterExpr::PropertyTimeRange {
        property: PropertyId::Valarm,
        range: range("20040902T073000Z", "20040902T083000Z"),
    };
    let miss = FilterExpr::PropertyTimeRange {
        property: PropertyId::Valarm,
        range: range("20040906T000000Z", "20040907T000000Z"),
    };
    assert!(matches(&hit, &event));
    assert!(!matches(&miss, &event));
}

#[test]
fn test_alarm_trigger_range_is_alarm_scoped() {
    let event = make_alarmed_event();
    let trigger = FilterExpr::AlarmTriggerRange(range("20040902T073000Z", "20040902T083000Z"));

    // Outside an alarm there is no owner to resolve the trigger against
    assert!(!matches(&trigger, &event));
    assert!(matches(
        &FilterExpr::WithinAlarm(Box::new(trigger.clone())),
        &event
    ));
    assert!(FilterEvaluator::new(&trigger).matches_any_alarm(&event.component));
}

#[test]
fn test_within_alarm_binds_conditions_to_one_alarm() {
    let event = make_alarmed_event();
    let late = Component::new(EntityKind::Alarm)
        .with_property(Property::new(PropertyId::Trigger, "20300101T000000Z"))
        .with_property(Property::new(PropertyId::Description, "Renew passport"));
    let component = event.component.clone().with_alarm(late);
    let event = with_component(event, component);

    // First alarm fires in range, second one mentions the passport
    let split = FilterExpr::WithinAlarm(Box::new(FilterExpr::And(vec![
        FilterExpr::AlarmTriggerRange(range("20040902T073000Z", "20040902T083000Z")),
        text_match(PropertyId::Description, "passport", true, false),
    ])));
    assert!(!matches(&split, &event));

    let same = FilterExpr::WithinAlarm(Box::new(FilterExpr::And(vec![
        FilterExpr::AlarmTriggerRange(range("20040902T073000Z", "20040902T083000Z")),
        text_match(PropertyId::Description, "airport", true, false),
    ])));
    assert!(matches(&same, &event));
}

#[test]
fn test_within_alarm_scope() {
    let event = make_alarmed_event();
    let airport = FilterExpr::WithinAlarm(Box::new(text_match(
        PropertyId::Description,
        "airport",
        true,
        false,
    )));
    let summary_in_alarm = FilterExpr::WithinAlarm(Box::new(FilterExpr::PropertyPresence {
        property: PropertyId::Summary,
        must_exist: true,
    }));
    assert!(matches(&airport, &event));
    // SUMMARY belongs to the event, not its alarm
    assert!(!matches(&summary_in_alarm, &event));

    let action = text_match(PropertyId::Action, "DISPLAY", false, false);
    assert!(FilterEvaluator::new(&action).matches_any_alarm(&event.component));
    assert!(!FilterEvaluator::new(&action).matches_component(&event.component));
}

// ==================== Slice Filtering Tests ====================

#[test]
fn test_filter_entities() {
    let entities = vec![
        make_event("standup", "20040902T090000Z", "20040902T091500Z"),
        make_todo("write report"),
        make_event("retro", "20040910T090000Z", "20040910T100000Z"),
    ];
    let filter = FilterExpr::and(
        FilterExpr::EntityType(EntityKind::Event),
        FilterExpr::EntityTimeRange(range("20040902T000000Z", "20040903T000000Z")),
    );

    let results = FilterEvaluator::new(&filter).filter_entities(&entities);
    assert_eq!(results.len(), 1);
    assert!(results[0].href.ends_with("standup.ics"));
}

// ==================== Compile Then Evaluate ====================

#[test]
fn test_compiled_event_time_range_scenario() {
    let filter = CompFilter::new("VCALENDAR").with_comp_filter(
        CompFilter::new("VEVENT")
            .with_time_range(Some("20040902T000000Z"), Some("20040903T000000Z")),
    );
    let query = FilterCompiler::new(&StandardPropertyIndex).compile(&filter).unwrap();
    assert!(!query.post_filter_required);

    let root = query.root.expect("predicate");
    let overlapping = make_event("edge", "20040901T230000Z", "20040902T003000Z");
    let todo = make_todo("undated");
    assert!(matches(&root, &overlapping));
    assert!(!matches(&root, &todo));
}

#[test]
fn test_compiled_text_match_scenario() {
    let filter = CompFilter::new("VCALENDAR").with_comp_filter(
        CompFilter::new("VEVENT").with_prop_filter(
            PropFilter::new("SUMMARY")
                .with_text_match(TextMatch::new("Meeting").with_collation(COLLATION_ASCII_CASEMAP)),
        ),
    );
    let root = FilterCompiler::new(&StandardPropertyIndex)
        .compile(&filter)
        .unwrap()
        .root
        .unwrap();
    assert!(matches(
        &root,
        &make_event("MEETING ROOM", "20040902T090000Z", "20040902T100000Z")
    ));

    let negated = CompFilter::new("VCALENDAR").with_comp_filter(
        CompFilter::new("VEVENT").with_prop_filter(
            PropFilter::new("SUMMARY").with_text_match(TextMatch::new("Meeting").negated()),
        ),
    );
    let root = FilterCompiler::new(&StandardPropertyIndex)
        .compile(&negated)
        .unwrap()
        .root
        .unwrap();
    assert!(!matches(
        &root,
        &make_event("No meetings here", "20040902T090000Z", "20040902T100000Z")
    ));
}
