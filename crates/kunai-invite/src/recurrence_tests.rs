use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use kunai_rfc::rfc::ical::core::ComponentKind;

use super::*;
use crate::temporal::RecurRange;

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|d| d.and_hms_opt(h, 0, 0))
        .expect("valid date-time")
}

fn paris(d: u32) -> CalDateTime {
    CalDateTime::zoned(at(2024, 6, d, 10), "Europe/Paris")
}

fn daily_series() -> RecurrenceTree {
    RecurrenceTree::with_rule(paris(1), Some(Duration::hours(1)), RRule::daily().with_count(5))
}

#[test_log::test]
fn expansion_honors_exdates_and_cancellations() {
    let mut tree = daily_series().with_exclusions(vec![paris(3)]);
    tree.cancel_instance(RecurId::new(paris(4)));
    tree.add.push(RuleEntry::add_dates(vec![paris(10)]));

    let registry = TimeZoneRegistry::default();
    let occurrences = tree
        .expand(
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
            &registry,
            100,
        )
        .expect("expand");
    tracing::debug!(?occurrences, "Expanded series");

    let starts: Vec<CalDateTime> = occurrences.iter().map(|o| o.start.clone()).collect();
    assert_eq!(starts, vec![paris(1), paris(2), paris(5), paris(10)]);
    assert_eq!(
        occurrences[0].instant,
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    );
}

#[test]
fn expansion_respects_range_and_cap() {
    let tree = RecurrenceTree::with_rule(paris(1), None, RRule::daily());
    let registry = TimeZoneRegistry::default();
    let occurrences = tree
        .expand(
            Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap(),
            &registry,
            3,
        )
        .expect("expand");
    let starts: Vec<CalDateTime> = occurrences.into_iter().map(|o| o.start).collect();
    assert_eq!(starts, vec![paris(10), paris(11), paris(12)]);
}

#[test_log::test]
fn legacy_exclude_rule_removes_instances_but_is_not_written() {
    let mut tree = RecurrenceTree::with_rule(
        CalDateTime::floating(at(2024, 6, 3, 9)),
        None,
        RRule::daily().with_count(7),
    );
    tree.sub.push(RuleEntry::Repeating(
        RRule::daily().with_interval(2).with_count(3),
    ));
    let registry = TimeZoneRegistry::default();
    let occurrences = tree
        .expand(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap(),
            &registry,
            100,
        )
        .expect("expand");
    let days: Vec<NaiveDateTime> = occurrences.iter().map(|o| o.start.local()).collect();
    assert_eq!(
        days,
        vec![at(2024, 6, 4, 9), at(2024, 6, 6, 9), at(2024, 6, 8, 9), at(2024, 6, 9, 9)]
    );

    assert!(tree.to_properties(true).iter().all(|p| p.name != "EXRULE"));
    let decoded = RecurrenceTree::decode_metadata(&tree.encode_metadata()).expect("decode");
    assert!(decoded.sub.is_empty());
}

#[test_log::test]
fn add_dates_on_the_exclusion_side_are_ignored() {
    let mut tree = daily_series().with_exclusions(vec![paris(2)]);
    tree.sub.push(RuleEntry::add_dates(vec![paris(4)]));
    assert_eq!(tree.excluded_instances(), vec![paris(2)]);
}

#[test]
fn same_rules_compares_add_side_semantically() {
    let a = daily_series();
    let mut b = daily_series().with_exclusions(vec![paris(2)]);
    assert!(a.same_rules(&b));

    b.add = vec![RuleEntry::Repeating(RRule::daily().with_count(6))];
    assert!(!a.same_rules(&b));

    let with_dates = |dates| {
        let mut tree = daily_series();
        tree.add.push(RuleEntry::add_dates(dates));
        tree
    };
    assert!(with_dates(vec![paris(8), paris(9)]).same_rules(&with_dates(vec![paris(9), paris(8)])));
}

#[test]
fn same_rules_matches_entries_one_to_one() {
    let with_rules = |rules: Vec<RRule>| {
        let mut tree = daily_series();
        tree.add = rules.into_iter().map(RuleEntry::Repeating).collect();
        tree
    };
    let twice_daily = with_rules(vec![RRule::daily(), RRule::daily()]);
    let daily_weekly = with_rules(vec![RRule::daily(), RRule::weekly()]);
    assert!(!twice_daily.same_rules(&daily_weekly));
    assert!(!daily_weekly.same_rules(&twice_daily));

    let weekly_daily = with_rules(vec![RRule::weekly(), RRule::daily()]);
    assert!(daily_weekly.same_rules(&weekly_daily));
    assert!(weekly_daily.same_rules(&daily_weekly));
}

#[test]
fn metadata_round_trip_keeps_rules_and_overrides() {
    let mut tree = daily_series().with_exclusions(vec![paris(3)]);
    tree.add.push(RuleEntry::add_dates(vec![CalDateTime::date(
        NaiveDate::from_ymd_opt(2024, 7, 1).expect("date"),
    )]));
    tree.cancel_instance(RecurId::new(paris(4)));
    tree.overrides.push(Override {
        recur_id: RecurId::with_range(paris(5), RecurRange::ThisAndFuture),
        canceled: false,
    });

    let meta = tree.encode_metadata();
    assert_eq!(meta.get_long("t"), Some(4));
    assert_eq!(meta.get_str("dur"), Some("PT1H"));
    assert_eq!(meta.get_map("add").and_then(|m| m.get_long("nr")), Some(2));
    assert!(meta.get_map("ca0").is_some());
    assert!(meta.get_map("ex1").is_some());

    let json = meta.to_json().expect("json");
    let back = RecurrenceTree::decode_metadata(&Metadata::from_json(&json).expect("parse"))
        .expect("decode");
    assert_eq!(back, tree);
}

#[test]
fn single_instance_rules_decode_as_add_dates() {
    let mut single = Metadata::new();
    single.put("t", 5_i64);
    single.put("dts", "Europe/Paris:20240607T100000");
    let mut add = Metadata::new();
    add.put("nr", 1_i64);
    add.put("r0", single);
    let mut meta = Metadata::new();
    meta.put("t", 4_i64);
    meta.put("dts", "Europe/Paris:20240601T100000");
    meta.put("duration", "PT30M");
    meta.put("add", add);

    let tree = RecurrenceTree::decode_metadata(&meta).expect("decode");
    assert_eq!(tree.duration, Some(Duration::minutes(30)));
    assert_eq!(tree.add, vec![RuleEntry::add_dates(vec![paris(7)])]);
}

#[test]
fn unknown_rule_type_is_structural() {
    let mut bad = Metadata::new();
    bad.put("t", 9_i64);
    let mut add = Metadata::new();
    add.put("nr", 1_i64);
    add.put("r0", bad);
    let mut meta = Metadata::new();
    meta.put("dts", "20240601T100000Z");
    meta.put("add", add);
    assert!(matches!(
        RecurrenceTree::decode_metadata(&meta),
        Err(InviteError::StructuralViolation(_))
    ));
}

#[test]
fn component_properties_build_a_tree() {
    let tree = daily_series().with_exclusions(vec![paris(3)]);
    let mut comp = Component::new(ComponentKind::Event);
    for property in tree.to_properties(true) {
        comp.add_property(property);
    }
    assert_eq!(comp.get_properties("RRULE").len(), 1);
    assert_eq!(comp.get_properties("EXDATE").len(), 1);

    let back = RecurrenceTree::from_component(&comp, &paris(1), Some(Duration::hours(1)))
        .expect("recurring");
    assert_eq!(back, tree);
    assert!(
        RecurrenceTree::from_component(&Component::new(ComponentKind::Event), &paris(1), None)
            .is_none()
    );
}

#[test]
fn referenced_zones_cover_dates_and_overrides() {
    let mut tree = daily_series().with_exclusions(vec![CalDateTime::zoned(
        at(2024, 6, 3, 4),
        "America/New_York",
    )]);
    tree.cancel_instance(RecurId::new(CalDateTime::zoned(at(2024, 6, 4, 17), "Asia/Tokyo")));
    let ids: Vec<String> = tree.referenced_tzids().into_iter().collect();
    assert_eq!(ids, vec!["America/New_York", "Asia/Tokyo", "Europe/Paris"]);
}
