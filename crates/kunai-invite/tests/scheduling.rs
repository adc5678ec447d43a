//! End-to-end checks of the invite engine: ingest, sanitize, persistence,
//! output and change detection.

use chrono::{NaiveDate, NaiveDateTime};
use kunai_invite::account::{Account, Identity};
use kunai_invite::change::{ChangeFlags, InviteChanges, OrganizerInviteChanges};
use kunai_invite::invite::{
    ComposeOptions, Invite, ItemRef, ItemType, Method, SanitizeMode, compose_calendar,
    invites_from_calendar,
};
use kunai_invite::matcher::{ParticipantMatcher, matching_attendee};
use kunai_invite::metadata::Metadata;
use kunai_invite::participant::{Attendee, Organizer, PartStat, Role};
use kunai_invite::recurrence::RecurrenceTree;
use kunai_invite::settings::EngineSettings;
use kunai_invite::temporal::CalDateTime;
use kunai_rfc::rfc::ical::build::serialize;
use kunai_rfc::rfc::ical::core::{Duration, ICalendar, RRule};
use kunai_rfc::rfc::ical::parse::{ComponentBuilder, ContentHandler};

fn at(d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, d)
        .and_then(|d| d.and_hms_opt(h, mi, s))
        .expect("valid date-time")
}

fn ny(d: u32, h: u32) -> CalDateTime {
    CalDateTime::zoned(at(d, h, 0, 0), "America/New_York")
}

/// Replays `NAME;PARAM=VALUE:value` lines as grammar events.
fn replay(lines: &[&str]) -> ICalendar {
    let mut builder = ComponentBuilder::new();
    for line in lines {
        let (head, value) = line.split_once(':').expect("content line");
        match head {
            "BEGIN" => builder.start_component(value).expect("begin"),
            "END" => builder.end_component(value).expect("end"),
            _ => {
                let mut parts = head.split(';');
                builder
                    .start_property(parts.next().expect("name"))
                    .expect("property");
                for param in parts {
                    let (name, v) = param.split_once('=').expect("parameter");
                    builder.parameter(name, v).expect("parameter");
                }
                builder.property_value(value).expect("value");
                builder.end_property().expect("end property");
            }
        }
    }
    builder.finish_calendar().expect("calendar")
}

fn meeting() -> Invite {
    let mut inv = Invite::with_uid(ItemType::Event, "u1");
    inv.method = Method::Request;
    inv.sequence = 1;
    inv.name = "Standup".into();
    inv.location = "Room1".into();
    inv.organizer = Some(Organizer::new("mailto:boss@example.com"));
    inv.attendees = vec![
        Attendee::new("mailto:alice@example.com"),
        Attendee::new("mailto:bob@example.com"),
    ];
    inv.start = Some(ny(1, 9));
    inv.end = Some(ny(1, 10));
    inv
}

fn with_daily_rule(mut inv: Invite, exclusions: Vec<CalDateTime>) -> Invite {
    let start = inv.start.clone().expect("start");
    let tree = RecurrenceTree::with_rule(start, None, RRule::daily().with_count(10));
    let tree = if exclusions.is_empty() {
        tree
    } else {
        tree.with_exclusions(exclusions)
    };
    inv.set_recurrence(Some(tree));
    inv
}

#[test_log::test]
fn lenient_sanitize_never_leaves_end_before_start() {
    let cases: Vec<(Option<CalDateTime>, Option<CalDateTime>)> = vec![
        (Some(ny(1, 9)), Some(ny(1, 8))),
        (Some(ny(1, 9)), Some(ny(1, 9))),
        (Some(ny(2, 9)), Some(CalDateTime::utc(at(1, 23, 0, 0)))),
        (
            Some(CalDateTime::date(NaiveDate::from_ymd_opt(2024, 6, 5).expect("date"))),
            Some(CalDateTime::date(NaiveDate::from_ymd_opt(2024, 6, 1).expect("date"))),
        ),
        (Some(CalDateTime::floating(at(1, 9, 0, 0))), Some(CalDateTime::floating(at(1, 8, 0, 0)))),
        (None, Some(ny(1, 8))),
        (Some(ny(1, 9)), None),
    ];
    for (start, end) in cases {
        let mut inv = meeting();
        inv.start.clone_from(&start);
        inv.end.clone_from(&end);
        inv.sanitize(SanitizeMode::Lenient).expect("lenient never fails");
        tracing::debug!(start = ?inv.start, end = ?inv.end, "Sanitized");
        if let (Some(s), Some(e)) = (&inv.start, &inv.end) {
            let s = inv.tz_map.to_utc(s).expect("start instant");
            let e = inv.tz_map.to_utc(e).expect("end instant");
            assert!(e > s, "end {e} not after start {s}");
        }
    }
}

#[test]
fn effective_end_adds_the_minimum_duration() {
    let mut all_day = Invite::with_uid(ItemType::Event, "d1");
    let day = NaiveDate::from_ymd_opt(2024, 6, 1).expect("date");
    all_day.start = Some(CalDateTime::date(day));
    all_day.sanitize(SanitizeMode::Lenient).expect("sanitize");
    assert_eq!(
        all_day.effective_end_time(),
        Some(CalDateTime::date(day.succ_opt().expect("next day")))
    );

    let mut timed = Invite::with_uid(ItemType::Event, "t1");
    timed.start = Some(ny(1, 9));
    timed.sanitize(SanitizeMode::Lenient).expect("sanitize");
    assert_eq!(
        timed.effective_end_time(),
        Some(CalDateTime::zoned(at(1, 9, 0, 1), "America/New_York"))
    );
}

#[test_log::test]
fn ingested_invite_in_custom_zone() {
    let ical = replay(&[
        "BEGIN:VCALENDAR",
        "VERSION:2.0",
        "PRODID:-//Example//EN",
        "METHOD:REQUEST",
        "BEGIN:VTIMEZONE",
        "TZID:X",
        "BEGIN:STANDARD",
        "DTSTART:19700101T000000",
        "TZOFFSETFROM:+0300",
        "TZOFFSETTO:+0300",
        "END:STANDARD",
        "END:VTIMEZONE",
        "BEGIN:VEVENT",
        "UID:u1",
        "SEQUENCE:1",
        "DTSTAMP:20240501T120000Z",
        "DTSTART;TZID=X:20240601T100000",
        "SUMMARY:Review",
        "END:VEVENT",
        "END:VCALENDAR",
    ]);
    let settings = EngineSettings::default();
    let invites =
        invites_from_calendar(&ical, &settings, None, SanitizeMode::Lenient).expect("ingest");
    assert_eq!(invites.len(), 1);
    let inv = &invites[0];
    assert_eq!(inv.uid, "u1");
    assert_eq!(inv.sequence, 1);
    assert_eq!(inv.method, Method::Request);
    assert!(inv.tz_map.contains("X"));
    assert_eq!(
        inv.effective_end_time(),
        Some(CalDateTime::zoned(at(1, 10, 0, 1), "X"))
    );

    let out = compose_calendar(&invites, Method::Request, &ComposeOptions::default());
    let text = serialize(&out);
    tracing::debug!(%text, "Composed");
    assert!(text.contains("BEGIN:VTIMEZONE"));
    assert!(text.contains("TZID:X"));
    assert!(text.contains("DTSTART;TZID=X:20240601T100000"));
}

#[test_log::test]
fn attendees_without_organizer_by_mode() {
    let lines = [
        "BEGIN:VCALENDAR",
        "VERSION:2.0",
        "PRODID:-//Example//EN",
        "METHOD:REQUEST",
        "BEGIN:VEVENT",
        "UID:u2",
        "DTSTART:20240601T100000Z",
        "ATTENDEE:mailto:alice@example.com",
        "END:VEVENT",
        "END:VCALENDAR",
    ];
    let ical = replay(&lines);
    let settings = EngineSettings::default();
    assert!(invites_from_calendar(&ical, &settings, None, SanitizeMode::Strict).is_err());
    let invites =
        invites_from_calendar(&ical, &settings, None, SanitizeMode::Lenient).expect("lenient");
    assert!(invites[0].attendees.is_empty());
}

#[test_log::test]
fn persisted_form_round_trips() {
    let settings = EngineSettings::default();
    let mut bare = Invite::with_uid(ItemType::Event, "bare");
    bare.sanitize(SanitizeMode::Lenient).expect("sanitize");

    let mut full = with_daily_rule(meeting(), vec![ny(3, 9)]);
    full.attendees[0].role = Some(Role::Chair);
    full.attendees[1].part_stat = Some(PartStat::Tentative);
    full.priority = Some(1);
    full.categories = vec!["Work".into(), "Daily".into()];
    full.comments = vec!["bring notes".into()];
    full.url = Some("https://example.com/standup".into());
    full.set_description(Some("Agenda".into()), Some("<p>Agenda</p>".into()));
    full.sanitize(SanitizeMode::Lenient).expect("sanitize");

    let mut task = Invite::with_uid(ItemType::Task, "t1");
    task.end = Some(ny(4, 17));
    task.percent_complete = Some(40);
    task.sanitize(SanitizeMode::Lenient).expect("sanitize");

    for inv in [bare, full, task] {
        let first = inv.encode_metadata(&settings);
        let json = first.to_json().expect("json");
        let decoded = Invite::decode_metadata(
            &Metadata::from_json(&json).expect("parse"),
            ItemRef::default(),
            &settings,
            None,
        )
        .expect("decode");
        assert_eq!(decoded.uid, inv.uid);
        assert_eq!(decoded.sequence, inv.sequence);
        assert_eq!(decoded.attendees, inv.attendees);
        assert_eq!(decoded.start, inv.start);
        assert_eq!(decoded.end, inv.end);
        match (inv.recurrence(), decoded.recurrence()) {
            (Some(a), Some(b)) => assert!(a.same_rules(b)),
            (None, None) => {}
            _ => panic!("recurrence lost for {}", inv.uid),
        }
        assert_eq!(decoded.encode_metadata(&settings), first, "re-encode of {}", inv.uid);
    }
}

#[test]
fn reply_invalidation_tracks_the_significant_fields() {
    let base = with_daily_rule(meeting(), Vec::new());
    let significant: Vec<(&str, Box<dyn Fn(&mut Invite)>)> = vec![
        ("name", Box::new(|i: &mut Invite| i.name = "Retro".into())),
        ("location", Box::new(|i: &mut Invite| i.location = "Room9".into())),
        ("start", Box::new(|i: &mut Invite| i.start = Some(ny(1, 8)))),
        ("end", Box::new(|i: &mut Invite| i.end = Some(ny(1, 11)))),
        (
            "duration",
            Box::new(|i: &mut Invite| {
                i.end = None;
                i.duration = Some(Duration::minutes(30));
            }),
        ),
        (
            "rule",
            Box::new(|i: &mut Invite| {
                let start = i.start.clone().expect("start");
                i.set_recurrence(Some(RecurrenceTree::with_rule(start, None, RRule::weekly())));
            }),
        ),
    ];
    for (field, mutate) in &significant {
        let mut changed = base.clone();
        mutate(&mut changed);
        assert!(
            InviteChanges::diff(&base, &changed).is_reply_invalidating_change(),
            "{field} should invalidate replies"
        );
    }

    let mut cosmetic = base.clone();
    cosmetic.priority = Some(1);
    cosmetic.categories.push("Misc".into());
    cosmetic.sequence += 1;
    cosmetic.start = Some(CalDateTime::utc(at(1, 13, 0, 0)));
    cosmetic.end = None;
    cosmetic.duration = Some(Duration::hours(1));
    assert!(!InviteChanges::diff(&base, &cosmetic).is_reply_invalidating_change());
}

#[test]
fn location_only_change() {
    let a = meeting();
    let mut b = meeting();
    b.location = "Room2".into();
    let changes = InviteChanges::diff(&a, &b);
    assert_eq!(changes.flags(), ChangeFlags::LOCATION);
    assert!(changes.is_reply_invalidating_change());
    assert!(!changes.is_exception_removing_change());
}

#[test]
fn removed_exclusion_is_reported_on_the_old_side() {
    let old = with_daily_rule(meeting(), vec![ny(3, 9)]);
    let new = with_daily_rule(meeting(), Vec::new());
    let changes = OrganizerInviteChanges::diff(Some(&old), Some(&new));
    assert_eq!(changes.excluded_only_in_old, vec![ny(3, 9)]);
    assert!(changes.excluded_only_in_new.is_empty());
    assert!(changes.changed);
}

#[test]
fn attendee_swap_is_reported_both_ways() {
    let mut old = meeting();
    old.attendees = vec![Attendee::new("alice@example.com"), Attendee::new("bob@example.com")];
    let mut new = meeting();
    new.attendees = vec![Attendee::new("alice@example.com"), Attendee::new("carol@example.com")];

    let changes = OrganizerInviteChanges::diff(Some(&old), Some(&new));
    assert_eq!(changes.attendees_only_in_new, vec![Attendee::new("carol@example.com")]);
    assert_eq!(changes.attendees_only_in_old, vec![Attendee::new("bob@example.com")]);
}

#[test]
fn identity_address_is_preferred() {
    let account = Account::new("acct", "alice@example.com")
        .with_alias("ali@example.com")
        .with_identity(Identity::new("team", "team-alice@example.com"));
    let mut inv = meeting();
    inv.attendees = vec![
        Attendee::new("mailto:ali@example.com"),
        Attendee::new("mailto:alice@example.com"),
        Attendee::new("mailto:TEAM-ALICE@example.com"),
    ];
    let found = matching_attendee(&inv, &account, Some("team")).expect("attendee");
    assert_eq!(found.address(), "TEAM-ALICE@example.com");
}

#[test_log::test]
fn reply_changes_participation_status_only() {
    let directory = vec![Account::new("acct", "alice@example.com")];
    let matcher = ParticipantMatcher::new(&directory);
    let mut inv = meeting();
    inv.attendees[0].role = Some(Role::Optional);
    inv.attendees[0].rsvp = Some(true);

    let mut reply = meeting();
    reply.method = Method::Reply;
    reply.attendees = vec![
        Attendee::new("mailto:alice@example.com")
            .with_part_stat(PartStat::Declined)
            .with_role(Role::Chair)
            .with_rsvp(false),
        Attendee::new("mailto:erin@example.com").with_part_stat(PartStat::Accepted),
    ];

    assert!(matcher.apply_reply(&mut inv, &reply));
    let alice = &inv.attendees[0];
    assert_eq!(alice.part_stat, Some(PartStat::Declined));
    assert_eq!(alice.role, Some(Role::Optional));
    assert_eq!(alice.rsvp, Some(true));
    assert!(inv.attendees.iter().any(|a| a.address() == "erin@example.com"));
}

#[test_log::test]
fn canceled_exceptions_fold_into_exdates() {
    let series = with_daily_rule(meeting(), Vec::new());
    let mut canceled = series.make_instance_invite(&ny(4, 9)).expect("instance");
    canceled.method = Method::Cancel;
    let invites = vec![series, canceled];

    let options = ComposeOptions {
        convert_canceled_instances_to_exdates: true,
        ..ComposeOptions::default()
    };
    let folded = compose_calendar(&invites, Method::Request, &options);
    let text = serialize(&folded);
    tracing::debug!(%text, "Folded");
    assert_eq!(folded.schedulable().len(), 1);
    assert!(text.contains("EXDATE;TZID=America/New_York:20240604T090000"));

    let separate = compose_calendar(&invites, Method::Request, &ComposeOptions::default());
    assert_eq!(separate.schedulable().len(), 2);
}
