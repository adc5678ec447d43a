//! Differences between two versions of an invite.
//!
//! [`InviteChanges`] compares the fields attendees care about.
//! [`OrganizerInviteChanges`] additionally tolerates a missing side and
//! tracks attendee and excluded-instance set differences, since some clients
//! make significant edits without bumping SEQUENCE.

use std::fmt;

use crate::invite::Invite;
use crate::participant::Attendee;
use crate::temporal::CalDateTime;
use crate::tzmap::TimeZoneRegistry;

/// A set of changed invite aspects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChangeFlags(u8);

impl ChangeFlags {
    pub const NONE: Self = Self(0);
    pub const SUBJECT: Self = Self(0x01);
    pub const LOCATION: Self = Self(0x02);
    pub const TIME: Self = Self(0x04);
    pub const RECURRENCE: Self = Self(0x08);
    pub const ALL: Self = Self(0x0f);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::SUBJECT, "subject"),
        (Self::LOCATION, "location"),
        (Self::TIME, "time"),
        (Self::RECURRENCE, "recurrence"),
    ];

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// ## Summary
    /// Parses the comma-separated form written by [`Display`](fmt::Display).
    ///
    /// Unknown names are skipped with a warning.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut flags = Self::NONE;
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match Self::NAMES
                .iter()
                .find(|(_, known)| known.eq_ignore_ascii_case(name))
            {
                Some((flag, _)) => flags.insert(*flag),
                None => tracing::warn!(name, "Ignoring unknown change name"),
            }
        }
        flags
    }
}

impl fmt::Display for ChangeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Field-level differences between two versions of the same invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteChanges {
    flags: ChangeFlags,
}

impl InviteChanges {
    /// ## Summary
    /// Compares `old` and `new`.
    ///
    /// Times are compared as instants, so re-expressing a start in another
    /// zone is not a change, and an explicit end equal to start plus the
    /// old duration is not either. Recurrence compares rule semantics.
    #[must_use]
    pub fn diff(old: &Invite, new: &Invite) -> Self {
        let mut flags = ChangeFlags::NONE;
        if old.name != new.name {
            flags.insert(ChangeFlags::SUBJECT);
        }
        if old.location != new.location {
            flags.insert(ChangeFlags::LOCATION);
        }
        let same_time = same_moment(
            old.start.as_ref(),
            &old.tz_map,
            new.start.as_ref(),
            &new.tz_map,
        ) && same_moment(
            old.effective_end_time().as_ref(),
            &old.tz_map,
            new.effective_end_time().as_ref(),
            &new.tz_map,
        );
        if !same_time {
            flags.insert(ChangeFlags::TIME);
        }
        let same_recurrence = match (old.recurrence(), new.recurrence()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_rules(b),
            _ => false,
        };
        if !same_recurrence {
            flags.insert(ChangeFlags::RECURRENCE);
        }
        Self { flags }
    }

    #[must_use]
    pub const fn flags(&self) -> ChangeFlags {
        self.flags
    }

    #[must_use]
    pub const fn no_change(&self) -> bool {
        self.flags.is_empty()
    }

    /// Replies collected for the old version no longer apply.
    #[must_use]
    pub const fn is_reply_invalidating_change(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Published per-occurrence exceptions need reconciling.
    #[must_use]
    pub const fn is_exception_removing_change(&self) -> bool {
        self.flags.intersects(ChangeFlags::TIME) || self.flags.intersects(ChangeFlags::RECURRENCE)
    }
}

/// Value equality on the timeline; dates never equal date-times.
fn same_moment(
    a: Option<&CalDateTime>,
    a_zones: &TimeZoneRegistry,
    b: Option<&CalDateTime>,
    b_zones: &TimeZoneRegistry,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.has_time() == b.has_time()
                && match (a_zones.to_utc(a), b_zones.to_utc(b)) {
                    (Ok(x), Ok(y)) => x == y,
                    _ => a == b,
                }
        }
        _ => false,
    }
}

/// What an organizer's update means for its attendees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizerInviteChanges {
    pub flags: ChangeFlags,
    /// The update removes the invite.
    pub canceled: bool,
    /// Anything attendees should hear about changed.
    pub changed: bool,
    /// Subject to use for the notification.
    pub subject: String,
    pub attendees_only_in_new: Vec<Attendee>,
    pub attendees_only_in_old: Vec<Attendee>,
    pub excluded_only_in_new: Vec<CalDateTime>,
    pub excluded_only_in_old: Vec<CalDateTime>,
}

impl OrganizerInviteChanges {
    /// ## Summary
    /// Compares an organizer's stored and updated versions of an invite.
    ///
    /// A missing `old` is a creation and a missing `new` a cancellation;
    /// both count as changes of every aspect. Otherwise the update is
    /// changed when any field flag is set or the attendee or excluded
    /// instance sets differ.
    #[must_use]
    #[tracing::instrument(skip_all)]
    pub fn diff(old: Option<&Invite>, new: Option<&Invite>) -> Self {
        let subject = new.or(old).map(|inv| inv.name.clone()).unwrap_or_default();
        let (old, new) = match (old, new) {
            (Some(old), Some(new)) => (old, new),
            (None, None) => return Self::unchanged(subject),
            (None, Some(new)) => {
                return Self {
                    flags: ChangeFlags::ALL,
                    canceled: new.is_cancel(),
                    changed: true,
                    subject,
                    attendees_only_in_new: new.attendees.clone(),
                    attendees_only_in_old: Vec::new(),
                    excluded_only_in_new: excluded(new),
                    excluded_only_in_old: Vec::new(),
                };
            }
            (Some(old), None) => {
                return Self {
                    flags: ChangeFlags::ALL,
                    canceled: true,
                    changed: true,
                    subject,
                    attendees_only_in_new: Vec::new(),
                    attendees_only_in_old: old.attendees.clone(),
                    excluded_only_in_new: Vec::new(),
                    excluded_only_in_old: excluded(old),
                };
            }
        };

        let flags = InviteChanges::diff(old, new).flags();
        let attendees_only_in_new = attendees_missing_from(&new.attendees, &old.attendees);
        let attendees_only_in_old = attendees_missing_from(&old.attendees, &new.attendees);
        let old_excluded = excluded(old);
        let new_excluded = excluded(new);
        let excluded_only_in_new =
            instants_missing_from(&new_excluded, &new.tz_map, &old_excluded, &old.tz_map);
        let excluded_only_in_old =
            instants_missing_from(&old_excluded, &old.tz_map, &new_excluded, &new.tz_map);

        let changed = !flags.is_empty()
            || !attendees_only_in_new.is_empty()
            || !attendees_only_in_old.is_empty()
            || !excluded_only_in_new.is_empty()
            || !excluded_only_in_old.is_empty();
        tracing::debug!(
            uid = %new.uid,
            %flags,
            changed,
            added = attendees_only_in_new.len(),
            removed = attendees_only_in_old.len(),
            "Compared organizer versions"
        );
        Self {
            flags,
            canceled: new.is_cancel() && !old.is_cancel(),
            changed,
            subject,
            attendees_only_in_new,
            attendees_only_in_old,
            excluded_only_in_new,
            excluded_only_in_old,
        }
    }

    fn unchanged(subject: String) -> Self {
        Self {
            flags: ChangeFlags::NONE,
            canceled: false,
            changed: false,
            subject,
            attendees_only_in_new: Vec::new(),
            attendees_only_in_old: Vec::new(),
            excluded_only_in_new: Vec::new(),
            excluded_only_in_old: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_reply_invalidating_change(&self) -> bool {
        !self.flags.is_empty()
    }

    #[must_use]
    pub const fn is_exception_removing_change(&self) -> bool {
        self.flags.intersects(ChangeFlags::TIME) || self.flags.intersects(ChangeFlags::RECURRENCE)
    }
}

fn excluded(inv: &Invite) -> Vec<CalDateTime> {
    inv.recurrence()
        .map(crate::recurrence::RecurrenceTree::excluded_instances)
        .unwrap_or_default()
}

/// Entries of `these` with no address match in `others`, in order.
fn attendees_missing_from(these: &[Attendee], others: &[Attendee]) -> Vec<Attendee> {
    these
        .iter()
        .filter(|at| !others.iter().any(|o| at.addresses_match(o)))
        .cloned()
        .collect()
}

fn instants_missing_from(
    these: &[CalDateTime],
    these_zones: &TimeZoneRegistry,
    others: &[CalDateTime],
    other_zones: &TimeZoneRegistry,
) -> Vec<CalDateTime> {
    these
        .iter()
        .filter(|dt| {
            !others
                .iter()
                .any(|o| same_moment(Some(dt), these_zones, Some(o), other_zones))
        })
        .cloned()
        .collect()
}

/// ## Summary
/// Bumps `new`'s sequence when a changed update kept the old one.
///
/// Returns whether the sequence was incremented.
pub fn bump_sequence_if_unchanged(old: &Invite, new: &mut Invite) -> bool {
    if new.sequence != old.sequence || !OrganizerInviteChanges::diff(Some(old), Some(new)).changed {
        return false;
    }
    tracing::debug!(
        uid = %new.uid,
        sequence = new.sequence,
        "Update kept the previous SEQUENCE, incrementing"
    );
    new.sequence += 1;
    true
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use kunai_rfc::rfc::ical::core::{Duration, RRule};

    use super::*;
    use crate::invite::{ItemType, Method, Status};
    use crate::participant::Organizer;
    use crate::recurrence::RecurrenceTree;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .expect("valid date-time")
    }

    fn meeting() -> Invite {
        let mut inv = Invite::with_uid(ItemType::Event, "u1");
        inv.sequence = 1;
        inv.name = "Planning".into();
        inv.location = "Room1".into();
        inv.organizer = Some(Organizer::new("mailto:boss@example.com"));
        inv.start = Some(CalDateTime::zoned(at(1, 10), "Europe/Paris"));
        inv.end = Some(CalDateTime::zoned(at(1, 11), "Europe/Paris"));
        inv
    }

    #[test_log::test]
    fn location_change_invalidates_replies_only() {
        let old = meeting();
        let mut new = meeting();
        new.location = "Room2".into();

        let changes = InviteChanges::diff(&old, &new);
        tracing::debug!(flags = %changes.flags(), "Diffed");
        assert_eq!(changes.flags(), ChangeFlags::LOCATION);
        assert!(changes.is_reply_invalidating_change());
        assert!(!changes.is_exception_removing_change());
    }

    #[test]
    fn times_compare_as_instants() {
        let old = meeting();
        let mut new = meeting();
        new.start = Some(CalDateTime::utc(at(1, 8)));
        new.end = None;
        new.duration = Some(Duration::hours(1));
        assert!(InviteChanges::diff(&old, &new).no_change());

        new.duration = Some(Duration::hours(2));
        let changes = InviteChanges::diff(&old, &new);
        assert_eq!(changes.flags(), ChangeFlags::TIME);
        assert!(changes.is_exception_removing_change());
    }

    #[test]
    fn date_and_midnight_differ() {
        let mut old = meeting();
        old.start = Some(CalDateTime::date(at(1, 0).date()));
        old.end = None;
        let mut new = old.clone();
        new.start = Some(CalDateTime::floating(at(1, 0)));
        assert!(InviteChanges::diff(&old, &new).flags().contains(ChangeFlags::TIME));
    }

    #[test]
    fn recurrence_uses_rule_semantics() {
        let mut old = meeting();
        let start = old.start.clone().expect("start");
        old.set_recurrence(Some(RecurrenceTree::with_rule(
            start.clone(),
            None,
            RRule::daily().with_count(5),
        )));
        let new = old.clone();
        assert!(InviteChanges::diff(&old, &new).no_change());

        let mut weekly = old.clone();
        weekly.set_recurrence(Some(RecurrenceTree::with_rule(start, None, RRule::weekly())));
        let changes = InviteChanges::diff(&old, &weekly);
        assert_eq!(changes.flags(), ChangeFlags::RECURRENCE);
        assert!(changes.is_exception_removing_change());

        let mut single = old.clone();
        single.set_recurrence(None);
        assert!(InviteChanges::diff(&old, &single).is_exception_removing_change());
    }

    #[test]
    fn recurrence_diff_is_symmetric() {
        let base = meeting();
        let start = base.start.clone().expect("start");
        let with_rules = |rules: [RRule; 2]| {
            let mut tree = RecurrenceTree::with_rule(start.clone(), None, RRule::daily());
            tree.add = rules
                .into_iter()
                .map(crate::recurrence::RuleEntry::Repeating)
                .collect();
            let mut inv = base.clone();
            inv.set_recurrence(Some(tree));
            inv
        };
        let twice_daily = with_rules([RRule::daily(), RRule::daily()]);
        let daily_weekly = with_rules([RRule::daily(), RRule::weekly()]);

        let forward = InviteChanges::diff(&twice_daily, &daily_weekly);
        let backward = InviteChanges::diff(&daily_weekly, &twice_daily);
        assert_eq!(forward.flags(), ChangeFlags::RECURRENCE);
        assert_eq!(backward.flags(), forward.flags());
    }

    #[test]
    fn flags_round_trip_through_names() {
        let mut flags = ChangeFlags::TIME;
        flags.insert(ChangeFlags::SUBJECT);
        assert_eq!(flags.to_string(), "subject,time");
        assert_eq!(ChangeFlags::parse("subject,time"), flags);
        assert_eq!(ChangeFlags::ALL.to_string(), "subject,location,time,recurrence");
        assert_eq!(ChangeFlags::parse(" Location ,bogus,"), ChangeFlags::LOCATION);
        assert_eq!(ChangeFlags::parse(""), ChangeFlags::NONE);
    }

    #[test_log::test]
    fn attendee_set_differences() {
        let mut old = meeting();
        old.attendees = vec![
            Attendee::new("mailto:alice@example.com"),
            Attendee::new("mailto:bob@example.com"),
        ];
        let mut new = meeting();
        new.attendees = vec![
            Attendee::new("alice@example.com"),
            Attendee::new("mailto:carol@example.com"),
        ];

        let changes = OrganizerInviteChanges::diff(Some(&old), Some(&new));
        let only_new: Vec<&str> = changes.attendees_only_in_new.iter().map(Attendee::address).collect();
        let only_old: Vec<&str> = changes.attendees_only_in_old.iter().map(Attendee::address).collect();
        assert_eq!(only_new, vec!["carol@example.com"]);
        assert_eq!(only_old, vec!["bob@example.com"]);
        assert!(changes.changed);
        assert!(!changes.is_reply_invalidating_change());
    }

    #[test]
    fn removed_exclusion_shows_up_as_old_only() {
        let mut old = meeting();
        let start = old.start.clone().expect("start");
        let day3 = CalDateTime::zoned(at(3, 10), "Europe/Paris");
        old.set_recurrence(Some(
            RecurrenceTree::with_rule(start.clone(), None, RRule::daily()).with_exclusions(vec![day3.clone()]),
        ));
        let mut new = old.clone();
        new.set_recurrence(Some(RecurrenceTree::with_rule(start, None, RRule::daily())));

        let changes = OrganizerInviteChanges::diff(Some(&old), Some(&new));
        assert_eq!(changes.excluded_only_in_old, vec![day3]);
        assert!(changes.excluded_only_in_new.is_empty());
        assert!(changes.changed);
        assert!(changes.flags.is_empty());
    }

    #[test]
    fn creation_and_cancellation_are_changes() {
        let inv = meeting();
        let created = OrganizerInviteChanges::diff(None, Some(&inv));
        assert!(created.changed && !created.canceled);
        assert_eq!(created.subject, "Planning");

        let removed = OrganizerInviteChanges::diff(Some(&inv), None);
        assert!(removed.changed && removed.canceled);
        assert!(removed.is_reply_invalidating_change());

        let mut canceled = inv.clone();
        canceled.method = Method::Cancel;
        canceled.status = Status::Cancelled;
        assert!(OrganizerInviteChanges::diff(Some(&inv), Some(&canceled)).canceled);

        let nothing = OrganizerInviteChanges::diff(None, None);
        assert!(!nothing.changed && !nothing.canceled);
    }

    #[test]
    fn sequence_bumped_only_for_changed_updates() {
        let old = meeting();
        let mut same = meeting();
        assert!(!bump_sequence_if_unchanged(&old, &mut same));
        assert_eq!(same.sequence, 1);

        let mut moved = meeting();
        moved.location = "Room2".into();
        assert!(bump_sequence_if_unchanged(&old, &mut moved));
        assert_eq!(moved.sequence, 2);

        assert!(!bump_sequence_if_unchanged(&old, &mut moved));
        assert_eq!(moved.sequence, 2);
    }
}
