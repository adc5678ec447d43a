//! Internal consistency repairs applied before an invite is stored or sent.

use std::collections::BTreeSet;

use kunai_rfc::rfc::ical::core::Duration;

use super::{Invite, ItemType};
use crate::error::{InviteError, InviteResult};
use crate::temporal::{AllDayVerdict, CalDateTime};

const OUTLOOK_UID_PREFIX: &str = "040000008200E00074C5B7101A82E008";

/// Whether violations raise or are repaired in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeMode {
    /// Raise [`InviteError::StructuralViolation`]; used when an organizer
    /// composes a new invite.
    Strict,
    /// Repair and warn; used for stored or externally received data.
    Lenient,
}

/// A repair made by a lenient sanitize pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    MissingUid,
    DroppedTaskStart,
    ClearedAttendeesWithoutOrganizer,
    DroppedRecurrenceWithoutStart,
    ClampedEnd,
    ClampedDuration,
    AlignedEndZone,
}

impl Invite {
    /// ## Summary
    /// Brings the invite into a consistent state.
    ///
    /// Syncs the all-day flag with the start value, enforces the organizer
    /// requirement, keeps the end at least one minimum duration after the
    /// start, prunes the time zone registry and defaults LAST-MODIFIED.
    /// Returns the repairs made.
    ///
    /// ## Errors
    /// In [`SanitizeMode::Strict`], returns
    /// [`InviteError::StructuralViolation`] for a missing UID, attendees
    /// without an organizer, or a recurrence without a start.
    #[tracing::instrument(skip(self), fields(uid = %self.uid))]
    pub fn sanitize(&mut self, mode: SanitizeMode) -> InviteResult<Vec<Repair>> {
        let strict = mode == SanitizeMode::Strict;
        let mut repairs = Vec::new();

        if self.uid.is_empty() {
            if strict {
                return Err(InviteError::StructuralViolation(format!(
                    "missing UID; subject={}",
                    self.name
                )));
            }
            tracing::warn!(subject = %self.name, "UID missing");
            repairs.push(Repair::MissingUid);
        }
        self.uid = fixup_outlook_uid(&self.uid);

        if self.item_type == ItemType::Task && self.start.is_some() && self.end.is_none() {
            tracing::debug!(uid = %self.uid, "Dropping task start without due");
            self.start = None;
            repairs.push(Repair::DroppedTaskStart);
        }

        let anchor = self.start.as_ref().or(self.end.as_ref());
        let all_day = AllDayVerdict::for_value(anchor).apply(self.is_all_day());
        self.set_all_day(all_day);

        if self.method.is_organizer_method() && self.has_other_attendees() && !self.has_organizer() {
            if strict {
                return Err(InviteError::StructuralViolation(format!(
                    "ORGANIZER missing when ATTENDEEs are present; UID={}",
                    self.uid
                )));
            }
            tracing::warn!(
                uid = %self.uid,
                reason = "attendees without organizer",
                "Clearing attendees"
            );
            self.attendees.clear();
            repairs.push(Repair::ClearedAttendeesWithoutOrganizer);
        }

        if self.is_recurrence() && self.start.is_none() {
            if strict {
                return Err(InviteError::StructuralViolation(format!(
                    "recurrence used without DTSTART; UID={}",
                    self.uid
                )));
            }
            tracing::warn!(uid = %self.uid, reason = "no start", "Removing recurrence");
            self.set_recurrence(None);
            repairs.push(Repair::DroppedRecurrenceWithoutStart);
        }

        self.clamp_end(&mut repairs);

        if self.is_recurrence() {
            self.align_end_zone(&mut repairs);
        }

        self.percent_complete = self.percent_complete.map(|p| p.clamp(0, 100));
        self.priority = self.priority.map(|p| p.clamp(0, 9));

        let referenced = self.referenced_tzids();
        self.tz_map.retain_referenced(&referenced);

        if self.last_modified.is_none() {
            self.last_modified = Some(self.dtstamp());
        }
        Ok(repairs)
    }

    /// Shortest span an occurrence may have: one day when the start has no
    /// time of day, one second otherwise.
    #[must_use]
    pub fn min_duration(&self) -> Duration {
        let date_only = self
            .start
            .as_ref()
            .map_or_else(|| self.is_all_day(), |start| !start.has_time());
        if date_only {
            Duration::days(1)
        } else {
            Duration::seconds(1)
        }
    }

    fn clamp_end(&mut self, repairs: &mut Vec<Repair>) {
        let Some(start) = self.start.clone() else {
            return;
        };
        match start.add(&self.min_duration()) {
            Some(floor) => {
                if let Some(end) = &self.end
                    && self.is_before(end, &floor)
                {
                    tracing::warn!(uid = %self.uid, %start, %end, "End before start; clamping");
                    self.end = Some(floor);
                    repairs.push(Repair::ClampedEnd);
                }
            }
            None => {
                tracing::warn!(uid = %self.uid, %start, "Start at the end of the calendar range");
            }
        }
        if let Some(duration) = self.duration
            && duration.as_seconds() < self.min_duration().as_seconds()
        {
            tracing::warn!(uid = %self.uid, %duration, "Duration below minimum; clamping");
            self.duration = Some(self.min_duration());
            repairs.push(Repair::ClampedDuration);
        }
    }

    /// Compares on the timeline, or on the wall clock when a zone does not
    /// resolve.
    pub(crate) fn is_before(&self, a: &CalDateTime, b: &CalDateTime) -> bool {
        match (self.tz_map.to_utc(a), self.tz_map.to_utc(b)) {
            (Ok(a), Ok(b)) => a < b,
            _ => a.local() < b.local(),
        }
    }

    fn align_end_zone(&mut self, repairs: &mut Vec<Repair>) {
        let (Some(start), Some(end)) = (&self.start, &self.end) else {
            return;
        };
        let (
            CalDateTime::DateTime { form: start_form, .. },
            CalDateTime::DateTime { form: end_form, .. },
        ) = (start, end)
        else {
            return;
        };
        if start_form == end_form {
            return;
        }
        let aligned = self
            .tz_map
            .to_utc(end)
            .and_then(|instant| self.tz_map.express(instant, start_form));
        match aligned {
            Ok(aligned) => {
                tracing::warn!(
                    uid = %self.uid,
                    reason = "different zones in start and end",
                    "Forcing end to the start's zone"
                );
                self.end = Some(aligned);
                repairs.push(Repair::AlignedEndZone);
            }
            Err(err) => {
                tracing::warn!(uid = %self.uid, error = %err, "Cannot align end zone");
            }
        }
    }

    /// ## Summary
    /// TZIDs the invite refers to: timed start and end, the recurrence-id
    /// and every dated entry of the recurrence tree.
    #[must_use]
    pub fn referenced_tzids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for value in [&self.start, &self.end].into_iter().flatten() {
            if let Some(tzid) = value.tzid() {
                ids.insert(tzid.to_string());
            }
        }
        if let Some(tzid) = self.recur_id().and_then(|rid| rid.dt.tzid()) {
            ids.insert(tzid.to_string());
        }
        if let Some(recurrence) = self.recurrence() {
            ids.extend(recurrence.referenced_tzids());
        }
        ids
    }
}

/// Upper-cases Outlook-generated hexadecimal UIDs so that copies differing
/// only in case are recognized as one.
#[must_use]
pub fn fixup_outlook_uid(uid: &str) -> String {
    let looks_like_outlook = uid.len() >= 82
        && uid.len() % 2 == 0
        && uid.chars().all(|c| c.is_ascii_hexdigit())
        && uid
            .get(..OUTLOOK_UID_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(OUTLOOK_UID_PREFIX));
    if looks_like_outlook {
        uid.to_ascii_uppercase()
    } else {
        uid.to_string()
    }
}
