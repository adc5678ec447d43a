//! Derived start, end and duration, and per-occurrence copies.

use kunai_rfc::rfc::ical::core::Duration;

use super::{Invite, ItemRef};
use crate::temporal::{CalDateTime, RecurId};

impl Invite {
    /// ## Summary
    /// The explicit duration, or the span between start and end.
    ///
    /// With a start but neither end nor duration, events last the minimum
    /// duration (one day for a date-only start, one second otherwise); tasks
    /// stay undefined.
    #[must_use]
    pub fn effective_duration(&self) -> Option<Duration> {
        if let Some(duration) = self.duration {
            return Some(duration);
        }
        let start = self.start.as_ref()?;
        match &self.end {
            Some(end) => Some(self.span(start, end)),
            None if self.is_task() => None,
            None => Some(self.min_duration()),
        }
    }

    /// ## Summary
    /// The explicit end, or start plus the effective duration.
    ///
    /// `None` when there is no start, for a task without end or due, and
    /// when the duration runs past the supported calendar range.
    #[must_use]
    pub fn effective_end_time(&self) -> Option<CalDateTime> {
        if let Some(end) = &self.end {
            return Some(end.clone());
        }
        let start = self.start.as_ref()?;
        self.effective_duration().and_then(|d| start.add(&d))
    }

    /// Whole-day spans for dates, timeline spans when both zones resolve,
    /// wall-clock spans otherwise.
    fn span(&self, start: &CalDateTime, end: &CalDateTime) -> Duration {
        if !start.has_time() && !end.has_time() {
            return end.wall_difference(start);
        }
        match (self.tz_map.to_utc(start), self.tz_map.to_utc(end)) {
            (Ok(s), Ok(e)) => Duration::from_seconds((e - s).num_seconds()),
            _ => end.wall_difference(start),
        }
    }

    /// ## Summary
    /// An independent copy.
    ///
    /// Participants, alarms and lists are owned by the copy. The copy is not
    /// yet stored: only the owning calendar item is kept from the storage
    /// reference.
    #[must_use]
    pub fn new_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.item = ItemRef {
            calendar_item_id: self.item.calendar_item_id,
            ..ItemRef::default()
        };
        copy
    }

    /// ## Summary
    /// Builds a standalone exception for the occurrence starting at
    /// `occurrence_start`.
    ///
    /// The copy keeps the series' effective duration, carries the occurrence
    /// as its recurrence-id and is local-only. Returns `None` for an invite
    /// that is not a series.
    #[must_use]
    pub fn make_instance_invite(&self, occurrence_start: &CalDateTime) -> Option<Self> {
        if !self.is_recurrence() {
            return None;
        }
        let duration = self.effective_duration();
        let mut instance = self.new_copy();
        instance.set_local_only(true);
        instance.set_recurrence(None);
        instance.set_recur_id(Some(RecurId::new(occurrence_start.clone())));
        instance.start = Some(occurrence_start.clone());
        instance.end = duration.and_then(|d| occurrence_start.add(&d));
        instance.duration = None;
        tracing::debug!(uid = %self.uid, occurrence = %occurrence_start, "Created instance invite");
        Some(instance)
    }
}
