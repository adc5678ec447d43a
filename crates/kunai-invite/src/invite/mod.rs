//! The invite: one event or task definition within a UID's lineage.

mod codec;
mod compose;
mod ingest;
mod sanitize;
mod timing;

use std::fmt;

use chrono::{DateTime, Utc};
use kunai_rfc::rfc::ical::core::{Duration, Property};

use crate::alarm::Alarm;
use crate::description::{Description, DescriptionSlot};
use crate::participant::{Attendee, Organizer, PartStat};
use crate::recurrence::RecurrenceTree;
use crate::temporal::{CalDateTime, RecurId, truncate_to_seconds};
use crate::tzmap::TimeZoneRegistry;

pub use self::compose::{ComposeOptions, compose_calendar};
pub use self::ingest::{invites_from_calendar, registry_from_calendar};
pub use self::sanitize::{Repair, SanitizeMode, fixup_outlook_uid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemType {
    #[default]
    Event,
    Task,
}

impl ItemType {
    /// Persisted item-type byte.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Event => 11,
            Self::Task => 15,
        }
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        if code == 15 { Self::Task } else { Self::Event }
    }
}

/// iTIP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Publish,
    Request,
    Reply,
    Add,
    Cancel,
    Refresh,
    Counter,
    DeclineCounter,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "PUBLISH",
            Self::Request => "REQUEST",
            Self::Reply => "REPLY",
            Self::Add => "ADD",
            Self::Cancel => "CANCEL",
            Self::Refresh => "REFRESH",
            Self::Counter => "COUNTER",
            Self::DeclineCounter => "DECLINECOUNTER",
        }
    }

    /// ## Summary
    /// Case-insensitive lookup; unknown names map to PUBLISH.
    ///
    /// EXPORT is a known alias of PUBLISH and is not logged.
    #[must_use]
    pub fn lookup(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "PUBLISH" | "EXPORT" => Self::Publish,
            "REQUEST" => Self::Request,
            "REPLY" => Self::Reply,
            "ADD" => Self::Add,
            "CANCEL" => Self::Cancel,
            "REFRESH" => Self::Refresh,
            "COUNTER" => Self::Counter,
            "DECLINECOUNTER" => Self::DeclineCounter,
            _ => {
                tracing::warn!(method = %name, "Unknown iTIP method; using PUBLISH");
                Self::Publish
            }
        }
    }

    /// Methods sent by an organizer; these require an ORGANIZER when
    /// attendees are listed.
    #[must_use]
    pub const fn is_organizer_method(self) -> bool {
        matches!(
            self,
            Self::Request | Self::Publish | Self::Cancel | Self::Add | Self::DeclineCounter
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! ical_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $code:literal, $wire:literal;)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Persisted code.
            #[must_use]
            pub const fn code(self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            /// Accepts the persisted code or the iCalendar value.
            #[must_use]
            pub fn parse(s: &str) -> Option<Self> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($code) || s.eq_ignore_ascii_case($wire) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }
    };
}

ical_enum! {
    /// STATUS of an event or task.
    Status {
        Tentative => "TENT", "TENTATIVE";
        Confirmed => "CONF", "CONFIRMED";
        Cancelled => "CANC", "CANCELLED";
        NeedsAction => "NEED", "NEEDS-ACTION";
        Completed => "COMP", "COMPLETED";
        InProcess => "INPR", "IN-PROCESS";
    }
}

ical_enum! {
    /// CLASS (visibility).
    Class {
        Public => "PUB", "PUBLIC";
        Private => "PRI", "PRIVATE";
        Confidential => "CON", "CONFIDENTIAL";
    }
}

ical_enum! {
    /// TRANSP
    Transparency {
        Opaque => "O", "OPAQUE";
        Transparent => "T", "TRANSPARENT";
    }
}

ical_enum! {
    /// Free-busy hint shown to others.
    FreeBusy {
        Free => "F", "FREE";
        Busy => "B", "BUSY";
        Tentative => "T", "BUSY-TENTATIVE";
        OutOfOffice => "O", "BUSY-UNAVAILABLE";
    }
}

/// Occurrence-kind flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InviteFlags(pub u32);

impl InviteFlags {
    pub const TASK: u32 = 0x01;
    pub const EVENT: u32 = 0x02;
    pub const ALLDAY: u32 = 0x04;
    pub const RECURRING: u32 = 0x20;
    pub const HAS_ATTACHMENT: u32 = 0x80;
    pub const DRAFT: u32 = 0x100;
    pub const NEVER_SENT: u32 = 0x200;

    #[must_use]
    pub const fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub const fn set(&mut self, bit: u32, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// GEO property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geo {
    pub latitude: f64,
    pub longitude: f64,
}

impl Geo {
    /// `lat;lon` as written in GEO.
    #[must_use]
    pub fn to_ical(&self) -> String {
        format!("{};{}", self.latitude, self.longitude)
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (lat, lon) = s.split_once(';')?;
        Some(Self {
            latitude: lat.trim().parse().ok()?,
            longitude: lon.trim().parse().ok()?,
        })
    }
}

/// Where an invite is stored. The owning series is referenced by id and
/// resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemRef {
    pub mailbox_id: i64,
    /// Calendar item holding the series and its exceptions.
    pub calendar_item_id: Option<i64>,
    /// Message the invite arrived in.
    pub mail_item_id: i64,
    /// Component index within that message.
    pub component_num: i32,
}

#[derive(Debug, Clone)]
pub struct Invite {
    pub item_type: ItemType,
    pub item: ItemRef,
    pub sent_by_me: bool,
    pub uid: String,
    pub sequence: i32,
    /// Sequence of the last change that required a full re-send.
    pub last_full_sequence: i32,
    dtstamp: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub method: Method,
    pub status: Status,
    pub class: Class,
    pub class_set_by_me: bool,
    pub transparency: Transparency,
    pub free_busy: Option<FreeBusy>,
    pub start: Option<CalDateTime>,
    /// DTEND for events, DUE for tasks.
    pub end: Option<CalDateTime>,
    pub duration: Option<Duration>,
    pub flags: InviteFlags,
    pub location: String,
    pub name: String,
    pub description: DescriptionSlot,
    /// Short plain-text preview of the description.
    pub fragment: String,
    pub attendees: Vec<Attendee>,
    pub organizer: Option<Organizer>,
    /// The owning account organized this invite.
    pub is_organizer: bool,
    /// The owning account's own participation status.
    pub part_stat: PartStat,
    pub rsvp: bool,
    recurrence: Option<RecurrenceTree>,
    recur_id: Option<RecurId>,
    pub alarms: Vec<Alarm>,
    pub x_props: Vec<Property>,
    pub priority: Option<i32>,
    pub percent_complete: Option<i32>,
    pub completed: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    pub comments: Vec<String>,
    pub contacts: Vec<String>,
    pub geo: Option<Geo>,
    pub url: Option<String>,
    local_only: bool,
    pub tz_map: TimeZoneRegistry,
}

impl Invite {
    /// A new invite with a fresh UID.
    #[must_use]
    pub fn new(item_type: ItemType) -> Self {
        Self::with_uid(item_type, uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn with_uid(item_type: ItemType, uid: impl Into<String>) -> Self {
        let mut flags = InviteFlags::default();
        flags.set(InviteFlags::TASK, item_type == ItemType::Task);
        flags.set(InviteFlags::EVENT, item_type == ItemType::Event);
        Self {
            item_type,
            item: ItemRef::default(),
            sent_by_me: false,
            uid: uid.into(),
            sequence: 0,
            last_full_sequence: 0,
            dtstamp: truncate_to_seconds(Utc::now()),
            last_modified: None,
            method: Method::Publish,
            status: Self::default_status(item_type),
            class: Class::Public,
            class_set_by_me: false,
            transparency: Transparency::Opaque,
            free_busy: None,
            start: None,
            end: None,
            duration: None,
            flags,
            location: String::new(),
            name: String::new(),
            description: DescriptionSlot::loaded(Description::default()),
            fragment: String::new(),
            attendees: Vec::new(),
            organizer: None,
            is_organizer: true,
            part_stat: PartStat::Accepted,
            rsvp: true,
            recurrence: None,
            recur_id: None,
            alarms: Vec::new(),
            x_props: Vec::new(),
            priority: None,
            percent_complete: None,
            completed: None,
            categories: Vec::new(),
            contacts: Vec::new(),
            comments: Vec::new(),
            geo: None,
            url: None,
            local_only: false,
            tz_map: TimeZoneRegistry::default(),
        }
    }

    const fn default_status(item_type: ItemType) -> Status {
        match item_type {
            ItemType::Event => Status::Confirmed,
            ItemType::Task => Status::NeedsAction,
        }
    }

    #[must_use]
    pub const fn is_event(&self) -> bool {
        matches!(self.item_type, ItemType::Event)
    }

    #[must_use]
    pub const fn is_task(&self) -> bool {
        matches!(self.item_type, ItemType::Task)
    }

    /// Switching to a task turns a default CONFIRMED into NEEDS-ACTION.
    pub fn set_item_type(&mut self, item_type: ItemType) {
        if item_type == ItemType::Task && self.status == Status::Confirmed {
            self.status = Status::NeedsAction;
        }
        self.item_type = item_type;
        self.flags.set(InviteFlags::TASK, item_type == ItemType::Task);
        self.flags.set(InviteFlags::EVENT, item_type == ItemType::Event);
    }

    #[must_use]
    pub const fn dtstamp(&self) -> DateTime<Utc> {
        self.dtstamp
    }

    /// Stored at second precision.
    pub fn set_dtstamp(&mut self, dtstamp: DateTime<Utc>) {
        self.dtstamp = truncate_to_seconds(dtstamp);
    }

    #[must_use]
    pub const fn is_all_day(&self) -> bool {
        self.flags.contains(InviteFlags::ALLDAY)
    }

    pub const fn set_all_day(&mut self, all_day: bool) {
        self.flags.set(InviteFlags::ALLDAY, all_day);
    }

    #[must_use]
    pub const fn is_draft(&self) -> bool {
        self.flags.contains(InviteFlags::DRAFT)
    }

    #[must_use]
    pub const fn is_never_sent(&self) -> bool {
        self.flags.contains(InviteFlags::NEVER_SENT)
    }

    pub const fn set_never_sent(&mut self, never_sent: bool) {
        self.flags.set(InviteFlags::NEVER_SENT, never_sent);
    }

    #[must_use]
    pub const fn has_attachment(&self) -> bool {
        self.flags.contains(InviteFlags::HAS_ATTACHMENT)
    }

    #[must_use]
    pub const fn recurrence(&self) -> Option<&RecurrenceTree> {
        self.recurrence.as_ref()
    }

    #[must_use]
    pub const fn recurrence_mut(&mut self) -> Option<&mut RecurrenceTree> {
        self.recurrence.as_mut()
    }

    #[must_use]
    pub const fn recur_id(&self) -> Option<&RecurId> {
        self.recur_id.as_ref()
    }

    /// ## Summary
    /// Attaches or clears the recurrence tree.
    ///
    /// An exception (recurrence-id set) never carries a tree: the call is
    /// ignored for exceptions.
    pub fn set_recurrence(&mut self, recurrence: Option<RecurrenceTree>) {
        if recurrence.is_some() && self.recur_id.is_some() {
            tracing::debug!(uid = %self.uid, "Ignoring recurrence rule on an exception");
            return;
        }
        self.flags.set(InviteFlags::RECURRING, recurrence.is_some());
        self.recurrence = recurrence;
    }

    /// Marks the invite as an exception; any recurrence tree is dropped.
    pub fn set_recur_id(&mut self, recur_id: Option<RecurId>) {
        if recur_id.is_some() {
            self.set_recurrence(None);
        }
        self.recur_id = recur_id;
    }

    #[must_use]
    pub const fn is_recurrence(&self) -> bool {
        self.recurrence.is_some()
    }

    #[must_use]
    pub const fn has_recur_id(&self) -> bool {
        self.recur_id.is_some()
    }

    /// Stored local-only flag.
    #[must_use]
    pub const fn local_only_flag(&self) -> bool {
        self.local_only
    }

    /// Local-only never applies to the organizer's own copy.
    #[must_use]
    pub const fn is_local_only(&self) -> bool {
        self.local_only && !self.is_organizer
    }

    pub const fn set_local_only(&mut self, local_only: bool) {
        self.local_only = local_only;
    }

    #[must_use]
    pub fn has_organizer(&self) -> bool {
        self.organizer.is_some()
    }

    #[must_use]
    pub fn has_other_attendees(&self) -> bool {
        !self.attendees.is_empty()
    }

    #[must_use]
    pub fn is_cancel(&self) -> bool {
        self.method == Method::Cancel || self.status == Status::Cancelled
    }

    #[must_use]
    pub fn is_high_priority(&self) -> bool {
        self.priority.is_some_and(|p| (1..=4).contains(&p))
    }

    #[must_use]
    pub fn is_low_priority(&self) -> bool {
        self.priority.is_some_and(|p| (6..=9).contains(&p))
    }

    /// Same or later sequence than `other`.
    #[must_use]
    pub const fn is_same_or_newer_version(&self, other: &Self) -> bool {
        self.sequence >= other.sequence
    }

    #[must_use]
    pub const fn is_newer_version(&self, other: &Self) -> bool {
        self.sequence > other.sequence
    }

    /// Description if already in memory; empty when it still has to be
    /// loaded.
    #[must_use]
    pub fn description_if_loaded(&self) -> Description {
        self.description.peek().unwrap_or_default()
    }

    pub fn set_description(&mut self, plain: Option<String>, html: Option<String>) {
        self.description = DescriptionSlot::loaded(Description { plain, html });
    }

    /// ## Summary
    /// Redacts everything a viewer without private access must not see.
    ///
    /// Timing, status, organizer and recurrence stay intact.
    pub fn clear_private_info(&mut self) {
        self.name.clear();
        self.set_description(None, None);
        self.fragment.clear();
        self.location.clear();
        self.attendees.clear();
        self.comments.clear();
        self.categories.clear();
        self.contacts.clear();
        self.geo = None;
        self.priority = None;
        self.percent_complete = None;
        self.completed = None;
        self.alarms.clear();
        self.x_props.clear();
    }

    /// Whether full details may be shown to anyone.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.class == Class::Public
    }
}

/// The invite of `invites` whose recurrence-id equals `recur_id`; two absent
/// ids match.
#[must_use]
pub fn matching_invite<'a>(invites: &'a [Invite], recur_id: Option<&RecurId>) -> Option<&'a Invite> {
    invites.iter().find(|inv| inv.recur_id() == recur_id)
}

#[cfg(test)]
#[path = "invite_tests.rs"]
mod tests;
