//! Persisted form of an invite.
//!
//! Tags are stable: stored data written by earlier versions must keep
//! decoding. Every optional tag has a default.

use chrono::{DateTime, Utc};
use kunai_rfc::rfc::ical::core::{Parameter, Property, Value};
use kunai_rfc::rfc::ical::parse::parse_duration;

use super::{
    Class, FreeBusy, Geo, Invite, InviteFlags, ItemRef, ItemType, Method, SanitizeMode, Status,
    Transparency,
};
use crate::account::Account;
use crate::alarm::Alarm;
use crate::description::{Description, DescriptionSlot};
use crate::error::InviteResult;
use crate::metadata::Metadata;
use crate::participant::{Attendee, Organizer, PartStat};
use crate::recurrence::RecurrenceTree;
use crate::settings::EngineSettings;
use crate::temporal::{CalDateTime, RecurId};
use crate::tzmap::TimeZoneRegistry;

const FN_LOCAL_ONLY: &str = "lo";
const FN_ITEM_TYPE: &str = "it";
const FN_UID: &str = "u";
const FN_MAIL_ITEM_ID: &str = "mid";
const FN_COMPONENT_NUM: &str = "comp";
const FN_SENT_BY_ME: &str = "byme";
const FN_CLASS: &str = "cl";
const FN_CLASS_SET_BY_ME: &str = "clSetByMe";
const FN_STATUS: &str = "status";
const FN_FREE_BUSY: &str = "fb";
const FN_TRANSP: &str = "tr";
const FN_START: &str = "st";
const FN_END: &str = "et";
const FN_COMPLETED: &str = "completed";
const FN_DURATION: &str = "duration";
const FN_METHOD: &str = "mthd";
const FN_FRAGMENT: &str = "frag";
const FN_DESC_IN_META: &str = "dinM";
const FN_DESC: &str = "desc";
const FN_DESC_HTML: &str = "descH";
const FN_RECURRENCE: &str = "recurrence";
const FN_NAME: &str = "n";
const FN_LOCATION: &str = "l";
const FN_FLAGS: &str = "af";
const FN_PARTSTAT: &str = "ptst";
const FN_RSVP: &str = "rsvp";
const FN_TZMAP: &str = "tzm";
const FN_RECUR_ID: &str = "rid";
const FN_DTSTAMP: &str = "dts";
const FN_LAST_MODIFIED: &str = "lastMod";
const FN_SEQ_NO: &str = "seq";
const FN_LAST_FULL_SEQ_NO: &str = "lfseq";
const FN_ORGANIZER: &str = "org";
const FN_IS_ORGANIZER: &str = "isOrg";
const FN_NUM_ATTENDEES: &str = "numAt";
const FN_ATTENDEE: &str = "at";
const FN_PRIORITY: &str = "prio";
const FN_PCT_COMPLETE: &str = "pctcompl";
const FN_NUM_COMMENTS: &str = "numCmt";
const FN_COMMENT: &str = "cmt";
const FN_NUM_CONTACTS: &str = "numContacts";
const FN_CONTACT: &str = "contact";
const FN_NUM_CATEGORIES: &str = "numCat";
const FN_CATEGORY: &str = "cat";
const FN_GEO: &str = "geo";
const FN_LATITUDE: &str = "lat";
const FN_LONGITUDE: &str = "lon";
const FN_URL: &str = "url";
const FN_NUM_ALARMS: &str = "numAl";
const FN_ALARM: &str = "al";
const FN_NUM_XPROPS_OR_XPARAMS: &str = "numX";
const FN_XPROP_OR_XPARAM: &str = "x";
const FN_VALUE: &str = "v";

fn millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

impl Invite {
    /// ## Summary
    /// Encodes the invite as a persisted tree.
    ///
    /// The description is stored inline only when it is in memory and no
    /// longer than `settings.description_in_metadata_limit` bytes; longer
    /// ones stay in the external store.
    #[must_use]
    pub fn encode_metadata(&self, settings: &EngineSettings) -> Metadata {
        let mut meta = Metadata::new();
        if self.is_local_only() {
            meta.put(FN_LOCAL_ONLY, true);
        }
        meta.put(FN_ITEM_TYPE, self.item_type.code());
        meta.put(FN_UID, self.uid.as_str());
        meta.put(FN_MAIL_ITEM_ID, self.item.mail_item_id);
        meta.put(FN_COMPONENT_NUM, self.item.component_num);
        meta.put(FN_SENT_BY_ME, self.sent_by_me);
        if !self.is_public() {
            meta.put(FN_CLASS, self.class.code());
        }
        meta.put(FN_CLASS_SET_BY_ME, self.class_set_by_me);
        meta.put(FN_STATUS, self.status.code());
        meta.put_opt(FN_FREE_BUSY, self.free_busy.map(FreeBusy::code));
        meta.put(FN_TRANSP, self.transparency.code());
        meta.put_opt(FN_START, self.start.as_ref().map(CalDateTime::to_canonical));
        meta.put_opt(FN_END, self.end.as_ref().map(CalDateTime::to_canonical));
        meta.put_opt(FN_COMPLETED, self.completed.map(millis));
        meta.put_opt(FN_DURATION, self.duration.map(|d| d.to_string()));
        meta.put(FN_METHOD, self.method.as_str());
        meta.put(FN_FRAGMENT, self.fragment.as_str());

        if let Some(description) = self.description.peek()
            && description.len() <= settings.description_in_metadata_limit
        {
            meta.put(FN_DESC_IN_META, true);
            meta.put_opt(FN_DESC, description.plain);
            meta.put_opt(FN_DESC_HTML, description.html);
        }

        if let Some(recurrence) = self.recurrence() {
            meta.put(FN_RECURRENCE, recurrence.encode_metadata());
        }
        meta.put(FN_NAME, self.name.as_str());
        meta.put(FN_LOCATION, self.location.as_str());
        meta.put(FN_FLAGS, self.flags.0);
        meta.put(FN_PARTSTAT, self.part_stat.code());
        meta.put(FN_RSVP, self.rsvp);
        meta.put(FN_TZMAP, self.tz_map.encode_metadata());
        if let Some(recur_id) = self.recur_id() {
            meta.put(FN_RECUR_ID, recur_id.encode_metadata());
        }
        meta.put(FN_DTSTAMP, millis(self.dtstamp()));
        meta.put_opt(FN_LAST_MODIFIED, self.last_modified.map(millis));
        meta.put(FN_SEQ_NO, self.sequence);
        meta.put(FN_LAST_FULL_SEQ_NO, self.last_full_sequence);

        if let Some(organizer) = &self.organizer {
            meta.put(FN_ORGANIZER, organizer.encode_metadata());
        }
        meta.put(FN_IS_ORGANIZER, self.is_organizer);
        meta.put_list(
            FN_NUM_ATTENDEES,
            FN_ATTENDEE,
            self.attendees.iter().map(Attendee::encode_metadata),
        );

        meta.put_opt(FN_PRIORITY, self.priority);
        meta.put_opt(FN_PCT_COMPLETE, self.percent_complete);
        meta.put_list(FN_NUM_COMMENTS, FN_COMMENT, self.comments.iter().map(String::as_str));
        meta.put_list(FN_NUM_CONTACTS, FN_CONTACT, self.contacts.iter().map(String::as_str));
        meta.put_list(
            FN_NUM_CATEGORIES,
            FN_CATEGORY,
            self.categories.iter().map(String::as_str),
        );
        if let Some(geo) = &self.geo {
            let mut geo_meta = Metadata::new();
            geo_meta.put(FN_LATITUDE, geo.latitude.to_string());
            geo_meta.put(FN_LONGITUDE, geo.longitude.to_string());
            meta.put(FN_GEO, geo_meta);
        }
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            meta.put(FN_URL, url);
        }
        meta.put_list(
            FN_NUM_ALARMS,
            FN_ALARM,
            self.alarms.iter().map(Alarm::encode_metadata),
        );
        meta.put_list(
            FN_NUM_XPROPS_OR_XPARAMS,
            FN_XPROP_OR_XPARAM,
            self.x_props.iter().map(encode_x_prop),
        );
        meta
    }

    /// ## Summary
    /// Rebuilds an invite from its persisted tree.
    ///
    /// `item` supplies the mailbox and calendar item the tree was stored
    /// under. `owner` decides organizer status for trees written before the
    /// organizer flag existed.
    ///
    /// ## Errors
    /// Returns [`InviteError::MalformedTemporal`] for unparseable stored
    /// date-times or durations, and decoding errors from nested trees.
    /// Missing optional tags never fail.
    ///
    /// The decoded invite goes through a lenient sanitize, so stored data
    /// that breaks a consistency rule comes back repaired.
    ///
    /// [`InviteError::MalformedTemporal`]: crate::error::InviteError::MalformedTemporal
    #[tracing::instrument(skip_all, fields(mailbox = item.mailbox_id))]
    pub fn decode_metadata(
        meta: &Metadata,
        item: ItemRef,
        settings: &EngineSettings,
        owner: Option<&Account>,
    ) -> InviteResult<Self> {
        let item_type = ItemType::from_code(meta.get_long_or(FN_ITEM_TYPE, ItemType::Event.code()));
        let mut inv = Self::with_uid(item_type, meta.get_str(FN_UID).unwrap_or_default());
        inv.item = ItemRef {
            mail_item_id: meta.get_long_or(FN_MAIL_ITEM_ID, 0),
            component_num: i32::try_from(meta.get_long_or(FN_COMPONENT_NUM, 0)).unwrap_or_default(),
            ..item
        };
        inv.sent_by_me = meta.get_bool_or(FN_SENT_BY_ME, false);
        inv.class = meta.get_str(FN_CLASS).and_then(Class::parse).unwrap_or(Class::Public);
        inv.class_set_by_me = meta.get_bool_or(FN_CLASS_SET_BY_ME, false);
        inv.status = meta
            .get_str(FN_STATUS)
            .and_then(Status::parse)
            .unwrap_or(Self::default_status(item_type));
        inv.free_busy = meta.get_str(FN_FREE_BUSY).and_then(FreeBusy::parse);
        inv.transparency = meta
            .get_str(FN_TRANSP)
            .and_then(Transparency::parse)
            .unwrap_or(Transparency::Opaque);
        inv.fragment = meta.get_str(FN_FRAGMENT).unwrap_or_default().to_string();

        inv.description = if meta.get_bool_or(FN_DESC_IN_META, false) {
            DescriptionSlot::loaded(Description {
                plain: meta.get_str(FN_DESC).map(str::to_string),
                html: meta.get_str(FN_DESC_HTML).map(str::to_string),
            })
        } else {
            DescriptionSlot::unloaded()
        };

        inv.tz_map = meta.get_map(FN_TZMAP).map_or_else(
            || TimeZoneRegistry::new(settings.default_timezone),
            |tzm| TimeZoneRegistry::decode_metadata(tzm, settings.default_timezone),
        );

        if let Some(recurrence) = meta.get_map(FN_RECURRENCE) {
            inv.set_recurrence(Some(RecurrenceTree::decode_metadata(recurrence)?));
        }
        inv.method = meta.get_str(FN_METHOD).map_or(Method::Publish, Method::lookup);
        inv.flags = InviteFlags(
            u32::try_from(meta.get_long_or(FN_FLAGS, 0)).unwrap_or_default(),
        );
        inv.flags.set(InviteFlags::RECURRING, inv.is_recurrence());

        inv.start = meta.get_str(FN_START).map(CalDateTime::parse_canonical).transpose()?;
        inv.end = meta.get_str(FN_END).map(CalDateTime::parse_canonical).transpose()?;
        inv.duration = meta.get_str(FN_DURATION).map(parse_duration).transpose()?;
        if let Some(rid) = meta.get_map(FN_RECUR_ID) {
            if inv.is_recurrence() {
                tracing::debug!(uid = %inv.uid, "Stored invite has both rule and recurrence-id");
            }
            inv.set_recur_id(Some(RecurId::decode_metadata(rid)?));
        }
        inv.completed = meta.get_long(FN_COMPLETED).filter(|ms| *ms != 0).map(from_millis);

        inv.name = meta.get_str(FN_NAME).unwrap_or_default().to_string();
        inv.location = meta.get_str(FN_LOCATION).unwrap_or_default().to_string();
        inv.part_stat = meta
            .get_str(FN_PARTSTAT)
            .and_then(PartStat::parse)
            .unwrap_or(PartStat::Accepted);
        inv.rsvp = meta.get_bool_or(FN_RSVP, true);
        inv.set_dtstamp(from_millis(meta.get_long_or(FN_DTSTAMP, 0)));
        inv.last_modified = meta.get_long(FN_LAST_MODIFIED).filter(|ms| *ms != 0).map(from_millis);
        inv.sequence = i32::try_from(meta.get_long_or(FN_SEQ_NO, 0)).unwrap_or_default();
        inv.last_full_sequence = meta
            .get_long(FN_LAST_FULL_SEQ_NO)
            .and_then(|s| i32::try_from(s).ok())
            .unwrap_or(inv.sequence);

        inv.organizer = meta.get_map(FN_ORGANIZER).map(Organizer::decode_metadata);
        inv.attendees = meta
            .map_list(FN_NUM_ATTENDEES, FN_ATTENDEE)
            .into_iter()
            .map(Attendee::decode_metadata)
            .collect();
        inv.is_organizer = match meta.get_bool(FN_IS_ORGANIZER) {
            Some(is_organizer) => is_organizer,
            None => match &inv.organizer {
                Some(org) => owner.is_some_and(|acct| acct.owns_address(org.address())),
                None => inv.attendees.is_empty(),
            },
        };

        inv.priority = meta.get_long(FN_PRIORITY).and_then(|p| i32::try_from(p).ok());
        inv.percent_complete = meta.get_long(FN_PCT_COMPLETE).and_then(|p| i32::try_from(p).ok());
        inv.comments = meta.string_list(FN_NUM_COMMENTS, FN_COMMENT);
        inv.contacts = meta.string_list(FN_NUM_CONTACTS, FN_CONTACT);
        inv.categories = meta.string_list(FN_NUM_CATEGORIES, FN_CATEGORY);
        inv.geo = meta.get_map(FN_GEO).and_then(|geo| {
            Some(Geo {
                latitude: geo.get_str(FN_LATITUDE)?.parse().ok()?,
                longitude: geo.get_str(FN_LONGITUDE)?.parse().ok()?,
            })
        });
        inv.url = meta.get_str(FN_URL).map(str::to_string);

        for alarm_meta in meta.map_list(FN_NUM_ALARMS, FN_ALARM) {
            if let Some(alarm) = Alarm::decode_metadata(alarm_meta)? {
                inv.alarms.push(alarm);
            }
        }
        inv.x_props = meta
            .map_list(FN_NUM_XPROPS_OR_XPARAMS, FN_XPROP_OR_XPARAM)
            .into_iter()
            .filter_map(decode_x_prop)
            .collect();
        inv.set_local_only(meta.get_bool_or(FN_LOCAL_ONLY, false));

        let repairs = inv.sanitize(SanitizeMode::Lenient)?;
        if !repairs.is_empty() {
            tracing::debug!(uid = %inv.uid, ?repairs, "Repaired stored invite");
        }
        Ok(inv)
    }
}

fn encode_x_prop(property: &Property) -> Metadata {
    let mut meta = Metadata::new();
    meta.put(FN_NAME, property.name.as_str());
    meta.put(FN_VALUE, property.value.to_string());
    meta.put_list(
        FN_NUM_XPROPS_OR_XPARAMS,
        FN_XPROP_OR_XPARAM,
        property.params.iter().map(|p| {
            let mut param = Metadata::new();
            param.put(FN_NAME, p.name.as_str());
            param.put(FN_VALUE, p.values.join(","));
            param
        }),
    );
    meta
}

fn decode_x_prop(meta: &Metadata) -> Option<Property> {
    let name = meta.get_str(FN_NAME)?;
    let mut property = Property::new(
        name,
        Value::Text(meta.get_str(FN_VALUE).unwrap_or_default().to_string()),
    );
    for param in meta.map_list(FN_NUM_XPROPS_OR_XPARAMS, FN_XPROP_OR_XPARAM) {
        if let Some(param_name) = param.get_str(FN_NAME) {
            property
                .params
                .push(Parameter::new(param_name, param.get_str(FN_VALUE).unwrap_or_default()));
        }
    }
    Some(property)
}
