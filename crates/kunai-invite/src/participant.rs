//! Organizer and attendee entries.

use kunai_rfc::rfc::ical::core::{Parameter, Property, param, prop};

use crate::metadata::Metadata;

const FN_ADDRESS: &str = "a";
const FN_CN: &str = "cn";
const FN_SENTBY: &str = "s";
const FN_DIR: &str = "d";
const FN_LANGUAGE: &str = "l";
const FN_CUTYPE: &str = "cut";
const FN_ROLE: &str = "r";
const FN_PARTSTAT: &str = "p";
const FN_RSVP: &str = "v";
const FN_MEMBER: &str = "m";
const FN_DELEGATED_TO: &str = "dt";
const FN_DELEGATED_FROM: &str = "df";
const FN_XPARAMS: &str = "xp";

pub const MAILTO: &str = "mailto:";

/// Strips a `mailto:` scheme, case-insensitively.
#[must_use]
pub fn strip_mailto(address: &str) -> &str {
    let trimmed = address.trim();
    match trimmed.get(..MAILTO.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(MAILTO) => &trimmed[MAILTO.len()..],
        _ => trimmed,
    }
}

/// Case-insensitive address comparison ignoring the `mailto:` scheme.
#[must_use]
pub fn addresses_match(a: &str, b: &str) -> bool {
    let (a, b) = (strip_mailto(a), strip_mailto(b));
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

macro_rules! coded_enum {
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
            /// Short persisted code.
            #[must_use]
            pub const fn code(self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// RFC 5545 parameter value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            /// Accepts either the persisted code or the parameter value.
            #[must_use]
            pub fn parse(s: &str) -> Option<Self> {
                $(
                    if s.eq_ignore_ascii_case($code) || s.eq_ignore_ascii_case($wire) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

coded_enum! {
    /// Attendee participation status.
    PartStat {
        NeedsAction => "NE", "NEEDS-ACTION";
        Accepted => "AC", "ACCEPTED";
        Declined => "DE", "DECLINED";
        Tentative => "TE", "TENTATIVE";
        Delegated => "DG", "DELEGATED";
        Completed => "CO", "COMPLETED";
        InProcess => "IN", "IN-PROCESS";
    }
}

coded_enum! {
    /// Attendee role.
    Role {
        Chair => "CHA", "CHAIR";
        Required => "REQ", "REQ-PARTICIPANT";
        Optional => "OPT", "OPT-PARTICIPANT";
        NonParticipant => "NON", "NON-PARTICIPANT";
    }
}

coded_enum! {
    /// Calendar user type.
    CuType {
        Individual => "IND", "INDIVIDUAL";
        Group => "GRO", "GROUP";
        Resource => "RES", "RESOURCE";
        Room => "ROO", "ROOM";
        Unknown => "UNK", "UNKNOWN";
    }
}

/// Fields shared by organizers and attendees.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalendarUser {
    /// Address without the `mailto:` scheme.
    pub address: String,
    pub cn: Option<String>,
    pub sent_by: Option<String>,
    pub dir: Option<String>,
    pub language: Option<String>,
    /// Parameters the engine does not interpret, kept for output.
    pub x_params: Vec<Parameter>,
}

impl CalendarUser {
    #[must_use]
    pub fn new(address: &str) -> Self {
        Self {
            address: strip_mailto(address).to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cn(mut self, cn: impl Into<String>) -> Self {
        self.cn = Some(cn.into());
        self
    }

    /// `"CN" <address>` when a name is known.
    #[must_use]
    pub fn friendly_address(&self) -> String {
        match &self.cn {
            Some(cn) if !cn.is_empty() => format!("\"{cn}\" <{}>", self.address),
            _ => self.address.clone(),
        }
    }

    fn to_property(&self, name: &str) -> Property {
        let mut property = Property::cal_address(name, format!("{MAILTO}{}", self.address));
        let optional = [
            (param::CN, &self.cn),
            (param::SENT_BY, &self.sent_by),
            (param::DIR, &self.dir),
            (param::LANGUAGE, &self.language),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                let value = if key == param::SENT_BY {
                    format!("{MAILTO}{}", strip_mailto(value))
                } else {
                    value.clone()
                };
                property.params.push(Parameter::new(key, value));
            }
        }
        property.params.extend(self.x_params.iter().cloned());
        property
    }

    fn from_property(property: &Property) -> Self {
        let address = property.value.as_uri().map_or("", strip_mailto).to_string();
        let mut user = Self {
            address,
            ..Self::default()
        };
        for p in &property.params {
            let value = p.value().map(str::to_string);
            match p.name.as_str() {
                param::CN => user.cn = value,
                param::SENT_BY => user.sent_by = value.map(|v| strip_mailto(&v).to_string()),
                param::DIR => user.dir = value,
                param::LANGUAGE => user.language = value,
                name if name.starts_with("X-") => user.x_params.push(p.clone()),
                _ => {}
            }
        }
        user
    }

    fn encode_into(&self, meta: &mut Metadata) {
        meta.put(FN_ADDRESS, self.address.as_str());
        meta.put_opt(FN_CN, self.cn.as_deref());
        meta.put_opt(FN_SENTBY, self.sent_by.as_deref());
        meta.put_opt(FN_DIR, self.dir.as_deref());
        meta.put_opt(FN_LANGUAGE, self.language.as_deref());
        if !self.x_params.is_empty() {
            let mut xp = Metadata::new();
            for p in &self.x_params {
                xp.put(p.name.clone(), p.values.join(","));
            }
            meta.put(FN_XPARAMS, xp);
        }
    }

    fn decode_from(meta: &Metadata) -> Self {
        let x_params = meta
            .get_map(FN_XPARAMS)
            .map(|xp| {
                xp.keys()
                    .filter_map(|k| xp.get_str(k).map(|v| Parameter::new(k, v)))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            address: meta.get_str(FN_ADDRESS).unwrap_or_default().to_string(),
            cn: meta.get_str(FN_CN).map(str::to_string),
            sent_by: meta.get_str(FN_SENTBY).map(str::to_string),
            dir: meta.get_str(FN_DIR).map(str::to_string),
            language: meta.get_str(FN_LANGUAGE).map(str::to_string),
            x_params,
        }
    }
}

/// The ORGANIZER of an invite.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Organizer {
    pub user: CalendarUser,
}

impl Organizer {
    #[must_use]
    pub fn new(address: &str) -> Self {
        Self {
            user: CalendarUser::new(address),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.user.address
    }

    #[must_use]
    pub fn has_sent_by(&self) -> bool {
        self.user.sent_by.as_deref().is_some_and(|s| !s.is_empty())
    }

    #[must_use]
    pub fn to_property(&self) -> Property {
        self.user.to_property(prop::ORGANIZER)
    }

    #[must_use]
    pub fn from_property(property: &Property) -> Self {
        Self {
            user: CalendarUser::from_property(property),
        }
    }

    #[must_use]
    pub fn encode_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        self.user.encode_into(&mut meta);
        meta
    }

    #[must_use]
    pub fn decode_metadata(meta: &Metadata) -> Self {
        Self {
            user: CalendarUser::decode_from(meta),
        }
    }
}

/// An ATTENDEE entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attendee {
    pub user: CalendarUser,
    pub cu_type: Option<CuType>,
    pub role: Option<Role>,
    pub part_stat: Option<PartStat>,
    pub rsvp: Option<bool>,
    pub member: Option<String>,
    pub delegated_to: Option<String>,
    pub delegated_from: Option<String>,
}

impl Attendee {
    #[must_use]
    pub fn new(address: &str) -> Self {
        Self {
            user: CalendarUser::new(address),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn with_part_stat(mut self, part_stat: PartStat) -> Self {
        self.part_stat = Some(part_stat);
        self
    }

    #[must_use]
    pub fn with_rsvp(mut self, rsvp: bool) -> Self {
        self.rsvp = Some(rsvp);
        self
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.user.address
    }

    /// Whether both entries name the same calendar user address.
    #[must_use]
    pub fn addresses_match(&self, other: &Self) -> bool {
        addresses_match(&self.user.address, &other.user.address)
    }

    #[must_use]
    pub fn to_property(&self) -> Property {
        let mut property = self.user.to_property(prop::ATTENDEE);
        if let Some(cu_type) = self.cu_type {
            property.params.push(Parameter::new(param::CUTYPE, cu_type.as_str()));
        }
        if let Some(role) = self.role {
            property.params.push(Parameter::new(param::ROLE, role.as_str()));
        }
        if let Some(part_stat) = self.part_stat {
            property.params.push(Parameter::new(param::PARTSTAT, part_stat.as_str()));
        }
        if let Some(rsvp) = self.rsvp {
            property.params.push(Parameter::rsvp(rsvp));
        }
        let addresses = [
            (param::MEMBER, &self.member),
            (param::DELEGATED_TO, &self.delegated_to),
            (param::DELEGATED_FROM, &self.delegated_from),
        ];
        for (key, value) in addresses {
            if let Some(value) = value {
                property
                    .params
                    .push(Parameter::new(key, format!("{MAILTO}{}", strip_mailto(value))));
            }
        }
        property
    }

    #[must_use]
    pub fn from_property(property: &Property) -> Self {
        let mut attendee = Self {
            user: CalendarUser::from_property(property),
            ..Self::default()
        };
        for p in &property.params {
            let Some(value) = p.value() else {
                continue;
            };
            match p.name.as_str() {
                param::CUTYPE => attendee.cu_type = CuType::parse(value),
                param::ROLE => attendee.role = Role::parse(value),
                param::PARTSTAT => attendee.part_stat = PartStat::parse(value),
                param::RSVP => attendee.rsvp = Some(value.eq_ignore_ascii_case("TRUE")),
                param::MEMBER => attendee.member = Some(strip_mailto(value).to_string()),
                param::DELEGATED_TO => attendee.delegated_to = Some(strip_mailto(value).to_string()),
                param::DELEGATED_FROM => {
                    attendee.delegated_from = Some(strip_mailto(value).to_string());
                }
                _ => {}
            }
        }
        attendee
    }

    #[must_use]
    pub fn encode_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        self.user.encode_into(&mut meta);
        meta.put_opt(FN_CUTYPE, self.cu_type.map(CuType::code));
        meta.put_opt(FN_ROLE, self.role.map(Role::code));
        meta.put_opt(FN_PARTSTAT, self.part_stat.map(PartStat::code));
        meta.put_opt(FN_RSVP, self.rsvp);
        meta.put_opt(FN_MEMBER, self.member.as_deref());
        meta.put_opt(FN_DELEGATED_TO, self.delegated_to.as_deref());
        meta.put_opt(FN_DELEGATED_FROM, self.delegated_from.as_deref());
        meta
    }

    #[must_use]
    pub fn decode_metadata(meta: &Metadata) -> Self {
        Self {
            user: CalendarUser::decode_from(meta),
            cu_type: meta.get_str(FN_CUTYPE).and_then(CuType::parse),
            role: meta.get_str(FN_ROLE).and_then(Role::parse),
            part_stat: meta.get_str(FN_PARTSTAT).and_then(PartStat::parse),
            rsvp: meta.get_bool(FN_RSVP),
            member: meta.get_str(FN_MEMBER).map(str::to_string),
            delegated_to: meta.get_str(FN_DELEGATED_TO).map(str::to_string),
            delegated_from: meta.get_str(FN_DELEGATED_FROM).map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_matching_ignores_scheme_and_case() {
        assert!(addresses_match("mailto:Alice@Example.com", "alice@example.com"));
        assert!(addresses_match("MAILTO:bob@example.com", "Bob@Example.com"));
        assert!(!addresses_match("alice@example.com", "bob@example.com"));
        assert!(!addresses_match("", ""));
    }

    #[test]
    fn codes_and_wire_values_parse() {
        assert_eq!(PartStat::parse("AC"), Some(PartStat::Accepted));
        assert_eq!(PartStat::parse("needs-action"), Some(PartStat::NeedsAction));
        assert_eq!(Role::parse("REQ-PARTICIPANT"), Some(Role::Required));
        assert_eq!(CuType::parse("ROO"), Some(CuType::Room));
        assert_eq!(PartStat::parse("maybe"), None);
    }

    #[test]
    fn attendee_property_round_trip() {
        let mut attendee = Attendee::new("mailto:bob@example.com")
            .with_role(Role::Optional)
            .with_part_stat(PartStat::Tentative)
            .with_rsvp(true);
        attendee.user.cn = Some("Bob".to_string());
        attendee.user.sent_by = Some("assistant@example.com".to_string());
        attendee.delegated_from = Some("carol@example.com".to_string());
        attendee.user.x_params.push(Parameter::new("X-NUM-GUESTS", "2"));

        let property = attendee.to_property();
        assert_eq!(property.value.as_uri(), Some("mailto:bob@example.com"));
        assert_eq!(property.get_param_value("SENT-BY"), Some("mailto:assistant@example.com"));
        assert_eq!(property.get_param_value("RSVP"), Some("TRUE"));

        assert_eq!(Attendee::from_property(&property), attendee);
    }

    #[test]
    fn attendee_metadata_round_trip() {
        let mut attendee = Attendee::new("dave@example.com").with_part_stat(PartStat::Declined);
        attendee.cu_type = Some(CuType::Resource);
        attendee.member = Some("team@example.com".to_string());
        let meta = attendee.encode_metadata();
        assert_eq!(meta.get_str("a"), Some("dave@example.com"));
        assert_eq!(meta.get_str("p"), Some("DE"));
        assert_eq!(meta.get_str("cut"), Some("RES"));
        assert_eq!(Attendee::decode_metadata(&meta), attendee);
    }

    #[test]
    fn organizer_friendly_address() {
        let organizer = Organizer {
            user: CalendarUser::new("mailto:alice@example.com").with_cn("Alice"),
        };
        assert_eq!(organizer.user.friendly_address(), "\"Alice\" <alice@example.com>");
        assert!(!organizer.has_sent_by());
        assert_eq!(Organizer::decode_metadata(&organizer.encode_metadata()), organizer);
    }
}
