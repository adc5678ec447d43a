//! iCalendar component types (RFC 5545 §3.4-3.6).

use super::{Property, Value};

/// Component kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Calendar,
    Event,
    Todo,
    Timezone,
    Alarm,
    /// STANDARD observance of a VTIMEZONE.
    Standard,
    /// DAYLIGHT observance of a VTIMEZONE.
    Daylight,
    /// Anything else, including X-components.
    Unknown,
}

impl ComponentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "VCALENDAR",
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Timezone => "VTIMEZONE",
            Self::Alarm => "VALARM",
            Self::Standard => "STANDARD",
            Self::Daylight => "DAYLIGHT",
            Self::Unknown => "X-UNKNOWN",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "VCALENDAR" => Self::Calendar,
            "VEVENT" => Self::Event,
            "VTODO" => Self::Todo,
            "VTIMEZONE" => Self::Timezone,
            "VALARM" => Self::Alarm,
            "STANDARD" => Self::Standard,
            "DAYLIGHT" => Self::Daylight,
            _ => Self::Unknown,
        }
    }

    /// VEVENT and VTODO carry scheduling semantics.
    #[must_use]
    pub const fn is_schedulable(self) -> bool {
        matches!(self, Self::Event | Self::Todo)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component with its properties and nested sub-components.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub kind: ComponentKind,
    /// Original name, preserved for X-components.
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<Component>,
}

impl Component {
    #[must_use]
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            name: kind.as_str().to_string(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates a component from a name as seen on the wire.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into().to_ascii_uppercase();
        Self {
            kind: ComponentKind::parse(&name),
            name,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn add_property(&mut self, prop: Property) {
        self.properties.push(prop);
    }

    pub fn add_child(&mut self, child: Component) {
        self.children.push(child);
    }

    #[must_use]
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn get_properties(&self, name: &str) -> Vec<&Property> {
        self.properties
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Text payload of the first property with this name.
    #[must_use]
    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.get_property(name)?.as_text()
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.text_of(super::property::names::UID)
    }

    #[must_use]
    pub fn children_of_kind(&self, kind: ComponentKind) -> Vec<&Component> {
        self.children.iter().filter(|c| c.kind == kind).collect()
    }
}

/// Top-level calendar object wrapping a VCALENDAR component.
#[derive(Debug, Clone, PartialEq)]
pub struct ICalendar {
    pub root: Component,
}

impl ICalendar {
    /// Creates an empty VCALENDAR with VERSION and PRODID.
    #[must_use]
    pub fn new(prodid: impl Into<String>) -> Self {
        let mut root = Component::new(ComponentKind::Calendar);
        root.add_property(Property::text(super::property::names::VERSION, "2.0"));
        root.add_property(Property::text(super::property::names::PRODID, prodid));
        Self { root }
    }

    #[must_use]
    pub fn prodid(&self) -> Option<&str> {
        self.root.text_of(super::property::names::PRODID)
    }

    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.root.text_of(super::property::names::METHOD)
    }

    pub fn set_method(&mut self, method: &str) {
        self.root
            .properties
            .retain(|p| !p.name.eq_ignore_ascii_case(super::property::names::METHOD));
        self.root.add_property(Property::new(
            super::property::names::METHOD,
            Value::Text(method.to_string()),
        ));
    }

    pub fn add_component(&mut self, component: Component) {
        self.root.add_child(component);
    }

    #[must_use]
    pub fn timezones(&self) -> Vec<&Component> {
        self.root.children_of_kind(ComponentKind::Timezone)
    }

    /// VEVENT and VTODO children in document order.
    #[must_use]
    pub fn schedulable(&self) -> Vec<&Component> {
        self.root
            .children
            .iter()
            .filter(|c| c.kind.is_schedulable())
            .collect()
    }
}

impl Default for ICalendar {
    fn default() -> Self {
        Self::new(kunai_core::constants::PRODID)
    }
}
