//! Engine knobs derived from the calendar section of the configuration.

use std::str::FromStr;

use chrono_tz::Tz;
use kunai_core::config::CalendarConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Zone used for floating and all-day values when an instant is needed.
    pub default_timezone: Tz,
    pub max_expanded_instances: usize,
    /// Descriptions up to this many bytes are persisted inline.
    pub description_in_metadata_limit: usize,
    pub emit_rdates: bool,
    pub convert_canceled_instances_to_exdates: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_timezone: Tz::UTC,
            max_expanded_instances: 1000,
            description_in_metadata_limit: 4096,
            emit_rdates: true,
            convert_canceled_instances_to_exdates: false,
        }
    }
}

impl From<&CalendarConfig> for EngineSettings {
    fn from(config: &CalendarConfig) -> Self {
        let default_timezone = Tz::from_str(&config.default_timezone).unwrap_or_else(|_| {
            tracing::warn!(
                zone = %config.default_timezone,
                "Unknown default timezone in configuration; using UTC"
            );
            Tz::UTC
        });
        Self {
            default_timezone,
            max_expanded_instances: config.max_expanded_instances,
            description_in_metadata_limit: config.description_in_metadata_limit,
            emit_rdates: config.emit_rdates,
            convert_canceled_instances_to_exdates: config.convert_canceled_instances_to_exdates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_maps_every_knob() {
        let config = CalendarConfig {
            default_timezone: "Europe/Paris".to_string(),
            max_expanded_instances: 50,
            description_in_metadata_limit: 10,
            emit_rdates: false,
            convert_canceled_instances_to_exdates: true,
        };
        let settings = EngineSettings::from(&config);
        assert_eq!(settings.default_timezone, Tz::Europe__Paris);
        assert_eq!(settings.max_expanded_instances, 50);
        assert_eq!(settings.description_in_metadata_limit, 10);
        assert!(!settings.emit_rdates);
        assert!(settings.convert_canceled_instances_to_exdates);
    }

    #[test_log::test]
    fn unknown_zone_falls_back_to_utc() {
        let config = CalendarConfig {
            default_timezone: "Mars/Olympus_Mons".to_string(),
            ..CalendarConfig::default()
        };
        assert_eq!(EngineSettings::from(&config).default_timezone, Tz::UTC);
    }
}
