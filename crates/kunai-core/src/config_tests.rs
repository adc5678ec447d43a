//! Tests for configuration loading.

use super::*;

#[test_log::test]
fn defaults_apply_without_sources() {
    tracing::debug!("Loading settings from an inline empty TOML source");

    let settings = Settings::load_from(config::File::from_str("", config::FileFormat::Toml))
        .expect("defaults should deserialize");

    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.calendar.default_timezone, "UTC");
    assert_eq!(settings.calendar.max_expanded_instances, 1000);
    assert_eq!(settings.calendar.description_in_metadata_limit, 4096);
    assert!(settings.calendar.emit_rdates);
    assert!(!settings.calendar.convert_canceled_instances_to_exdates);
}

#[test_log::test]
fn file_values_override_defaults() {
    let toml = r#"
        [logging]
        level = "warn"

        [calendar]
        default_timezone = "Europe/Berlin"
        max_expanded_instances = 50
        emit_rdates = false
    "#;

    let settings = Settings::load_from(config::File::from_str(toml, config::FileFormat::Toml))
        .expect("file source should deserialize");

    tracing::debug!(settings = ?settings, "Loaded settings");

    assert_eq!(settings.logging.level, "warn");
    assert_eq!(settings.calendar.default_timezone, "Europe/Berlin");
    assert_eq!(settings.calendar.max_expanded_instances, 50);
    assert!(!settings.calendar.emit_rdates);
    assert_eq!(settings.calendar.description_in_metadata_limit, 4096);
}

#[test]
fn calendar_config_default_matches_loader_defaults() {
    let config = CalendarConfig::default();
    let cloned = config.clone();

    assert_eq!(cloned.default_timezone, config.default_timezone);
    assert_eq!(cloned.max_expanded_instances, config.max_expanded_instances);
}

#[test]
fn zero_expansion_cap_is_rejected() {
    let toml = r#"
        [calendar]
        max_expanded_instances = 0
    "#;

    let err = Settings::load_from(config::File::from_str(toml, config::FileFormat::Toml))
        .expect_err("zero cap should be rejected");
    tracing::debug!(error = %err, "Rejected settings");
    assert!(err.to_string().contains("calendar.max_expanded_instances"));

    let blank = CalendarConfig {
        default_timezone: " ".to_string(),
        ..CalendarConfig::default()
    };
    assert!(matches!(
        blank.validate(),
        Err(CoreError::InvalidSetting { key: "calendar.default_timezone", .. })
    ));
}
