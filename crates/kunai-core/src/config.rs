use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Knobs consumed by the invite engine.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    /// Zone used for floating and date-only values when an instant is needed.
    pub default_timezone: String,
    /// Upper bound on occurrences produced by a single expansion.
    pub max_expanded_instances: usize,
    /// Descriptions up to this many bytes are kept inline in persisted metadata.
    pub description_in_metadata_limit: usize,
    /// Emit explicit add-dates (`RDATE`) in calendar output.
    pub emit_rdates: bool,
    /// Fold canceled exception instances into `EXDATE`s of their series by default.
    pub convert_canceled_instances_to_exdates: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
            max_expanded_instances: 1000,
            description_in_metadata_limit: 4096,
            emit_rdates: true,
            convert_canceled_instances_to_exdates: false,
        }
    }
}

impl CalendarConfig {
    /// ## Summary
    /// Checks the knobs the engine cannot work without.
    ///
    /// ## Errors
    /// Returns [`CoreError::InvalidSetting`] for an empty default zone or a
    /// zero expansion cap.
    pub fn validate(&self) -> CoreResult<()> {
        if self.default_timezone.trim().is_empty() {
            return Err(CoreError::InvalidSetting {
                key: "calendar.default_timezone",
                reason: "must name a time zone".to_string(),
            });
        }
        if self.max_expanded_instances == 0 {
            return Err(CoreError::InvalidSetting {
                key: "calendar.max_expanded_instances",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `config.toml` values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        Self::load_from(config::File::with_name("config.toml").required(false))
    }

    /// ## Summary
    /// Loads configuration with an explicit file source layered under the environment.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load_from<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = CalendarConfig::default();
        let settings = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("calendar.default_timezone", defaults.default_timezone)?
            .set_default(
                "calendar.max_expanded_instances",
                u64::try_from(defaults.max_expanded_instances)?,
            )?
            .set_default(
                "calendar.description_in_metadata_limit",
                u64::try_from(defaults.description_in_metadata_limit)?,
            )?
            .set_default("calendar.emit_rdates", defaults.emit_rdates)?
            .set_default(
                "calendar.convert_canceled_instances_to_exdates",
                defaults.convert_canceled_instances_to_exdates,
            )?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("KUNAI")
                    .convert_case(config::Case::Snake)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;
        settings.calendar.validate()?;
        Ok(settings)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
