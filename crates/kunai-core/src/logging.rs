//! Tracing subscriber bootstrap shared by binaries and test harnesses.

use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use crate::error::{CoreError, CoreResult};

/// Handle used to swap the active filter once configuration is known.
pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// ## Summary
/// Installs the global subscriber with a reloadable filter starting at `initial_level`.
///
/// ## Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(initial_level: &str) -> CoreResult<FilterHandle> {
    let (filter_layer, filter_handle) = reload::Layer::new(build_filter(initial_level));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| CoreError::ConfigError(format!("tracing already initialized: {e}")))?;

    Ok(filter_handle)
}

/// ## Summary
/// Parses a filter directive, falling back to `info` when it is invalid.
#[must_use]
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|e| {
        tracing::warn!(error = %e, level = %level, "Invalid log level, using info");
        EnvFilter::new("info")
    })
}

/// ## Summary
/// Replaces the active filter with `level` from configuration.
///
/// ## Side Effects
/// Keeps the previous filter and logs a warning if `level` does not parse.
pub fn apply_level(handle: &FilterHandle, level: &str) {
    match EnvFilter::try_new(level) {
        Ok(filter) => {
            if let Err(e) = handle.modify(|current| *current = filter) {
                tracing::warn!(error = %e, "Failed to update log filter from config");
            }
        }
        Err(_) => {
            tracing::warn!(level = %level, "Invalid log level in config, keeping current filter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_filter_accepts_directives() {
        let filter = build_filter("kunai_invite=debug,warn");
        assert!(filter.to_string().contains("kunai_invite=debug"));
    }

    #[test]
    fn build_filter_falls_back_on_garbage() {
        let filter = build_filter("[[not a directive");
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn apply_level_swaps_or_keeps_filter() {
        let (layer, handle): (_, FilterHandle) = reload::Layer::new(build_filter("info"));

        apply_level(&handle, "debug");
        let current = handle.with_current(ToString::to_string).expect("layer alive");
        assert_eq!(current, "debug");

        apply_level(&handle, "[[not a directive");
        let kept = handle.with_current(ToString::to_string).expect("layer alive");
        assert_eq!(kept, "debug");

        drop(layer);
    }
}
