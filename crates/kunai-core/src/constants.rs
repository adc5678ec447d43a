/// Product identity stamped into every emitted calendar object.
pub const PRODUCT_NAME: &str = "Kunai";
pub const PRODUCT_VENDOR: &str = "Kunai Project";
pub const PRODID: &str = const_str::concat!("-//", PRODUCT_VENDOR, "//", PRODUCT_NAME, "//EN");

/// Prefix for the vendor extension properties written by the engine.
pub const X_PROP_PREFIX: &str = "X-KUNAI-";
pub const X_LOCAL_ONLY: &str = const_str::concat!(X_PROP_PREFIX, "LOCAL-ONLY");

/// Outlook interop properties.
pub const X_MS_ALLDAY: &str = "X-MICROSOFT-CDO-ALLDAYEVENT";
pub const X_MS_INTENDED_STATUS: &str = "X-MICROSOFT-CDO-INTENDEDSTATUS";
pub const X_MS_SENDER: &str = "X-MS-OLK-SENDER";
pub const X_ALT_DESC: &str = "X-ALT-DESC";

/// Display name used when a persisted zone lost its identifier.
pub const UNKNOWN_TZID: &str = "unknown time zone";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prodid_is_assembled_at_compile_time() {
        assert_eq!(PRODID, "-//Kunai Project//Kunai//EN");
        assert_eq!(X_LOCAL_ONLY, "X-KUNAI-LOCAL-ONLY");
    }
}
