use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Carebook";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default cancellation cutoff: patients may cancel up to 24 hours before start.
pub const DEFAULT_CANCELLATION_CUTOFF_HOURS: i64 = 24;

/// Upper bound for the cutoff (one year).
pub const MAX_CANCELLATION_CUTOFF_HOURS: i64 = 24 * 366;

/// Env override for the cancellation cutoff, in whole hours.
pub const ENV_CANCEL_CUTOFF_HOURS: &str = "CAREBOOK_CANCEL_CUTOFF_HOURS";

/// Env override for whether rejected/cancelled appointments free their slot.
pub const ENV_RELEASE_CLOSED_SLOTS: &str = "CAREBOOK_RELEASE_CLOSED_SLOTS";

/// Get the application data directory.
/// ~/Carebook/ on all platforms. Falls back to the working directory
/// when no home directory can be determined (containers, CI).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the scheduling database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("carebook.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "carebook=info,warn"
}

/// Business-rule knobs for the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Minimum distance between "now" and the scheduled start for a patient cancel.
    pub cancellation_cutoff_hours: i64,
    /// When true, REJECTED and CANCELLED appointments no longer block their
    /// caregiver's interval. Off by default: every stored appointment counts.
    pub release_closed_slots: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            cancellation_cutoff_hours: DEFAULT_CANCELLATION_CUTOFF_HOURS,
            release_closed_slots: false,
        }
    }
}

impl SchedulingConfig {
    /// Defaults overlaid with `CAREBOOK_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning rather than failing startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(ENV_CANCEL_CUTOFF_HOURS) {
            match parse_cutoff_hours(&raw) {
                Some(hours) => config.cancellation_cutoff_hours = hours,
                None => tracing::warn!(value = %raw, "Ignoring invalid {ENV_CANCEL_CUTOFF_HOURS}"),
            }
        }

        if let Ok(raw) = std::env::var(ENV_RELEASE_CLOSED_SLOTS) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.release_closed_slots = true,
                "0" | "false" | "no" => config.release_closed_slots = false,
                _ => tracing::warn!(value = %raw, "Ignoring invalid {ENV_RELEASE_CLOSED_SLOTS}"),
            }
        }

        config
    }

    /// The cutoff as a duration, clamped to `0..=MAX_CANCELLATION_CUTOFF_HOURS`.
    pub fn cancellation_cutoff(&self) -> chrono::Duration {
        let hours = self
            .cancellation_cutoff_hours
            .clamp(0, MAX_CANCELLATION_CUTOFF_HOURS);
        chrono::Duration::hours(hours)
    }
}

/// Whole hours in `0..=MAX_CANCELLATION_CUTOFF_HOURS`.
fn parse_cutoff_hours(raw: &str) -> Option<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|hours| (0..=MAX_CANCELLATION_CUTOFF_HOURS).contains(hours))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("carebook.db"));
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with("Carebook"));
    }

    #[test]
    fn default_cutoff_is_24_hours() {
        let config = SchedulingConfig::default();
        assert_eq!(config.cancellation_cutoff(), chrono::Duration::hours(24));
        assert!(!config.release_closed_slots);
    }

    #[test]
    fn cutoff_hours_parsing() {
        assert_eq!(parse_cutoff_hours(" 48 "), Some(48));
        assert_eq!(parse_cutoff_hours("0"), Some(0));
        assert_eq!(parse_cutoff_hours("-1"), None);
        assert_eq!(parse_cutoff_hours("99999999999999999"), None);
        assert_eq!(parse_cutoff_hours("tomorrow"), None);
    }

    #[test]
    fn oversized_cutoff_is_clamped() {
        let config = SchedulingConfig {
            cancellation_cutoff_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(
            config.cancellation_cutoff(),
            chrono::Duration::hours(MAX_CANCELLATION_CUTOFF_HOURS)
        );

        let negative = SchedulingConfig {
            cancellation_cutoff_hours: -5,
            ..Default::default()
        };
        assert_eq!(negative.cancellation_cutoff(), chrono::Duration::zero());
    }

    #[test]
    fn config_serializes_to_json() {
        let json = serde_json::to_value(SchedulingConfig::default()).unwrap();
        assert_eq!(json["cancellation_cutoff_hours"], 24);
        assert_eq!(json["release_closed_slots"], false);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
