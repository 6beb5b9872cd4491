//! `HH:MM` wall-clock values.
//!
//! Times of day are exchanged and stored as 24-hour, zero-padded `HH:MM`
//! strings. Zero padding keeps the stored form lexicographically ordered.

use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;

pub const HHMM_FORMAT: &str = "%H:%M";

static HHMM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[01]\d|2[0-3]):[0-5]\d$").unwrap());

/// Parse a strict `HH:MM` string. `9:00`, `24:00` and `09:00:00` are rejected.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    if !HHMM_PATTERN.is_match(s) {
        return None;
    }
    NaiveTime::parse_from_str(s, HHMM_FORMAT).ok()
}

pub fn format_hhmm(t: &NaiveTime) -> String {
    t.format(HHMM_FORMAT).to_string()
}

/// Serde adapter for `NaiveTime` fields carried as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_hhmm(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_hhmm(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid HH:MM time: {raw}")))
    }
}
