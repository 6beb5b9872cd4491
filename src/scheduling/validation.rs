use chrono::NaiveTime;

use super::SchedulingError;
use crate::models::time::parse_hhmm;

/// Parse a caller-supplied `HH:MM` value, naming the field on failure.
pub fn parse_time_field(field: &str, raw: &str) -> Result<NaiveTime, SchedulingError> {
    parse_hhmm(raw.trim()).ok_or_else(|| {
        SchedulingError::InvalidArgument(format!(
            "{field} must be a 24-hour HH:MM time, got '{raw}'"
        ))
    })
}

/// Validate an appointment interval: both ends well-formed and `start < end`.
pub fn parse_interval(start: &str, end: &str) -> Result<(NaiveTime, NaiveTime), SchedulingError> {
    let start = parse_time_field("start_time", start)?;
    let end = parse_time_field("end_time", end)?;
    ensure_ordered(start, end)?;
    Ok((start, end))
}

pub fn ensure_ordered(start: NaiveTime, end: NaiveTime) -> Result<(), SchedulingError> {
    if start >= end {
        return Err(SchedulingError::InvalidArgument(
            "start_time must be before end_time".into(),
        ));
    }
    Ok(())
}

/// Trimmed text, or `None` when blank.
pub fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_must_be_ordered() {
        assert!(parse_interval("09:00", "09:30").is_ok());
        assert!(matches!(
            parse_interval("09:30", "09:30"),
            Err(SchedulingError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_interval("10:00", "09:00"),
            Err(SchedulingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn malformed_time_names_field() {
        let err = parse_interval("9am", "10:00").unwrap_err();
        assert!(err.to_string().contains("start_time"));
        let err = parse_interval("09:00", "25:00").unwrap_err();
        assert!(err.to_string().contains("end_time"));
    }

    #[test]
    fn blank_text_is_none() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" flu ")), Some("flu".into()));
    }
}
