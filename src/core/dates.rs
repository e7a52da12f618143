use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a textual date operand against the fixed set of accepted patterns:
/// date-only, date-time to second precision, date-time to millisecond
/// precision, each optionally "Z"-suffixed. Millisecond fragments shorter
/// than 3 digits are right-padded.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    match trimmed.split_once('.') {
        Some((base, fraction)) => {
            if fraction.is_empty()
                || fraction.len() > 3
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return None;
            }
            let normalized = format!("{base}.{fraction:0<3}");
            NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.3f")
                .ok()
                .map(|dt| dt.and_utc())
        }
        None => NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|dt| dt.and_utc()),
    }
}

/// Parse straight to the indexed representation, UTC epoch milliseconds.
pub fn parse_date_millis(value: &str) -> Option<i64> {
    parse_date(value).map(|dt| dt.timestamp_millis())
}

/// Canonical textual form used in result pages.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_date_only() {
        let parsed = parse_date("2024-03-05").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_seconds_with_and_without_zone() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 11, 22, 33).unwrap();
        assert_eq!(parse_date("2024-03-05T11:22:33").unwrap(), expected);
        assert_eq!(parse_date("2024-03-05T11:22:33Z").unwrap(), expected);
    }

    #[test]
    fn pads_short_millisecond_fragments() {
        let parsed = parse_date("2024-03-05T11:22:33.4Z").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 400);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("2024-03-05T11:22").is_none());
        assert!(parse_date("2024-03-05T11:22:33.12345").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn round_trips_through_format() {
        let date = Utc.with_ymd_and_hms(2030, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(parse_date(&format_date(&date)).unwrap(), date);
    }
}
