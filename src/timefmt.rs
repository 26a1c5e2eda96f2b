//! Relative time formatting for thread headers.

use chrono::{DateTime, Duration, Utc};

const UNITS: &[(&str, i64)] = &[
    ("year", 365 * 24 * 3600),
    ("week", 7 * 24 * 3600),
    ("day", 24 * 3600),
    ("hour", 3600),
    ("minute", 60),
    ("second", 1),
];

/// Format the elapsed time since `t` as `just now`, `1 minute ago`,
/// `5 minutes ago`, `2 days ago`, etc., using the largest unit that fits.
pub fn format_since(t: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_ago(now.signed_duration_since(t))
}

fn format_ago(d: Duration) -> String {
    let secs = d.num_seconds();
    for &(name, size) in UNITS {
        let n = secs / size;
        if n >= 1 {
            let plural = if n > 1 { "s" } else { "" };
            return format!("{n} {name}{plural} ago");
        }
    }
    "just now".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_just_now() {
        assert_eq!(format_since(at(1000), at(1000)), "just now");
        assert_eq!(format_since(at(1000), at(1000) + Duration::milliseconds(900)), "just now");
    }

    #[test]
    fn test_singular_units() {
        assert_eq!(format_since(at(0), at(1)), "1 second ago");
        assert_eq!(format_since(at(0), at(60)), "1 minute ago");
        assert_eq!(format_since(at(0), at(3600)), "1 hour ago");
    }

    #[test]
    fn test_plural_units() {
        assert_eq!(format_since(at(0), at(5 * 60)), "5 minutes ago");
        assert_eq!(format_since(at(0), at(2 * 24 * 3600)), "2 days ago");
        assert_eq!(format_since(at(0), at(3 * 7 * 24 * 3600)), "3 weeks ago");
        assert_eq!(format_since(at(0), at(2 * 365 * 24 * 3600)), "2 years ago");
    }

    #[test]
    fn test_largest_unit_wins() {
        // 90 minutes is reported in hours, not minutes.
        assert_eq!(format_since(at(0), at(90 * 60)), "1 hour ago");
    }
}
