use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a timestamp as stored by SQLite. `datetime('now')` yields
/// "YYYY-MM-DD HH:MM:SS" without a timezone, so RFC3339 is tried first and
/// the naive form is interpreted as UTC.
pub fn parse_sqlite_datetime(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_naive_form() {
        let dt = parse_sqlite_datetime("2026-08-06 12:34:56").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-08-06T12:34:56+00:00");
    }

    #[test]
    fn parses_rfc3339() {
        assert!(parse_sqlite_datetime("2026-08-06T12:34:56Z").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_sqlite_datetime("not a time").is_none());
    }
}
