use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreError;

/// Storage format for `events.event_date`. Lexicographic order equals date order.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse an RFC 3339 timestamp column.
pub fn parse_timestamp(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            column,
            detail: format!("invalid timestamp {raw:?}: {e}"),
        })
}

/// Parse a `YYYY-MM-DD` date column.
pub fn parse_date(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: format!("invalid date {raw:?}: {e}"),
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timestamp_success() {
        let ts = parse_timestamp("2026-02-14T12:00:00+00:00", "users", "created_at").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-02-14T12:00:00+00:00");
    }

    #[test]
    fn parse_timestamp_failure() {
        let result = parse_timestamp("yesterday", "users", "created_at");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "users", column: "created_at", .. })
        ));
    }

    #[test]
    fn date_roundtrip() {
        let date = parse_date("2024-12-31", "events", "event_date").unwrap();
        assert_eq!(format_date(date), "2024-12-31");
    }

    #[test]
    fn parse_date_failure() {
        let result = parse_date("31.12.2024", "events", "event_date");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "events", column: "event_date", .. })
        ));
    }

    #[test]
    fn stored_dates_sort_lexicographically() {
        let mut raw = vec![
            format_date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()),
            format_date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
            format_date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
        ];
        raw.sort();
        assert_eq!(raw, vec!["2024-02-01", "2024-12-31", "2025-01-02"]);
    }
}
