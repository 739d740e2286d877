//! Timestamp parsing for source-of-record cells.
//!
//! Incident start/end cells arrive either as text in an operator-chosen
//! format (`dd.mm.yyyy hh:mm` by convention) or as native spreadsheet date
//! serials. Both collapse to a naive local timestamp; no timezone conversion
//! is ever applied.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::value::{CellValue, serial_to_datetime};

/// Text formats tried, in order, when no explicit list is configured.
pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Date-only formats used for day columns and as a last resort for timestamps.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];

pub const DAY_START: NaiveTime = NaiveTime::MIN;

pub const DAY_END: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(t) => t,
    None => panic!("invalid end-of-day time"),
};

/// Parse a cell into a timestamp using `formats` for text cells.
///
/// Date-only text falls back to midnight. Numeric cells are treated as
/// spreadsheet serials.
pub fn parse_timestamp<S: AsRef<str>>(value: &CellValue, formats: &[S]) -> Option<NaiveDateTime> {
    match value {
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::Int(i) => serial_to_datetime(*i as f64),
        CellValue::Number(n) => serial_to_datetime(*n),
        CellValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            formats
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f.as_ref()).ok())
                .or_else(|| parse_date_text(s).map(|d| d.and_time(DAY_START)))
        }
        _ => None,
    }
}

/// Parse a day-only cell. Timestamps are accepted and truncated to their date.
pub fn parse_date<S: AsRef<str>>(value: &CellValue, formats: &[S]) -> Option<NaiveDate> {
    match value {
        CellValue::Text(s) => {
            parse_date_text(s.trim()).or_else(|| parse_timestamp(value, formats).map(|dt| dt.date()))
        }
        other => parse_timestamp(other, formats).map(|dt| dt.date()),
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    DEFAULT_DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::datetime_to_serial;

    fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn parses_operator_text_format() {
        let cell = CellValue::Text("01.01.2025 09:00".into());
        assert_eq!(
            parse_timestamp(&cell, DEFAULT_TIMESTAMP_FORMATS),
            Some(ts(2025, 1, 1, 9, 0))
        );
    }

    #[test]
    fn parses_native_serial() {
        let expected = ts(2025, 1, 3, 10, 0);
        let cell = CellValue::Number(datetime_to_serial(&expected));
        assert_eq!(parse_timestamp(&cell, DEFAULT_TIMESTAMP_FORMATS), Some(expected));
    }

    #[test]
    fn blank_and_garbage_are_absent() {
        assert_eq!(parse_timestamp(&CellValue::Empty, DEFAULT_TIMESTAMP_FORMATS), None);
        assert_eq!(
            parse_timestamp(&CellValue::Text("  ".into()), DEFAULT_TIMESTAMP_FORMATS),
            None
        );
        assert_eq!(
            parse_timestamp(&CellValue::Text("soon".into()), DEFAULT_TIMESTAMP_FORMATS),
            None
        );
    }

    #[test]
    fn day_cells_accept_dates_and_timestamps() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(
            parse_date(&CellValue::Text("02.01.2025".into()), DEFAULT_TIMESTAMP_FORMATS),
            Some(day)
        );
        assert_eq!(
            parse_date(
                &CellValue::Text("02.01.2025 17:30".into()),
                DEFAULT_TIMESTAMP_FORMATS
            ),
            Some(day)
        );
    }
}
