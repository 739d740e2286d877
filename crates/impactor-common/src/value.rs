use chrono::{Duration as ChronoDur, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────── Excel date-serial utilities ───────────────────
Excel's serial date system:
  Serial 1  = 1900-01-01
  Serial 59 = 1900-02-28
  Serial 60 = 1900-02-29  (phantom – doesn't exist, but Excel thinks it does)
  Serial 61 = 1900-03-01
Base date = 1899-12-31 so that serial 1 = base + 1 day = 1900-01-01.
Time is stored as fractional days (no timezone).
------------------------------------------------------------------- */

/// Base date for the 1900 date system. Serial 1 = base + 1 day = 1900-01-01.
const EXCEL_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1899, 12, 31) {
    Some(d) => d,
    None => panic!("invalid excel epoch"),
};

const PHANTOM_LEAP_DAY: NaiveDate = match NaiveDate::from_ymd_opt(1900, 2, 28) {
    Some(d) => d,
    None => panic!("invalid phantom leap day"),
};

const FIRST_REAL_MARCH: NaiveDate = match NaiveDate::from_ymd_opt(1900, 3, 1) {
    Some(d) => d,
    None => panic!("invalid march boundary"),
};

pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let days = (dt.date() - EXCEL_EPOCH).num_days();
    // Dates on or after 1900-03-01 get +1 to account for phantom Feb 29
    let serial_days = if dt.date() >= FIRST_REAL_MARCH {
        days + 1
    } else {
        days
    };

    let secs_in_day = dt.time().num_seconds_from_midnight() as f64;
    serial_days as f64 + secs_in_day / 86_400.0
}

/// Convert a 1900-system serial into a timestamp.
///
/// Returns `None` for negative or non-finite serials and for values outside
/// chrono's representable range.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let frac_secs = (serial.fract() * 86_400.0).round() as i64;

    // Serial 60 is phantom 1900-02-29; map to 1900-02-28
    let date = if days == 60 {
        PHANTOM_LEAP_DAY
    } else {
        let offset = if days < 60 { days } else { days - 1 };
        EXCEL_EPOCH.checked_add_signed(ChronoDur::try_days(offset)?)?
    };

    // Rounding can push a fraction up to a full day.
    let (date, secs) = if frac_secs >= 86_400 {
        (date.succ_opt()?, frac_secs - 86_400)
    } else {
        (date, frac_secs)
    };
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?;
    Some(date.and_time(time))
}

/// A single spreadsheet cell as seen by the engine.
///
/// Backends map their native cell types onto this enum; everything above the
/// workbook layer reasons only in terms of `CellValue`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Int(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    DateTime(NaiveDateTime),
    /// Spreadsheet error literal such as `#N/A`, kept verbatim.
    Error(String),
}

impl CellValue {
    /// Blank means absent or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Lenient numeric view: numbers as-is, text parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Numeric view used by report arithmetic: anything non-numeric is zero.
    pub fn number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    pub fn as_text(&self) -> String {
        self.to_string()
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellValue::Text(s) => f.write_str(s),
            CellValue::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Error(e) => f.write_str(e),
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Int(value as i64)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn serial_round_trips_modern_dates() {
        let dt = ts(2025, 1, 3, 10, 0);
        let serial = datetime_to_serial(&dt);
        assert_eq!(serial.trunc(), 45660.0);
        assert_eq!(serial_to_datetime(serial), Some(dt));
    }

    #[test]
    fn serial_sixty_is_phantom_leap_day() {
        let dt = serial_to_datetime(60.0).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(1900, 2, 28).unwrap());
        assert!(serial_to_datetime(-1.0).is_none());
        assert!(serial_to_datetime(f64::NAN).is_none());
    }

    #[test]
    fn blank_and_numeric_views() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text("   ".into()).is_blank());
        assert!(!CellValue::Int(0).is_blank());

        assert_eq!(CellValue::Text(" 12.5 ".into()).as_number(), Some(12.5));
        assert_eq!(CellValue::Text("n/a".into()).number_or_zero(), 0.0);
        assert_eq!(CellValue::Boolean(true).as_number(), None);
        assert_eq!(CellValue::Number(f64::NAN).as_number(), None);
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(CellValue::Number(120.0).to_string(), "120");
        assert_eq!(CellValue::Number(-0.05).to_string(), "-0.05");
        assert_eq!(CellValue::Empty.to_string(), "");
    }
}
