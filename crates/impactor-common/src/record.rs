use chrono::{NaiveDate, NaiveDateTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::timestamp::{DAY_END, DAY_START};

/// A mass-impact event as recorded in the source of record.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub id: String,
    pub region: String,
    pub start: NaiveDateTime,
    /// `None` while the incident is still open.
    pub end: Option<NaiveDateTime>,
}

impl Incident {
    pub fn new(
        id: impl Into<String>,
        region: impl Into<String>,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            id: id.into(),
            region: region.into(),
            start,
            end,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whether the incident was active at some point on `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        if date < self.start.date() {
            return false;
        }
        match self.end {
            Some(end) => date <= end.date(),
            None => true,
        }
    }
}

/// A calendar-day-bounded measurement interval.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    pub fn new(date: NaiveDate, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { date, start, end }
    }

    /// `[00:00:00, 23:59:59]` of `date`.
    pub fn full_day(date: NaiveDate) -> Self {
        Self::new(date, date.and_time(DAY_START), date.and_time(DAY_END))
    }
}

/// Metrics derived from one window's report artifact.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsResult {
    pub incident_id: String,
    pub date: NaiveDate,
    pub lost_calls: i64,
    pub excess_ratio: f64,
}

impl MetricsResult {
    pub fn new(
        incident_id: impl Into<String>,
        date: NaiveDate,
        lost_calls: i64,
        excess_ratio: f64,
    ) -> Self {
        Self {
            incident_id: incident_id.into(),
            date,
            lost_calls,
            excess_ratio,
        }
    }

    /// Placeholder written for incidents that are deliberately not measured.
    pub fn zero(incident_id: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(incident_id, date, 0, 0.0)
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
