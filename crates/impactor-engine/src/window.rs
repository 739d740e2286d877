//! Calendar-day windows over an incident interval.

use chrono::{Days, NaiveDate, NaiveDateTime};
use impactor_common::{DAY_END, DAY_START, Incident, Window};

/// Split `[start, end]` into one window per calendar day.
///
/// A same-day interval yields exactly `[start, end]`. Otherwise the first
/// day runs from `start` to 23:59:59, the last from midnight to `end`, and
/// every day in between is a full day. An `end` before `start` yields no
/// windows.
pub fn split_incident_into_windows(start: NaiveDateTime, end: NaiveDateTime) -> Vec<Window> {
    if end < start {
        return Vec::new();
    }
    let first = start.date();
    let last = end.date();
    if first == last {
        return vec![Window::new(first, start, end)];
    }

    let mut windows = Vec::new();
    let mut date = first;
    while date <= last {
        let window_start = if date == first {
            start
        } else {
            date.and_time(DAY_START)
        };
        let window_end = if date == last {
            end
        } else {
            date.and_time(DAY_END)
        };
        windows.push(Window::new(date, window_start, window_end));
        date = match date.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    windows
}

/// The window of `incident` on `target_date`.
///
/// Starts at the incident start when it falls on that day, otherwise at
/// midnight; ends at the incident end when it falls on that day, otherwise
/// at 23:59:59 (which covers open incidents).
pub fn window_for_date(incident: &Incident, target_date: NaiveDate) -> Window {
    let start = if incident.start.date() == target_date {
        incident.start
    } else {
        target_date.and_time(DAY_START)
    };
    let end = match incident.end {
        Some(end) if end.date() == target_date => end,
        _ => target_date.and_time(DAY_END),
    };
    Window::new(target_date, start, end)
}
