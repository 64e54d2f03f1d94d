use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("`{0}` is not of the form HH:MM-HH:MM")]
    Malformed(String),
    #[error("`{0}` does not end after it starts")]
    Empty(String),
}

/// A weekly class period, e.g. `09:00-11:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl FromStr for TimeSlot {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SlotError::Malformed(s.to_string());
        let (start, end) = s.split_once('-').ok_or_else(malformed)?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M")
            .map_err(|_| malformed())?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M")
            .map_err(|_| malformed())?;
        if end <= start {
            return Err(SlotError::Empty(s.to_string()));
        }
        Ok(TimeSlot { start, end })
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

impl TimeSlot {
    /// The slot placed on a calendar day.
    pub fn on(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        (date.and_time(self.start), date.and_time(self.end))
    }
}

/// Whether two half-open intervals `[a_start, a_end)` and `[b_start, b_end)`
/// share any instant. Intervals that only touch do not overlap.
pub fn overlaps<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && a_end > b_start
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Weekday names as they appear in timetables.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Accepts full names and three letter abbreviations, in any case.
pub fn parse_weekday(day: &str) -> Option<Weekday> {
    let day = day.trim();
    WEEK.into_iter().find(|candidate| {
        let name = weekday_name(*candidate);
        name.eq_ignore_ascii_case(day) || name[..3].eq_ignore_ascii_case(day)
    })
}
