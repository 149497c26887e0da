use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical weekday ordering. The position of a name is its index.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Day-of-week index: 0 is Sunday, 6 is Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Weekday(u8);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WeekdayError {
    #[error("Weekday index {0} is out of range (expected 0-6, Sunday first)")]
    OutOfRange(u8),

    #[error("Unknown weekday '{0}'")]
    UnknownName(String),
}

impl Weekday {
    pub const SUNDAY: Weekday = Weekday(0);
    pub const MONDAY: Weekday = Weekday(1);
    pub const TUESDAY: Weekday = Weekday(2);
    pub const WEDNESDAY: Weekday = Weekday(3);
    pub const THURSDAY: Weekday = Weekday(4);
    pub const FRIDAY: Weekday = Weekday(5);
    pub const SATURDAY: Weekday = Weekday(6);

    pub fn new(index: u8) -> Result<Weekday, WeekdayError> {
        if (index as usize) < WEEKDAY_NAMES.len() {
            Ok(Weekday(index))
        } else {
            Err(WeekdayError::OutOfRange(index))
        }
    }

    /// Maps a Sunday-based offset onto the closed 0-6 index space.
    pub fn from_sunday_offset(offset: i8) -> Weekday {
        Weekday(offset.rem_euclid(7) as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        WEEKDAY_NAMES[self.0 as usize]
    }

    pub fn short_name(self) -> &'static str {
        &self.name()[..3]
    }

    /// All seven weekdays in canonical order.
    pub fn all() -> impl Iterator<Item = Weekday> {
        (0..WEEKDAY_NAMES.len() as u8).map(Weekday)
    }
}

impl TryFrom<u8> for Weekday {
    type Error = WeekdayError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Weekday::new(index)
    }
}

impl From<Weekday> for u8 {
    fn from(weekday: Weekday) -> u8 {
        weekday.0
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weekday {
    type Err = WeekdayError;

    /// Accepts an index (`0`-`6`), a full name or a three-letter abbreviation,
    /// ignoring case.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if let Ok(index) = trimmed.parse::<u8>() {
            return Weekday::new(index);
        }

        let lowered = trimmed.to_lowercase();
        Weekday::all()
            .find(|day| {
                let name = day.name().to_lowercase();
                lowered == name || (lowered.len() == 3 && name.starts_with(&lowered))
            })
            .ok_or_else(|| WeekdayError::UnknownName(trimmed.to_string()))
    }
}

/// The full 0-6 set.
pub fn all_days() -> BTreeSet<Weekday> {
    Weekday::all().collect()
}

/// Parse a comma separated list such as `mon,wed,5` or `all`.
///
/// Blank input yields an empty set; rejecting it is left to the caller.
pub fn parse_weekdays(input: &str) -> Result<BTreeSet<Weekday>, WeekdayError> {
    let mut days = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.to_lowercase().as_str() {
            "all" | "everyday" | "every-day" => days.extend(Weekday::all()),
            _ => {
                days.insert(part.parse::<Weekday>()?);
            }
        }
    }
    Ok(days)
}

/// Human readable schedule, e.g. "Every day", "Weekdays" or "Mon, Thu".
pub fn describe_days(days: &BTreeSet<Weekday>) -> String {
    if days.is_empty() {
        return "Never".to_string();
    }
    if days.len() == WEEKDAY_NAMES.len() {
        return "Every day".to_string();
    }
    let weekdays: BTreeSet<Weekday> = (1..=5).map(Weekday).collect();
    if *days == weekdays {
        return "Weekdays".to_string();
    }
    days.iter()
        .map(|d| d.short_name())
        .collect::<Vec<_>>()
        .join(", ")
}
