use std::{fmt, str::FromStr};

use jiff::{Span, Zoned, civil::Date};
use thiserror::Error;

use crate::models::weekday::Weekday;

/// A concrete calendar day in the local calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Day(Date);

#[derive(Debug, Error)]
pub enum DayError {
    #[error("Invalid date '{input}' (expected YYYY-MM-DD): {reason}")]
    Invalid { input: String, reason: String },
}

impl Day {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    /// The current civil date in the system time zone.
    pub fn today() -> Self {
        Self(Zoned::now().date())
    }

    pub fn date(self) -> Date {
        self.0
    }

    pub fn weekday(self) -> Weekday {
        Weekday::from_sunday_offset(self.0.weekday().to_sunday_zero_offset())
    }

    pub fn checked_add_days(self, days: i64) -> Option<Day> {
        let span = Span::new().try_days(days).ok()?;
        self.0.checked_add(span).ok().map(Day)
    }

    /// Moves forward by `days`. Stays put when the result would leave the
    /// supported calendar range.
    pub fn add_days(self, days: i64) -> Day {
        self.checked_add_days(days).unwrap_or(self)
    }

    pub fn sub_days(self, days: i64) -> Day {
        days.checked_neg()
            .and_then(|back| self.checked_add_days(back))
            .unwrap_or(self)
    }

    /// Stable `YYYY-MM-DD` key used to index completion history.
    ///
    /// Years outside 1..=9999 cannot be written as a four digit year and have
    /// no key.
    pub fn date_key(self) -> Option<String> {
        let year = self.0.year();
        if !(1..=9999).contains(&year) {
            return None;
        }
        Some(format!(
            "{:04}-{:02}-{:02}",
            year,
            self.0.month(),
            self.0.day()
        ))
    }
}

impl From<Date> for Day {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl FromStr for Day {
    type Err = DayError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        input
            .trim()
            .parse::<Date>()
            .map(Day)
            .map_err(|e| DayError::Invalid {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.strftime("%A, %b %d %Y"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;

    fn monday() -> Day {
        Day::new(date(2018, 12, 24))
    }

    #[test]
    fn test_weekday_index_is_sunday_based() {
        assert_eq!(monday().weekday(), Weekday::MONDAY);
        assert_eq!(monday().sub_days(1).weekday(), Weekday::SUNDAY);
        assert_eq!(monday().add_days(5).weekday(), Weekday::SATURDAY);
    }

    #[test]
    fn test_arithmetic_crosses_month_and_year() {
        let day = monday().add_days(8);
        assert_eq!(day.date(), date(2019, 1, 1));
        assert_eq!(day.sub_days(8), monday());
    }

    #[test]
    fn test_date_key_is_zero_padded() {
        assert_eq!(
            Day::new(date(2019, 3, 7)).date_key().as_deref(),
            Some("2019-03-07")
        );
        assert_eq!(monday().date_key().as_deref(), Some("2018-12-24"));
    }

    #[test]
    fn test_date_key_rejects_years_outside_four_digits() {
        assert_eq!(Day::new(date(0, 6, 1)).date_key(), None);
        assert_eq!(Day::new(date(-5, 6, 1)).date_key(), None);
    }

    #[test]
    fn test_arithmetic_at_range_edge_stays_put() {
        let last = Day::new(Date::MAX);
        assert_eq!(last.add_days(1), last);
        assert_eq!(last.add_days(i64::MAX), last);
        assert_eq!(Day::new(Date::MIN).sub_days(i64::MIN), Day::new(Date::MIN));
    }

    #[test]
    fn test_parse() {
        let day: Day = "2018-12-24".parse().unwrap();
        assert_eq!(day, monday());
        assert!(matches!(
            "24/12/2018".parse::<Day>(),
            Err(DayError::Invalid { .. })
        ));
    }
}
