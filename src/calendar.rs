//! The calendar maps dates to day types and picks out the two modelled days.
use crate::input::{input_err_msg, read_csv_optional};
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDate;
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::warn;
use serde::Deserialize;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::path::Path;

const CALENDAR_FILE_NAME: &str = "calendar.csv";

/// The classification of a calendar date
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
pub enum DayType {
    /// A statutory public holiday
    #[string = "holiday"]
    Holiday,
    /// A non-working day which firms may adopt in exchange for making up the hours later
    #[string = "bridge"]
    Bridge,
    /// Any other day (not modelled)
    #[string = "ordinary"]
    Ordinary,
}

impl DayType {
    /// The day types for which decisions are modelled, in the order they are evaluated
    pub const MODELLED: [DayType; 2] = [DayType::Holiday, DayType::Bridge];
}

/// Represents a row of the calendar CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct CalendarEntryRaw {
    date: NaiveDate,
    day_type: DayType,
}

/// The model calendar
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    /// Every date listed, in file order
    pub days: IndexMap<NaiveDate, DayType>,
    pub(crate) holiday: NaiveDate,
    pub(crate) bridge: NaiveDate,
}

impl Calendar {
    /// Build a calendar from (date, day type) pairs.
    ///
    /// Dates must be unique and there must be exactly one holiday and exactly one bridge day.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDate, DayType)>,
    {
        let mut days = IndexMap::new();
        for (date, day_type) in entries {
            match days.entry(date) {
                Entry::Occupied(_) => bail!("Date {date} appears more than once"),
                Entry::Vacant(entry) => {
                    entry.insert(day_type);
                }
            }
        }

        let holiday = single_date_of_type(&days, DayType::Holiday)?;
        let bridge = single_date_of_type(&days, DayType::Bridge)?;

        Ok(Self {
            days,
            holiday,
            bridge,
        })
    }

    /// The calendar used when a model does not supply one: New Year's Day 2026 and the Friday after
    pub fn new_year_2026() -> Result<Self> {
        let date = |day| NaiveDate::from_ymd_opt(2026, 1, day).context("Invalid date");
        Self::from_entries([(date(1)?, DayType::Holiday), (date(2)?, DayType::Bridge)])
    }

    /// The date of the given modelled day.
    ///
    /// # Panics
    ///
    /// Panics if `day_type` is [`DayType::Ordinary`], which is never modelled.
    pub fn date_of(&self, day_type: DayType) -> NaiveDate {
        match day_type {
            DayType::Holiday => self.holiday,
            DayType::Bridge => self.bridge,
            DayType::Ordinary => panic!("Ordinary days are not modelled"),
        }
    }

    /// Look up the day type of a date, if it is in the calendar
    pub fn day_type(&self, date: NaiveDate) -> Option<DayType> {
        self.days.get(&date).copied()
    }

    /// Iterate over the modelled days as (date, day type) pairs
    pub fn modelled_days(&self) -> impl Iterator<Item = (NaiveDate, DayType)> + '_ {
        DayType::MODELLED
            .into_iter()
            .map(|day_type| (self.date_of(day_type), day_type))
    }
}

/// Find the one date with the given day type
fn single_date_of_type(days: &IndexMap<NaiveDate, DayType>, day_type: DayType) -> Result<NaiveDate> {
    let mut dates = days
        .iter()
        .filter(|(_, dt)| **dt == day_type)
        .map(|(date, _)| *date);
    let date = dates
        .next()
        .with_context(|| format!("Calendar must contain a {day_type} date"))?;
    ensure!(
        dates.next().is_none(),
        "Calendar must contain exactly one {day_type} date"
    );

    Ok(date)
}

/// Read the calendar from the model directory.
///
/// The calendar file is optional. If it is absent, [`Calendar::new_year_2026`] is used.
pub fn read_calendar(model_dir: &Path) -> Result<Calendar> {
    let file_path = model_dir.join(CALENDAR_FILE_NAME);
    let Some(entries) = read_csv_optional::<CalendarEntryRaw>(&file_path)? else {
        warn!("No {CALENDAR_FILE_NAME} found; using 2026-01-01 (holiday) and 2026-01-02 (bridge)");
        return Calendar::new_year_2026();
    };

    Calendar::from_entries(entries.into_iter().map(|e| (e.date, e.day_type)))
        .with_context(|| input_err_msg(&file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_read_calendar() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(CALENDAR_FILE_NAME)).unwrap();
            writeln!(
                file,
                "date,day_type\n2025-12-31,ordinary\n2026-01-01,holiday\n2026-01-02,bridge"
            )
            .unwrap();
        }

        let calendar = read_calendar(dir.path()).unwrap();
        assert_eq!(calendar.days.len(), 3);
        assert_eq!(calendar.date_of(DayType::Holiday), date("2026-01-01"));
        assert_eq!(calendar.date_of(DayType::Bridge), date("2026-01-02"));
        assert_eq!(
            calendar.day_type(date("2025-12-31")),
            Some(DayType::Ordinary)
        );
        assert_eq!(calendar.day_type(date("2026-03-01")), None);
    }

    #[test]
    fn test_read_calendar_missing_file() {
        let dir = tempdir().unwrap();
        assert_eq!(
            read_calendar(dir.path()).unwrap(),
            Calendar::new_year_2026().unwrap()
        );
    }

    #[test]
    fn test_from_entries_duplicate_date() {
        let entries = [
            (date("2026-01-01"), DayType::Holiday),
            (date("2026-01-01"), DayType::Bridge),
        ];
        assert_error!(
            Calendar::from_entries(entries),
            "Date 2026-01-01 appears more than once"
        );
    }

    #[test]
    fn test_from_entries_two_holidays() {
        let entries = [
            (date("2026-01-01"), DayType::Holiday),
            (date("2026-07-28"), DayType::Holiday),
            (date("2026-01-02"), DayType::Bridge),
        ];
        assert_error!(
            Calendar::from_entries(entries),
            "Calendar must contain exactly one holiday date"
        );
    }

    #[test]
    fn test_from_entries_no_bridge() {
        let entries = [(date("2026-01-01"), DayType::Holiday)];
        assert_error!(
            Calendar::from_entries(entries),
            "Calendar must contain a bridge date"
        );
    }

    #[test]
    fn test_modelled_days() {
        let calendar = Calendar::new_year_2026().unwrap();
        let days: Vec<_> = calendar.modelled_days().collect();
        assert_eq!(
            days,
            [
                (date("2026-01-01"), DayType::Holiday),
                (date("2026-01-02"), DayType::Bridge)
            ]
        );
    }
}
