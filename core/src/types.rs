//! Shared primitive types used across the pipeline.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stable, unique identifier for an account.
pub type AccountId = String;

/// Account lifecycle status as reported by the upstream registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Launched,
    Paused,
    Frozen,
    Archived,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Launched => "LAUNCHED",
            AccountStatus::Paused => "PAUSED",
            AccountStatus::Frozen => "FROZEN",
            AccountStatus::Archived => "ARCHIVED",
        }
    }

    /// Unknown statuses map to `Paused` so a registry feed carrying a new
    /// status value degrades instead of failing the sync batch.
    pub fn parse(s: &str) -> Self {
        match s {
            "LAUNCHED" => AccountStatus::Launched,
            "FROZEN" => AccountStatus::Frozen,
            "ARCHIVED" => AccountStatus::Archived,
            _ => AccountStatus::Paused,
        }
    }
}

/// A calendar month key, rendered as `YYYY-MM` everywhere it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        assert!((1..=12).contains(&month), "month out of range: {month}");
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Whole calendar months from `launch` to this month.
    /// A launch inside this month yields 0; negative means pre-launch.
    pub fn months_since(&self, launch: NaiveDate) -> i32 {
        (self.year - launch.year()) * 12 + self.month as i32 - launch.month() as i32
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid month key '{s}'"))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month in '{s}'"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in '{s}'"));
        }
        Ok(Self { year, month })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_boundaries() {
        let feb = MonthKey::new(2024, 2);
        assert_eq!(feb.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(feb.days_in_month(), 29);
        assert_eq!(feb.to_string(), "2024-02");
    }

    #[test]
    fn month_key_wraps_at_year_boundary() {
        let jan = MonthKey::new(2025, 1);
        assert_eq!(jan.prev(), MonthKey::new(2024, 12));
        assert_eq!(MonthKey::new(2024, 12).next(), jan);
    }

    #[test]
    fn months_since_counts_whole_calendar_months() {
        let m = MonthKey::new(2025, 8);
        let launch = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert_eq!(m.months_since(launch), 5);
        assert_eq!(MonthKey::new(2025, 3).months_since(launch), 0);
        assert_eq!(MonthKey::new(2025, 2).months_since(launch), -1);
    }

    #[test]
    fn month_key_parses_and_rejects_garbage() {
        assert_eq!("2025-08".parse::<MonthKey>().unwrap(), MonthKey::new(2025, 8));
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("garbage".parse::<MonthKey>().is_err());
    }
}
