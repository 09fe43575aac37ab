use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::Serialize;
use thiserror::Error;

use crate::repository::sqlite::FromRow;
use crate::repository::{Column, Entity, FieldValue, Pk, UNSET_PK};

/// Time window a budget limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Day, Period::Week, Period::Month];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    /// Whether `date` falls in the same period as `today`.
    ///
    /// Weeks are ISO weeks, so the last days of December can share a week
    /// with the next January.
    pub fn contains(self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Period::Day => date == today,
            Period::Week => date.iso_week() == today.iso_week(),
            Period::Month => date.year() == today.year() && date.month() == today.month(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown budget period `{0}`")]
pub struct ParsePeriodError(String);

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            _ => Err(ParsePeriodError(s.to_string())),
        }
    }
}

impl FromSql for Period {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

/// Spending limit for a period. Amounts are in cents.
///
/// `spent` only moves through [`Budget::count_in`]; nothing feeds expenses
/// into it automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub amount: i64,
    pub period: Period,
    spent: i64,
    pub pk: Pk,
}

impl Budget {
    pub fn new(amount: i64, period: Period) -> Self {
        Self {
            amount,
            period,
            spent: 0,
            pk: UNSET_PK,
        }
    }

    /// Takes a new expense into account. The total saturates at `i64::MAX`.
    pub fn count_in(&mut self, amount: i64) {
        self.spent = self.spent.saturating_add(amount);
    }

    pub fn spent(&self) -> i64 {
        self.spent
    }
}

impl Entity for Budget {
    const TABLE: &'static str = "budget";
    const COLUMNS: &'static [Column] = &[
        Column::new("amount", "INTEGER NOT NULL"),
        Column::new("period", "TEXT NOT NULL"),
        Column::new("spent", "INTEGER NOT NULL"),
    ];

    fn pk(&self) -> Pk {
        self.pk
    }

    fn with_pk(self, pk: Pk) -> Self {
        Self { pk, ..self }
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.amount.into(),
            self.period.as_str().into(),
            self.spent.into(),
        ]
    }
}

impl FromRow for Budget {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Budget {
            pk: row.get("id")?,
            amount: row.get("amount")?,
            period: row.get("period")?,
            spent: row.get("spent")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn create_budget() {
        let budget = Budget::new(10_000, Period::Day);
        assert_eq!(budget.amount, 10_000);
        assert_eq!(budget.period, Period::Day);
        assert_eq!(budget.spent(), 0);
        assert_eq!(budget.pk, UNSET_PK);
    }

    #[test]
    fn count_in_accumulates() {
        let mut budget = Budget::new(10_000, Period::Month);
        budget.count_in(1_500);
        budget.count_in(250);
        assert_eq!(budget.spent(), 1_750);
        assert_eq!(budget.field("spent"), Some(FieldValue::Integer(1_750)));
    }

    #[test]
    fn count_in_saturates() {
        let mut budget = Budget::new(10_000, Period::Day);
        budget.count_in(i64::MAX - 1);
        budget.count_in(5);
        assert_eq!(budget.spent(), i64::MAX);
    }

    #[test]
    fn period_labels_round_trip() {
        for period in Period::ALL {
            assert_eq!(period.as_str().parse::<Period>(), Ok(period));
        }
        assert_eq!(" Week ".parse::<Period>(), Ok(Period::Week));
        assert!("fortnight".parse::<Period>().is_err());
    }

    #[test]
    fn day_matches_only_today() {
        let today = ymd(2024, 5, 15);
        assert!(Period::Day.contains(today, today));
        assert!(!Period::Day.contains(ymd(2024, 5, 14), today));
        assert!(!Period::Day.contains(ymd(2023, 5, 15), today));
    }

    #[test]
    fn week_uses_iso_weeks() {
        // 2024-05-15 is a Wednesday; its ISO week runs Monday 13th to Sunday 19th.
        let today = ymd(2024, 5, 15);
        assert!(Period::Week.contains(ymd(2024, 5, 13), today));
        assert!(Period::Week.contains(ymd(2024, 5, 19), today));
        assert!(!Period::Week.contains(ymd(2024, 5, 12), today));
        assert!(!Period::Week.contains(ymd(2023, 5, 17), today));

        // 2024-12-30 belongs to ISO week 1 of 2025.
        assert!(Period::Week.contains(ymd(2024, 12, 30), ymd(2025, 1, 2)));
    }

    #[test]
    fn month_needs_same_year() {
        let today = ymd(2024, 5, 15);
        assert!(Period::Month.contains(ymd(2024, 5, 1), today));
        assert!(Period::Month.contains(ymd(2024, 5, 31), today));
        assert!(!Period::Month.contains(ymd(2024, 4, 30), today));
        assert!(!Period::Month.contains(ymd(2023, 5, 15), today));
    }
}
