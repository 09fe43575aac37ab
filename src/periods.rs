use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{Expense, Period};

/// Spending summed per period, relative to one reference day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodTotals {
    pub day: i64,
    pub week: i64,
    pub month: i64,
}

impl PeriodTotals {
    pub fn collect<'a>(expenses: impl IntoIterator<Item = &'a Expense>, today: NaiveDate) -> Self {
        let mut totals = Self::default();
        for expense in expenses {
            let date = expense.expense_date.date();
            for period in Period::ALL {
                if period.contains(date, today) {
                    let slot = totals.slot(period);
                    *slot = slot.saturating_add(expense.amount);
                }
            }
        }
        totals
    }

    pub fn get(&self, period: Period) -> i64 {
        match period {
            Period::Day => self.day,
            Period::Week => self.week,
            Period::Month => self.month,
        }
    }

    fn slot(&mut self, period: Period) -> &mut i64 {
        match period {
            Period::Day => &mut self.day,
            Period::Week => &mut self.week,
            Period::Month => &mut self.month,
        }
    }
}

/// Spending in one period against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodStatus {
    pub period: Period,
    pub spent: i64,
    pub limit: i64,
}

impl PeriodStatus {
    pub fn over(&self) -> bool {
        self.spent > self.limit
    }
}

/// One status per period, in day, week, month order. Missing limits count as 0.
pub fn statuses(totals: &PeriodTotals, limits: &BTreeMap<Period, i64>) -> Vec<PeriodStatus> {
    Period::ALL
        .into_iter()
        .map(|period| PeriodStatus {
            period,
            spent: totals.get(period),
            limit: limits.get(&period).copied().unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(amount: i64, year: i32, month: u32, day: u32) -> Expense {
        let mut expense = Expense::new(amount, 1);
        expense.expense_date = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        expense
    }

    #[test]
    fn sums_each_window() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let expenses = [
            on(100, 2024, 5, 15),
            on(200, 2024, 5, 13),
            on(400, 2024, 5, 2),
            on(800, 2024, 4, 30),
            on(1600, 2023, 5, 15),
        ];

        let totals = PeriodTotals::collect(&expenses, today);
        assert_eq!(
            totals,
            PeriodTotals {
                day: 100,
                week: 300,
                month: 700,
            }
        );
    }

    #[test]
    fn huge_amounts_saturate() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let expenses = [on(i64::MAX / 2 + 1, 2024, 5, 15), on(i64::MAX / 2 + 1, 2024, 5, 15)];

        let totals = PeriodTotals::collect(&expenses, today);
        assert_eq!(totals.day, i64::MAX);
        assert_eq!(totals.month, i64::MAX);
    }

    #[test]
    fn nothing_spent() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        assert_eq!(PeriodTotals::collect(&Vec::<Expense>::new(), today), PeriodTotals::default());
    }

    #[test]
    fn statuses_flag_overspending() {
        let totals = PeriodTotals {
            day: 500,
            week: 500,
            month: 500,
        };
        let limits = BTreeMap::from([(Period::Day, 400), (Period::Week, 500)]);

        let statuses = statuses(&totals, &limits);
        let over = statuses.iter().map(PeriodStatus::over).collect::<Vec<_>>();
        assert_eq!(over, [true, false, true]);
        assert_eq!(statuses[2].limit, 0);
        assert_eq!(statuses[0].period, Period::Day);
    }
}
