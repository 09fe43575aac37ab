use chrono::{Local, NaiveDateTime};
use rusqlite::Row;

use crate::repository::sqlite::FromRow;
use crate::repository::{Column, Entity, FieldValue, Pk, UNSET_PK};

/// A single spending record. Amounts are in cents.
#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub amount: i64,
    pub category: Pk,
    pub expense_date: NaiveDateTime,
    pub comment: String,
    pub pk: Pk,
}

impl Expense {
    /// An expense dated now, with no comment.
    pub fn new(amount: i64, category: Pk) -> Self {
        Self {
            amount,
            category,
            expense_date: Local::now().naive_local(),
            comment: String::new(),
            pk: UNSET_PK,
        }
    }
}

impl Entity for Expense {
    const TABLE: &'static str = "expense";
    const COLUMNS: &'static [Column] = &[
        Column::new("amount", "INTEGER NOT NULL"),
        Column::new("category", "INTEGER NOT NULL"),
        Column::new("expense_date", "TEXT NOT NULL"),
        Column::new("comment", "TEXT NOT NULL"),
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
            self.category.into(),
            self.expense_date.into(),
            self.comment.as_str().into(),
        ]
    }
}

impl FromRow for Expense {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Expense {
            pk: row.get("id")?,
            amount: row.get("amount")?,
            category: row.get("category")?,
            expense_date: row.get("expense_date")?,
            comment: row.get("comment")?,
        })
    }
}
