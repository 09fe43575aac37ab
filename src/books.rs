//! The open set of books: one storage file and a repository per entity.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::db;
use crate::error::{Error, Result};
use crate::models::{Budget, Category, Expense, Period};
use crate::periods::{self, PeriodStatus, PeriodTotals};
use crate::repository::{Entity, Filter, Pk, Repository, SqliteRepository};

/// Category tree created in an empty storage file.
pub const DEFAULT_CATEGORIES: &[(&str, Option<&str>)] = &[
    ("groceries", None),
    ("meat", Some("groceries")),
    ("dairy", Some("groceries")),
    ("fruit", Some("groceries")),
    ("transport", None),
    ("fuel", Some("transport")),
    ("public transport", Some("transport")),
    ("home", None),
    ("utilities", Some("home")),
    ("books", None),
    ("clothes", None),
];

/// Separator between names in a category path.
pub const PATH_SEPARATOR: &str = " › ";

pub struct Books {
    path: PathBuf,
    pub expenses: SqliteRepository<Expense>,
    pub categories: SqliteRepository<Category>,
    pub budgets: SqliteRepository<Budget>,
}

impl Books {
    /// Opens (or creates) the storage file at `path` with all its tables.
    pub fn open(path: impl Into<PathBuf>, seed_categories: bool) -> Result<Self> {
        let path = path.into();
        let pool = db::open_pool(&path)?;
        let mut books = Books {
            expenses: SqliteRepository::new(pool.clone())?,
            categories: SqliteRepository::new(pool.clone())?,
            budgets: SqliteRepository::new(pool)?,
            path,
        };
        if seed_categories && books.categories.is_empty()? {
            let created = Category::create_from_tree(DEFAULT_CATEGORIES, &mut books.categories)?;
            info!(count = created.len(), "seeded default categories");
        }
        Ok(books)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores an expense whose category exists.
    pub fn add_expense(&mut self, expense: Expense) -> Result<Expense> {
        self.require_category(expense.category)?;
        let stored = self.expenses.add(expense)?;
        info!(pk = stored.pk, amount = stored.amount, "added expense");
        Ok(stored)
    }

    pub fn remove_expense(&mut self, pk: Pk) -> Result<()> {
        self.expenses.delete(pk)?;
        info!(pk, "removed expense");
        Ok(())
    }

    /// Stores a category under an existing parent, or as a root.
    pub fn add_category(&mut self, name: &str, parent: Option<Pk>) -> Result<Category> {
        if let Some(parent) = parent {
            self.require_category(parent)?;
        }
        let stored = self.categories.add(Category {
            parent,
            ..Category::new(name)
        })?;
        info!(pk = stored.pk, name = %stored.name, "added category");
        Ok(stored)
    }

    /// Removes a category. Its children keep pointing at the removed id.
    pub fn remove_category(&mut self, pk: Pk) -> Result<()> {
        self.categories.delete(pk)?;
        info!(pk, "removed category");
        Ok(())
    }

    fn require_category(&self, pk: Pk) -> Result<Category> {
        self.categories.get(pk)?.ok_or(Error::NotFound {
            entity: Category::TABLE,
            pk,
        })
    }

    /// Full path of a category from its root, e.g. `groceries › meat`.
    pub fn category_label(&self, category: &Category) -> Result<String> {
        Ok(category.path(&self.categories)?.join(PATH_SEPARATOR))
    }

    /// Current limit per period; periods without a budget are absent.
    pub fn limits(&self) -> Result<BTreeMap<Period, i64>> {
        Ok(self
            .budgets
            .get_all()?
            .into_iter()
            .map(|budget| (budget.period, budget.amount))
            .collect())
    }

    /// Sets the limit of each given period, replacing an existing one.
    pub fn set_limits(&mut self, limits: &[(Period, i64)]) -> Result<()> {
        for &(period, amount) in limits {
            let filter = Filter::new().eq("period", period.as_str());
            match self.budgets.get_all_where(Some(&filter))?.into_iter().next() {
                Some(mut budget) => {
                    budget.amount = amount;
                    self.budgets.update(&budget)?;
                }
                None => {
                    self.budgets.add(Budget::new(amount, period))?;
                }
            }
            info!(%period, amount, "set budget limit");
        }
        Ok(())
    }

    /// Spending of the day, ISO week and month containing `today`, against
    /// their limits.
    pub fn report(&self, today: NaiveDate) -> Result<Vec<PeriodStatus>> {
        let expenses = self.expenses.get_all()?;
        let totals = PeriodTotals::collect(&expenses, today);
        Ok(periods::statuses(&totals, &self.limits()?))
    }
}
