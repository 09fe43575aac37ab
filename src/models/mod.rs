mod budget;
mod category;
mod expense;

pub use budget::{Budget, ParsePeriodError, Period};
pub use category::{Ancestors, Category};
pub use expense::Expense;
