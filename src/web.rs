use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Local, NaiveDate};
use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::form::Form;
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::{Build, Either, Rocket, State};
use rocket_dyn_templates::Template;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::books::{Books, PATH_SEPARATOR};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::models::{Category, Expense, Period};
use crate::money::{format_money, parse_amount_to_cents};
use crate::periods::PeriodStatus;
use crate::repository::{MemoryRepository, Pk, Repository};

type Page = std::result::Result<Either<Redirect, Template>, Status>;

/// Managed state: the books currently open, swappable at runtime.
pub struct Storage {
    books: RwLock<Books>,
    seed_categories: bool,
}

impl Storage {
    pub fn open(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            books: RwLock::new(Books::open(&config.database, config.seed_categories)?),
            seed_categories: config.seed_categories,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Books> {
        self.books.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Books> {
        self.books.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Points the application at another storage file.
    pub fn reopen(&self, path: PathBuf) -> Result<()> {
        let books = Books::open(path, self.seed_categories)?;
        info!(path = %books.path().display(), "switched storage file");
        *self.write() = books;
        Ok(())
    }
}

#[derive(FromForm)]
struct ExpenseForm {
    expense_date: String,
    amount: String,
    category: Option<i64>,
    comment: Option<String>,
}

#[derive(FromForm)]
struct BudgetForm {
    day: String,
    week: String,
    month: String,
}

#[derive(FromForm)]
struct StorageForm {
    path: String,
}

#[derive(FromForm)]
struct CategoryForm {
    name: String,
    parent: Option<i64>,
}

#[derive(Serialize)]
struct ExpenseView {
    pk: Pk,
    date: String,
    amount: String,
    category: String,
    comment: String,
}

#[derive(Serialize)]
struct CategoryView {
    pk: Pk,
    name: String,
    label: String,
    depth: usize,
    descendants: usize,
}

#[derive(Serialize)]
struct PeriodView {
    label: &'static str,
    spent: String,
    limit: String,
    over: bool,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn today_ymd() -> String {
    today().format("%Y-%m-%d").to_string()
}

fn internal(err: Error) -> Status {
    error!(%err, "storage failure");
    Status::InternalServerError
}

fn period_label(period: Period) -> &'static str {
    match period {
        Period::Day => "Today",
        Period::Week => "This Week",
        Period::Month => "This Month",
    }
}

fn parse_expense(form: &ExpenseForm) -> Option<Expense> {
    let expense_date = if form.expense_date.trim().is_empty() {
        Local::now().naive_local()
    } else {
        NaiveDate::parse_from_str(form.expense_date.trim(), "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
    };
    let amount = parse_amount_to_cents(&form.amount).filter(|&cents| cents > 0)?;
    let mut expense = Expense::new(amount, form.category?);
    expense.expense_date = expense_date;
    expense.comment = form.comment.as_deref().unwrap_or_default().trim().to_string();
    Some(expense)
}

fn parse_limits(form: &BudgetForm) -> Option<[(Period, i64); 3]> {
    let positive = |input: &str| parse_amount_to_cents(input).filter(|&cents| cents > 0);
    Some([
        (Period::Day, positive(&form.day)?),
        (Period::Week, positive(&form.week)?),
        (Period::Month, positive(&form.month)?),
    ])
}

/// Walks the tree over one in-memory snapshot of the category table.
fn category_views(books: &Books) -> Result<Vec<CategoryView>> {
    let snapshot = books
        .categories
        .get_all()?
        .into_iter()
        .collect::<MemoryRepository<Category>>();
    let mut views = Vec::new();
    for category in snapshot.get_all()? {
        let path = category.path(&snapshot)?;
        views.push(CategoryView {
            pk: category.pk,
            depth: path.len() - 1,
            label: path.join(PATH_SEPARATOR),
            descendants: category.get_subcategories(&snapshot)?.len(),
            name: category.name,
        });
    }
    views.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(views)
}

fn expense_view(expense: Expense, labels: &HashMap<Pk, String>) -> ExpenseView {
    ExpenseView {
        pk: expense.pk,
        date: expense.expense_date.format("%Y-%m-%d").to_string(),
        amount: format_money(expense.amount),
        category: labels
            .get(&expense.category)
            .cloned()
            .unwrap_or_else(|| format!("#{}", expense.category)),
        comment: expense.comment,
    }
}

fn period_view(status: PeriodStatus) -> PeriodView {
    PeriodView {
        label: period_label(status.period),
        spent: format_money(status.spent),
        limit: format_money(status.limit),
        over: status.over(),
    }
}

fn render_index(books: &Books, error: Option<&str>) -> Result<Template> {
    let categories = category_views(books)?;
    let labels = categories
        .iter()
        .map(|view| (view.pk, view.label.clone()))
        .collect::<HashMap<_, _>>();
    let expenses = books
        .expenses
        .get_all()?
        .into_iter()
        .map(|expense| expense_view(expense, &labels))
        .collect::<Vec<_>>();
    let periods = books
        .report(today())?
        .into_iter()
        .map(period_view)
        .collect::<Vec<_>>();
    let limits = books.limits()?;
    let limit = |period: Period| format_money(limits.get(&period).copied().unwrap_or(0));

    let context = serde_json::json!({
        "storage": books.path().display().to_string(),
        "today": today_ymd(),
        "expenses": expenses,
        "categories": categories,
        "periods": periods,
        "limits": {
            "day": limit(Period::Day),
            "week": limit(Period::Week),
            "month": limit(Period::Month),
        },
        "error": error,
    });
    Ok(Template::render("index", &context))
}

fn render_categories(books: &Books, error: Option<&str>) -> Result<Template> {
    let context = serde_json::json!({
        "storage": books.path().display().to_string(),
        "categories": category_views(books)?,
        "error": error,
    });
    Ok(Template::render("categories", &context))
}

fn rejected(template: Result<Template>) -> Page {
    template.map(Either::Right).map_err(internal)
}

#[get("/")]
fn index(storage: &State<Storage>) -> std::result::Result<Template, Status> {
    render_index(&storage.read(), None).map_err(internal)
}

#[post("/expenses", data = "<form>")]
fn add_expense(storage: &State<Storage>, form: Form<ExpenseForm>) -> Page {
    let mut books = storage.write();
    let Some(expense) = parse_expense(&form) else {
        warn!(amount = %form.amount, date = %form.expense_date, "rejected expense input");
        return rejected(render_index(&books, Some("Wrong data!")));
    };
    match books.add_expense(expense) {
        Ok(_) => Ok(Either::Left(Redirect::to("/"))),
        Err(Error::NotFound { .. }) => {
            warn!(category = ?form.category, "rejected expense with unknown category");
            rejected(render_index(&books, Some("Wrong data!")))
        }
        Err(err) => Err(internal(err)),
    }
}

#[post("/expenses/<pk>/delete")]
fn remove_expense(storage: &State<Storage>, pk: Pk) -> std::result::Result<Redirect, Status> {
    storage.write().remove_expense(pk).map_err(internal)?;
    Ok(Redirect::to("/"))
}

#[post("/budget", data = "<form>")]
fn set_budget(storage: &State<Storage>, form: Form<BudgetForm>) -> Page {
    let mut books = storage.write();
    let Some(limits) = parse_limits(&form) else {
        warn!("rejected budget input");
        return rejected(render_index(&books, Some("Wrong budget!")));
    };
    books.set_limits(&limits).map_err(internal)?;
    Ok(Either::Left(Redirect::to("/")))
}

#[post("/storage", data = "<form>")]
fn set_storage(storage: &State<Storage>, form: Form<StorageForm>) -> Page {
    let path = form.path.trim();
    if path.is_empty() {
        return rejected(render_index(&storage.read(), Some("Wrong file!")));
    }
    if let Err(err) = storage.reopen(PathBuf::from(path)) {
        warn!(%err, path, "cannot open storage file");
        let message = format!("Cannot open {path}: {err}");
        return rejected(render_index(&storage.read(), Some(message.as_str())));
    }
    Ok(Either::Left(Redirect::to("/")))
}

#[get("/categories")]
fn categories(storage: &State<Storage>) -> std::result::Result<Template, Status> {
    render_categories(&storage.read(), None).map_err(internal)
}

#[post("/categories", data = "<form>")]
fn add_category(storage: &State<Storage>, form: Form<CategoryForm>) -> Page {
    let mut books = storage.write();
    let name = form.name.trim();
    if name.is_empty() {
        return rejected(render_categories(&books, Some("Wrong category!")));
    }
    match books.add_category(name, form.parent) {
        Ok(_) => Ok(Either::Left(Redirect::to("/categories"))),
        Err(Error::NotFound { .. }) => {
            rejected(render_categories(&books, Some("Wrong category!")))
        }
        Err(err) => Err(internal(err)),
    }
}

#[post("/categories/<pk>/delete")]
fn remove_category(storage: &State<Storage>, pk: Pk) -> std::result::Result<Redirect, Status> {
    storage.write().remove_category(pk).map_err(internal)?;
    Ok(Redirect::to("/categories"))
}

/// Builds the application on top of `figment`, which also carries [`AppConfig`].
pub fn build(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(AdHoc::try_on_ignite("Storage", |rocket| async move {
            let config = match rocket.figment().extract::<AppConfig>() {
                Ok(config) => config,
                Err(err) => {
                    error!(%err, "invalid configuration");
                    return Err(rocket);
                }
            };
            match Storage::open(&config) {
                Ok(storage) => Ok(rocket.manage(storage)),
                Err(err) => {
                    error!(%err, path = %config.database.display(), "cannot open storage file");
                    Err(rocket)
                }
            }
        }))
        .mount(
            "/",
            routes![
                index,
                add_expense,
                remove_expense,
                set_budget,
                set_storage,
                categories,
                add_category,
                remove_category
            ],
        )
        .mount("/static", FileServer::from("static"))
        .attach(Template::fairing())
}

/// The application as configured by `Rocket.toml` and `ROCKET_*` variables.
pub fn rocket() -> Rocket<Build> {
    build(rocket::Config::figment())
}
