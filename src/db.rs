use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::info;

use crate::error::Result;
use crate::repository::Entity;

pub type DbPool = Pool<SqliteConnectionManager>;

const MAX_CONNECTIONS: u32 = 4;

/// Opens a connection pool over the SQLite file at `path`, creating the file
/// and its parent directory when missing.
pub fn open_pool(path: &Path) -> Result<DbPool> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder().max_size(MAX_CONNECTIONS).build(manager)?;
    info!(path = %path.display(), "opened database");
    Ok(pool)
}

/// `CREATE TABLE IF NOT EXISTS` statement for an entity's table.
pub fn create_table_sql<T: Entity>() -> String {
    let columns = T::COLUMNS
        .iter()
        .map(|column| format!("{} {}", column.name, column.sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {columns})",
        T::TABLE
    )
}

pub(crate) fn create_table<T: Entity>(conn: &Connection) -> Result<()> {
    conn.execute(&create_table_sql::<T>(), [])?;
    Ok(())
}

pub(crate) fn table_is_empty(conn: &Connection, table: &str) -> Result<bool> {
    let empty = conn.query_row(
        &format!("SELECT NOT EXISTS(SELECT 1 FROM {table})"),
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(empty == 1)
}
