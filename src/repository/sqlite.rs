use std::marker::PhantomData;

use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{OptionalExtension, Row, ToSql, params_from_iter};
use tracing::debug;

use super::{Entity, FieldValue, Filter, Pk, Repository, TIMESTAMP_FORMAT, UNSET_PK};
use crate::db::{self, DbPool};
use crate::error::{Error, Result};

/// Entities that can be rebuilt from a row of their table.
///
/// Rows always carry `id` followed by the entity's columns.
pub trait FromRow: Entity + Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            FieldValue::Integer(value) => Ok(ToSqlOutput::from(*value)),
            FieldValue::Real(value) => Ok(ToSqlOutput::from(*value)),
            FieldValue::Text(value) => Ok(ToSqlOutput::from(value.as_str())),
            FieldValue::Timestamp(value) => Ok(ToSqlOutput::from(
                value.format(TIMESTAMP_FORMAT).to_string(),
            )),
        }
    }
}

/// Repository backed by one SQLite table per entity type.
///
/// Every operation checks a connection out of the pool and returns it when
/// done; nothing spans more than one statement.
pub struct SqliteRepository<T> {
    pool: DbPool,
    select: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: FromRow> SqliteRepository<T> {
    /// Binds a repository to `T`'s table, creating the table if absent.
    pub fn new(pool: DbPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            db::create_table::<T>(&conn)?;
        }
        let select = format!("SELECT id, {} FROM {}", column_list::<T>(), T::TABLE);
        Ok(Self {
            pool,
            select,
            _entity: PhantomData,
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        let conn = self.pool.get()?;
        db::table_is_empty(&conn, T::TABLE)
    }

    fn where_clause(filter: &Filter) -> Result<(String, Vec<FieldValue>)> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        for condition in filter.resolve::<T>()? {
            let column = if condition.field == "pk" { "id" } else { condition.field };
            conditions.push(format!("{column} IS ?{}", values.len() + 1));
            values.push(condition.value);
        }
        Ok((format!(" WHERE {}", conditions.join(" AND ")), values))
    }
}

fn column_list<T: Entity>() -> String {
    T::COLUMNS
        .iter()
        .map(|column| column.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl<T: FromRow> Repository<T> for SqliteRepository<T> {
    fn add(&mut self, obj: T) -> Result<T> {
        if obj.pk() != UNSET_PK {
            return Err(Error::PkAlreadySet {
                entity: T::TABLE,
                pk: obj.pk(),
            });
        }
        let values = obj.values();
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                T::TABLE,
                column_list::<T>(),
                placeholders(values.len())
            ),
            params_from_iter(values.iter()),
        )?;
        let pk = conn.last_insert_rowid();
        debug!(table = T::TABLE, pk, "inserted row");
        Ok(obj.with_pk(pk))
    }

    fn get(&self, pk: Pk) -> Result<Option<T>> {
        let conn = self.pool.get()?;
        let found = conn
            .query_row(&format!("{} WHERE id = ?1", self.select), [pk], T::from_row)
            .optional()?;
        Ok(found)
    }

    fn get_all_where(&self, filter: Option<&Filter>) -> Result<Vec<T>> {
        let (clause, values) = match filter.filter(|filter| !filter.is_empty()) {
            Some(filter) => Self::where_clause(filter)?,
            None => (String::new(), Vec::new()),
        };
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!("{}{clause} ORDER BY id", self.select))?;
        let rows = stmt.query_map(params_from_iter(values.iter()), T::from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn update(&mut self, obj: &T) -> Result<()> {
        let pk = obj.pk();
        if pk == UNSET_PK {
            return Err(Error::PkUnset { entity: T::TABLE });
        }
        let mut values = obj.values();
        let assignments = T::COLUMNS
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{} = ?{}", column.name, index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        values.push(FieldValue::Integer(pk));
        let conn = self.pool.get()?;
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET {assignments} WHERE id = ?{}",
                T::TABLE,
                values.len()
            ),
            params_from_iter(values.iter()),
        )?;
        if changed == 0 {
            return Err(Error::NotFound {
                entity: T::TABLE,
                pk,
            });
        }
        debug!(table = T::TABLE, pk, "updated row");
        Ok(())
    }

    fn delete(&mut self, pk: Pk) -> Result<()> {
        let conn = self.pool.get()?;
        let changed = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", T::TABLE), [pk])?;
        debug!(table = T::TABLE, pk, changed, "deleted row");
        Ok(())
    }
}
