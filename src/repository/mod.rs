//! Storage abstraction shared by every entity type.
//!
//! A [`Repository`] assigns a unique primary key to each entry it stores. Two
//! backends implement it: [`MemoryRepository`] keeps entries in process memory,
//! [`SqliteRepository`] keeps one table per entity type in a SQLite file.

pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Primary key of a stored entity.
pub type Pk = i64;

/// Primary key of an entity that has not been stored yet.
pub const UNSET_PK: Pk = 0;

/// A persisted field of an entity: its column name and SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self { name, sql_type }
    }

    /// Storage class SQLite derives from the declared type.
    pub fn affinity(&self) -> Affinity {
        Affinity::of(self.sql_type)
    }
}

/// How a column converts the values compared against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
    /// Values are kept as given.
    Blob,
}

impl Affinity {
    /// Applies SQLite's type-name rules, in SQLite's order.
    pub fn of(sql_type: &str) -> Self {
        let sql_type = sql_type.to_ascii_uppercase();
        if sql_type.contains("INT") {
            Affinity::Integer
        } else if ["CHAR", "CLOB", "TEXT"]
            .iter()
            .any(|name| sql_type.contains(name))
        {
            Affinity::Text
        } else if sql_type.contains("BLOB") || sql_type.trim().is_empty() {
            Affinity::Blob
        } else {
            Affinity::Real
        }
    }
}

/// Text form of timestamps, as rusqlite stores `NaiveDateTime`.
pub const TIMESTAMP_FORMAT: &str = "%F %T%.f";

/// Value of a single entity field, used both for filters and for SQL binding.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl FieldValue {
    /// Converts the value the way a column with `affinity` would store it, so
    /// that equal values compare equal whichever backend holds them.
    pub fn with_affinity(self, affinity: Affinity) -> FieldValue {
        let value = match self {
            FieldValue::Timestamp(value) => {
                FieldValue::Text(value.format(TIMESTAMP_FORMAT).to_string())
            }
            other => other,
        };
        match (affinity, value) {
            (Affinity::Integer, FieldValue::Real(value)) => whole_real(value)
                .map(FieldValue::Integer)
                .unwrap_or(FieldValue::Real(value)),
            (Affinity::Integer, FieldValue::Text(text)) => {
                numeric_text(&text).unwrap_or(FieldValue::Text(text))
            }
            (Affinity::Real, FieldValue::Integer(value)) => FieldValue::Real(value as f64),
            (Affinity::Real, FieldValue::Text(text)) => match numeric_text(&text) {
                Some(FieldValue::Integer(value)) => FieldValue::Real(value as f64),
                Some(number) => number,
                None => FieldValue::Text(text),
            },
            (Affinity::Text, FieldValue::Integer(value)) => FieldValue::Text(value.to_string()),
            (Affinity::Text, FieldValue::Real(value)) => FieldValue::Text(format!("{value:?}")),
            (_, value) => value,
        }
    }
}

/// `value` as an integer when the conversion is lossless.
fn whole_real(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (value.fract() == 0.0 && (-LIMIT..LIMIT).contains(&value)).then_some(value as i64)
}

/// Text holding a well-formed number, as the number.
fn numeric_text(text: &str) -> Option<FieldValue> {
    if let Ok(value) = text.parse::<i64>() {
        return Some(FieldValue::Integer(value));
    }
    let value = text.parse::<f64>().ok().filter(|value| value.is_finite())?;
    Some(
        whole_real(value)
            .map(FieldValue::Integer)
            .unwrap_or(FieldValue::Real(value)),
    )
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Field-name to expected-value conditions, combined with AND.
///
/// Setting the same field twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: BTreeMap<String, FieldValue>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.conditions
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }

    /// Checks every field against `T` and converts each expected value to
    /// the affinity of its column.
    pub fn resolve<T: Entity>(&self) -> Result<Vec<Condition<'_>>> {
        self.conditions()
            .map(|(field, value)| {
                let affinity = T::affinity_of(field).ok_or_else(|| Error::UnknownField {
                    entity: T::TABLE,
                    field: field.to_string(),
                })?;
                Ok(Condition {
                    field,
                    affinity,
                    value: value.clone().with_affinity(affinity),
                })
            })
            .collect()
    }
}

/// One filter condition checked against an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition<'f> {
    pub field: &'f str,
    pub affinity: Affinity,
    pub value: FieldValue,
}

/// Static mapping between an entity type and its stored representation.
pub trait Entity: Clone + fmt::Debug {
    /// Table name, the lowercase type name.
    const TABLE: &'static str;
    /// Persisted fields, primary key excluded.
    const COLUMNS: &'static [Column];

    fn pk(&self) -> Pk;

    /// Returns the same entity carrying `pk`.
    fn with_pk(self, pk: Pk) -> Self;

    /// Field values in [`Entity::COLUMNS`] order.
    fn values(&self) -> Vec<FieldValue>;

    /// Looks a field up by name. `pk` is always available.
    fn field(&self, name: &str) -> Option<FieldValue> {
        if name == "pk" {
            return Some(FieldValue::Integer(self.pk()));
        }
        let index = Self::COLUMNS.iter().position(|column| column.name == name)?;
        self.values().into_iter().nth(index)
    }

    fn has_field(name: &str) -> bool {
        Self::affinity_of(name).is_some()
    }

    /// Affinity of the column behind a field; `pk` is an integer.
    fn affinity_of(name: &str) -> Option<Affinity> {
        if name == "pk" {
            return Some(Affinity::Integer);
        }
        Self::COLUMNS
            .iter()
            .find(|column| column.name == name)
            .map(Column::affinity)
    }
}

/// Entry storage contract implemented by every backend.
pub trait Repository<T: Entity> {
    /// Stores `obj` and returns it carrying its freshly assigned primary key.
    ///
    /// Fails if `obj` already has a primary key.
    fn add(&mut self, obj: T) -> Result<T>;

    /// Returns the entry stored under `pk`, if any.
    fn get(&self, pk: Pk) -> Result<Option<T>>;

    /// Returns every entry matching all conditions of `filter`, or every
    /// entry when there is no filter.
    fn get_all_where(&self, filter: Option<&Filter>) -> Result<Vec<T>>;

    fn get_all(&self) -> Result<Vec<T>> {
        self.get_all_where(None)
    }

    /// Replaces the entry stored under `obj.pk()`.
    fn update(&mut self, obj: &T) -> Result<()>;

    /// Removes the entry stored under `pk`.
    ///
    /// The memory backend rejects unknown keys; the SQLite backend does not.
    fn delete(&mut self, pk: Pk) -> Result<()>;
}
