//! Generic create/read/update helpers over any [`Record`] type.
//!
//! Every helper runs on a caller-provided connection (usually a scoped
//! [`Session`](crate::db::sqlite::Session)); none of them opens its own.
//! Table and column names are taken from the `Record` implementation only.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection};
use std::fmt::Debug;

use crate::error::RelayError;

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Integer(Option<i64>),
    Text(Option<String>),
    Timestamp(Option<DateTime<Utc>>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(Some(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(Some(v.to_string()))
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(Some(v))
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(Some(v))
    }
}

/// A mutable (non primary key) column of a record type.
pub trait Field: Copy + Eq + Debug + Send + Sync + 'static {
    fn column(self) -> &'static str;
}

/// A record type persisted in a single table with an integer primary key.
///
/// Implementors track which fields the caller has set ("touched") explicitly;
/// values decoded from the store start untouched.
pub trait Record: Sized + Send + Sync {
    type Field: Field;
    /// Partial assignment of fields; every `Some` marks its field touched.
    type Changes: Send;

    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str;
    /// All columns except the primary key.
    const FIELDS: &'static [Self::Field];

    fn primary_key(&self) -> Option<i64>;

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;

    /// A new, unsaved record holding exactly `changes`.
    fn from_changes(changes: Self::Changes) -> Self;

    /// A copy of `self` with `changes` applied and marked touched.
    fn with_changes(&self, changes: Self::Changes) -> Self;

    fn is_touched(&self, field: Self::Field) -> bool;

    fn value(&self, field: Self::Field) -> SqlValue;

    /// Value written for an untouched `field` when inserting. `None` leaves
    /// the column default to the store.
    fn insert_default(&self, _field: Self::Field) -> Option<SqlValue> {
        None
    }

    /// Schema checks run before any write. `inserting` is true for new rows.
    fn validate(&self, inserting: bool) -> Result<(), RelayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target<F> {
    PrimaryKey,
    Field(F),
}

/// Conjunction of null-safe equality conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<F> {
    conditions: Vec<(Target<F>, SqlValue)>,
}

impl<F> Default for Filter<F> {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }
}

impl<F: Field> Filter<F> {
    pub fn by(field: F, value: impl Into<SqlValue>) -> Self {
        Self::default().and(field, value)
    }

    pub fn primary_key(id: i64) -> Self {
        Self {
            conditions: vec![(Target::PrimaryKey, SqlValue::Integer(Some(id)))],
        }
    }

    pub fn and(mut self, field: F, value: impl Into<SqlValue>) -> Self {
        self.conditions.push((Target::Field(field), value.into()));
        self
    }

    fn where_clause(&self, primary_key: &str) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(target, _)| {
                let column = match target {
                    Target::PrimaryKey => primary_key,
                    Target::Field(f) => f.column(),
                };
                format!("{column} IS ?")
            })
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.conditions.iter().map(|(_, v)| v)
    }
}

/// Look up exactly one row matching `filter`.
pub async fn fetch<R: Record>(
    db: &mut SqliteConnection,
    filter: &Filter<R::Field>,
) -> Result<R, RelayError> {
    let mut rows = select::<R>(db, filter, 2).await?;
    match rows.len() {
        0 => Err(RelayError::NotFound(format!(
            "No row in `{}` matched the lookup",
            R::TABLE
        ))),
        1 => Ok(rows.remove(0)),
        _ => Err(RelayError::AmbiguousResult { table: R::TABLE }),
    }
}

/// `fetch`, falling back to inserting a record built from `defaults`.
/// The flag is true when the row was created by this call.
///
/// Not atomic: a concurrent insert of the same unique value surfaces as
/// [`RelayError::ConstraintViolation`].
pub async fn fetch_or_create<R: Record>(
    db: &mut SqliteConnection,
    filter: &Filter<R::Field>,
    defaults: R::Changes,
) -> Result<(R, bool), RelayError> {
    match fetch::<R>(db, filter).await {
        Ok(record) => Ok((record, false)),
        Err(RelayError::NotFound(_)) => {
            let record = R::from_changes(defaults);
            let created = save(db, &record).await?;
            Ok((created, true))
        }
        Err(e) => Err(e),
    }
}

/// Persist `changes` on top of `record` and return the stored result.
/// `record` itself is left as it was.
pub async fn update<R: Record>(
    db: &mut SqliteConnection,
    record: &R,
    changes: R::Changes,
) -> Result<R, RelayError> {
    let updated = record.with_changes(changes);
    save(db, &updated).await
}

/// Update the row with `record`'s primary key, or insert a new one.
///
/// Only touched fields are written; untouched columns keep their stored
/// value (update) or take [`Record::insert_default`], falling back to the
/// column default (insert). Returns the row as stored.
pub async fn save<R: Record>(db: &mut SqliteConnection, record: &R) -> Result<R, RelayError> {
    let touched: Vec<R::Field> = R::FIELDS
        .iter()
        .copied()
        .filter(|f| record.is_touched(*f))
        .collect();

    let existing = match record.primary_key() {
        Some(id) => exists::<R>(db, id).await?.then_some(id),
        None => None,
    };

    let id = match existing {
        Some(id) => {
            record.validate(false)?;
            if !touched.is_empty() {
                update_row(db, id, record, &touched).await?;
            }
            id
        }
        None => {
            record.validate(true)?;
            insert_row(db, record).await?
        }
    };

    fetch::<R>(db, &Filter::primary_key(id)).await
}

async fn select<R: Record>(
    db: &mut SqliteConnection,
    filter: &Filter<R::Field>,
    limit: u32,
) -> Result<Vec<R>, RelayError> {
    let columns = select_columns::<R>();
    let sql = format!(
        "SELECT {columns} FROM {}{} LIMIT {limit}",
        R::TABLE,
        filter.where_clause(R::PRIMARY_KEY)
    );
    let query = filter
        .values()
        .fold(sqlx::query(&sql), |q, v| bind_value(q, v));
    let rows = query.fetch_all(&mut *db).await?;
    let records = rows
        .iter()
        .map(R::from_row)
        .collect::<Result<Vec<R>, sqlx::Error>>()?;
    Ok(records)
}

async fn exists<R: Record>(db: &mut SqliteConnection, id: i64) -> Result<bool, RelayError> {
    let sql = format!("SELECT 1 FROM {} WHERE {} = ?", R::TABLE, R::PRIMARY_KEY);
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *db).await?;
    Ok(row.is_some())
}

async fn insert_row<R: Record>(db: &mut SqliteConnection, record: &R) -> Result<i64, RelayError> {
    let mut columns = Vec::with_capacity(R::FIELDS.len() + 1);
    let mut values = Vec::with_capacity(R::FIELDS.len() + 1);
    if let Some(id) = record.primary_key() {
        columns.push(R::PRIMARY_KEY);
        values.push(SqlValue::Integer(Some(id)));
    }
    for &field in R::FIELDS {
        let value = if record.is_touched(field) {
            Some(record.value(field))
        } else {
            record.insert_default(field)
        };
        if let Some(value) = value {
            columns.push(field.column());
            values.push(value);
        }
    }

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", R::TABLE)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        )
    };
    let result = values
        .iter()
        .fold(sqlx::query(&sql), |q, v| bind_value(q, v))
        .execute(&mut *db)
        .await?;
    Ok(result.last_insert_rowid())
}

async fn update_row<R: Record>(
    db: &mut SqliteConnection,
    id: i64,
    record: &R,
    touched: &[R::Field],
) -> Result<(), RelayError> {
    let assignments: Vec<String> = touched
        .iter()
        .map(|f| format!("{} = ?", f.column()))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        R::TABLE,
        assignments.join(", "),
        R::PRIMARY_KEY
    );
    touched
        .iter()
        .fold(sqlx::query(&sql), |q, f| bind_value(q, &record.value(*f)))
        .bind(id)
        .execute(&mut *db)
        .await?;
    Ok(())
}

fn select_columns<R: Record>() -> String {
    std::iter::once(R::PRIMARY_KEY)
        .chain(R::FIELDS.iter().map(|f| f.column()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Timestamp(v) => query.bind(v.map(format_timestamp)),
    }
}

/// Storage encoding of timestamps: RFC3339, UTC, microsecond precision.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Read an optional RFC3339 TEXT column.
pub fn try_get_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.as_deref().map(parse_timestamp).transpose()
}
