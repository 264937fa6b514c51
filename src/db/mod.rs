//! Database module: the user record, its schema and the generic persistence helpers.
//!
//! Layout:
//! - `models.rs`: the validated `User` record and its change/payload types
//! - `record.rs`: `fetch`, `fetch_or_create`, `update`, `save` over any `Record`
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: pool setup and scoped sessions

pub mod models;
pub mod record;
pub mod schema;
pub mod sqlite;

pub use models::{User, UserChanges, UserData, UserField};
pub use record::{Filter, Record, fetch, fetch_or_create, save, update};
pub use schema::SQLITE_INIT;
pub use sqlite::{Session, SqlitePool, UserStorage};
