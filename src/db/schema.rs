//! SQL DDL for initializing the user store.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `id` INTEGER PRIMARY KEY AUTOINCREMENT
/// - `username` NOT NULL UNIQUE
/// - `refresh_token`, `token` UNIQUE (NULLs never collide)
/// - `acc_token_ts` RFC3339 TEXT, defaulting to the insertion time in UTC
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    refresh_token TEXT NULL UNIQUE,
    token TEXT NULL UNIQUE,
    acc_token_ts TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
"#;
