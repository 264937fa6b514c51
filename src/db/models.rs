use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::db::record::{Field, Record, SqlValue, try_get_timestamp};
use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserField {
    Username,
    RefreshToken,
    Token,
    AccTokenTs,
}

impl Field for UserField {
    fn column(self) -> &'static str {
        match self {
            UserField::Username => "username",
            UserField::RefreshToken => "refresh_token",
            UserField::Token => "token",
            UserField::AccTokenTs => "acc_token_ts",
        }
    }
}

/// One user identity, as validated in memory.
///
/// Fields are changed through setters or [`UserChanges`] so that every
/// assignment is recorded, including one that restores a default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    id: Option<i64>,
    username: String,
    refresh_token: Option<String>,
    token: Option<String>,
    acc_token_ts: Option<DateTime<Utc>>,
    /// `acc_token_ts` as last read from the store.
    #[serde(skip)]
    stored_acc_token_ts: Option<DateTime<Utc>>,
    #[serde(skip)]
    touched: BTreeSet<UserField>,
}

impl User {
    pub fn new(changes: UserChanges) -> Self {
        <Self as Record>::from_changes(changes)
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Last time the access token was issued; `None` until first stored.
    pub fn acc_token_ts(&self) -> Option<DateTime<Utc>> {
        self.acc_token_ts
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
        self.touched.insert(UserField::Username);
    }

    pub fn set_refresh_token(&mut self, refresh_token: Option<String>) {
        self.refresh_token = refresh_token;
        self.touched.insert(UserField::RefreshToken);
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
        self.touched.insert(UserField::Token);
    }

    pub fn set_acc_token_ts(&mut self, ts: DateTime<Utc>) {
        self.acc_token_ts = Some(ts);
        self.touched.insert(UserField::AccTokenTs);
    }

    pub fn touched(&self) -> impl Iterator<Item = UserField> + '_ {
        self.touched.iter().copied()
    }

    fn apply(&mut self, changes: UserChanges) {
        let UserChanges {
            username,
            refresh_token,
            token,
            acc_token_ts,
        } = changes;
        if let Some(username) = username {
            self.set_username(username);
        }
        if let Some(refresh_token) = refresh_token {
            self.set_refresh_token(refresh_token);
        }
        if let Some(token) = token {
            self.set_token(token);
        }
        if let Some(ts) = acc_token_ts {
            self.set_acc_token_ts(ts);
        }
    }
}

impl Record for User {
    type Field = UserField;
    type Changes = UserChanges;

    const TABLE: &'static str = "users";
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [UserField] = &[
        UserField::Username,
        UserField::RefreshToken,
        UserField::Token,
        UserField::AccTokenTs,
    ];

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let acc_token_ts = try_get_timestamp(row, "acc_token_ts")?;
        Ok(User {
            id: Some(row.try_get("id")?),
            username: row.try_get("username")?,
            refresh_token: row.try_get("refresh_token")?,
            token: row.try_get("token")?,
            acc_token_ts,
            stored_acc_token_ts: acc_token_ts,
            touched: BTreeSet::new(),
        })
    }

    fn from_changes(changes: UserChanges) -> Self {
        let mut user = User {
            id: None,
            username: String::new(),
            refresh_token: None,
            token: None,
            acc_token_ts: None,
            stored_acc_token_ts: None,
            touched: BTreeSet::new(),
        };
        user.apply(changes);
        user
    }

    fn with_changes(&self, changes: UserChanges) -> Self {
        let mut user = self.clone();
        user.apply(changes);
        user
    }

    fn is_touched(&self, field: UserField) -> bool {
        self.touched.contains(&field)
    }

    fn value(&self, field: UserField) -> SqlValue {
        match field {
            UserField::Username => SqlValue::Text(Some(self.username.clone())),
            UserField::RefreshToken => SqlValue::Text(self.refresh_token.clone()),
            UserField::Token => SqlValue::Text(self.token.clone()),
            UserField::AccTokenTs => SqlValue::Timestamp(self.acc_token_ts),
        }
    }

    fn insert_default(&self, field: UserField) -> Option<SqlValue> {
        match field {
            UserField::AccTokenTs => Some(SqlValue::Timestamp(Some(Utc::now()))),
            _ => None,
        }
    }

    fn validate(&self, inserting: bool) -> Result<(), RelayError> {
        if inserting && !self.is_touched(UserField::Username) {
            return Err(RelayError::Validation("username is required".to_string()));
        }
        if self.is_touched(UserField::Username) && self.username.trim().is_empty() {
            return Err(RelayError::Validation(
                "username must not be blank".to_string(),
            ));
        }
        for (field, value) in [
            (UserField::RefreshToken, &self.refresh_token),
            (UserField::Token, &self.token),
        ] {
            if self.is_touched(field) && value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(RelayError::Validation(format!(
                    "{} must not be blank",
                    field.column()
                )));
            }
        }
        if !inserting
            && self.is_touched(UserField::AccTokenTs)
            && let (Some(new), Some(stored)) = (self.acc_token_ts, self.stored_acc_token_ts)
            && new < stored
        {
            return Err(RelayError::Validation(format!(
                "acc_token_ts must not move backwards (stored {stored}, got {new})"
            )));
        }
        Ok(())
    }
}

/// Partial assignment of [`User`] fields.
///
/// The outer `Option` of each attribute says whether it is set at all; for
/// nullable columns the inner `Option` is the value, so clearing a token is
/// distinct from leaving it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub refresh_token: Option<Option<String>>,
    pub token: Option<Option<String>>,
    pub acc_token_ts: Option<DateTime<Utc>>,
}

impl UserChanges {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Some(refresh_token.into()));
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Some(token.into()));
        self
    }

    pub fn clear_token(mut self) -> Self {
        self.token = Some(None);
        self
    }

    pub fn acc_token_ts(mut self, ts: DateTime<Utc>) -> Self {
        self.acc_token_ts = Some(ts);
        self
    }
}

/// The `user_data` object returned by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub username: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl UserData {
    pub fn from_value(value: Option<&Value>) -> Result<Self, RelayError> {
        let value = value
            .ok_or_else(|| RelayError::Validation("response carries no user_data".to_string()))?;
        let data = UserData::deserialize(value)
            .map_err(|e| RelayError::Validation(format!("invalid user_data: {e}")))?;
        if data.username.trim().is_empty() {
            return Err(RelayError::Validation(
                "username must not be blank".to_string(),
            ));
        }
        Ok(data)
    }
}

/// Absent tokens stay untouched.
impl From<UserData> for UserChanges {
    fn from(data: UserData) -> Self {
        UserChanges {
            username: Some(data.username),
            refresh_token: data.refresh_token.map(Some),
            token: data.token.map(Some),
            acc_token_ts: None,
        }
    }
}
