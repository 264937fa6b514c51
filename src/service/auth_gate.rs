use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::db::{Filter, User, UserField, UserStorage, fetch};
use crate::error::RelayError;
use crate::service::interactor::Interactor;

/// Resolves an inbound bearer token to a usable upstream access token.
#[derive(Clone)]
pub struct AuthGate {
    interactor: Interactor,
    storage: UserStorage,
    ttl: Duration,
}

impl AuthGate {
    pub fn new(interactor: Interactor, storage: UserStorage, ttl: Duration) -> Self {
        Self {
            interactor,
            storage,
            ttl,
        }
    }

    /// Look up the user whose refresh token is `bearer` and return its access
    /// token, refreshing it upstream when stale.
    pub async fn resolve(&self, bearer: &str) -> Result<String, RelayError> {
        let user = self.lookup(bearer).await?;
        self.access_token(&user, Utc::now()).await
    }

    async fn lookup(&self, bearer: &str) -> Result<User, RelayError> {
        // The session is released before any upstream call is made.
        let mut db = self.storage.session().await?;
        match fetch::<User>(&mut db, &Filter::by(UserField::RefreshToken, bearer)).await {
            Ok(user) => Ok(user),
            Err(RelayError::NotFound(_)) => Err(RelayError::NotFound("User not found".to_string())),
            Err(e) => Err(e),
        }
    }

    /// The stored token while fresh at `now`, otherwise a newly issued one.
    ///
    /// A refreshed token is handed to the caller only; the stored row keeps
    /// its previous token and timestamp.
    pub async fn access_token(&self, user: &User, now: DateTime<Utc>) -> Result<String, RelayError> {
        match user.token() {
            Some(token) if !is_stale(user.acc_token_ts(), self.ttl, now) => {
                debug!(user_id = user.id(), "access token still fresh");
                Ok(token.to_string())
            }
            _ => self.refresh(user).await,
        }
    }

    async fn refresh(&self, user: &User) -> Result<String, RelayError> {
        let refresh_token = user.refresh_token().ok_or(RelayError::Unauthorized)?;
        let envelope = self
            .interactor
            .refresh_token(refresh_token)
            .await
            .into_result()?;
        let token = envelope
            .data_at(&["token"])
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::Upstream {
                status: 500,
                detail: "Refresh response carries no token".to_string(),
            })?;
        info!(user_id = user.id(), username = %user.username(), "access token refreshed");
        Ok(token.to_string())
    }
}

/// True when a token issued at `issued` has outlived `ttl` by `now`.
/// A token with no issue time is always stale.
pub fn is_stale(issued: Option<DateTime<Utc>>, ttl: Duration, now: DateTime<Utc>) -> bool {
    issued.is_none_or(|ts| ts + ttl < now)
}
