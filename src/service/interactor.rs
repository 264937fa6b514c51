//! One method per upstream operation.
//!
//! Methods only exchange data with the upstream API and, where a route
//! asks for it, write the result through to the user store. Status
//! handling is left to the caller.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::api::upstream::encode_path_segment;
use crate::api::{Envelope, RequestOptions, UpstreamClient};
use crate::config::{Config, UpstreamRoutes};
use crate::db::{Filter, User, UserChanges, UserData, UserField, UserStorage};
use crate::db::{fetch, fetch_or_create, update};
use crate::error::RelayError;

#[derive(Clone)]
pub struct Interactor {
    upstream: UpstreamClient,
    storage: UserStorage,
    config: Arc<Config>,
}

impl Interactor {
    pub fn new(upstream: UpstreamClient, storage: UserStorage, config: Arc<Config>) -> Self {
        Self {
            upstream,
            storage,
            config,
        }
    }

    fn routes(&self) -> &UpstreamRoutes {
        &self.config.upstream.routes
    }

    pub async fn simple_get(&self) -> Envelope {
        self.upstream
            .get(&self.routes().simple_get, RequestOptions::default())
            .await
    }

    pub async fn auth_get(&self, auth_token: &str) -> Envelope {
        self.upstream
            .get(
                &self.routes().auth_get,
                RequestOptions::default().auth_token(auth_token),
            )
            .await
    }

    /// `param_2_optional` is only forwarded when non-empty.
    pub async fn params_get(&self, param1: &str, param_2_optional: Option<&str>) -> Envelope {
        let mut options = RequestOptions::default().query("param1", param1);
        if let Some(param2) = param_2_optional.filter(|p| !p.is_empty()) {
            options = options.query("param_2_optional", param2);
        }
        self.upstream.get(&self.routes().params_get, options).await
    }

    pub async fn dynamic_url_get(&self, uri: &str) -> Envelope {
        let path = self
            .routes()
            .dynamic_url_get
            .replace("{uri}", &encode_path_segment(uri));
        self.upstream.get(&path, RequestOptions::default()).await
    }

    /// Fetch, then create or refresh the user described by `data.user_data`.
    pub async fn saved_get(&self) -> Result<Envelope, RelayError> {
        let result = self
            .upstream
            .get(&self.routes().saved_get, RequestOptions::default())
            .await;
        if result.status_code != 200 {
            return Ok(result);
        }

        let user_data = UserData::from_value(result.data_at(&["user_data"]))?;
        let filter = Filter::by(UserField::Username, user_data.username.as_str());

        let mut db = self.storage.session().await?;
        let (user, created) =
            fetch_or_create::<User>(&mut db, &filter, user_data.clone().into()).await?;
        let user = update(&mut db, &user, user_data.into()).await?;
        info!(
            user_id = user.id(),
            username = %user.username(),
            created,
            "user written through"
        );

        Ok(result)
    }

    /// Fetch, then stamp the matching user's access-token timestamp.
    pub async fn updated_get(&self) -> Result<Envelope, RelayError> {
        let result = self
            .upstream
            .get(&self.routes().updated_get, RequestOptions::default())
            .await;
        if result.status_code != 200 {
            return Ok(result);
        }

        let user_data = UserData::from_value(result.data_at(&["user_data"]))?;
        let filter = Filter::by(UserField::Username, user_data.username.as_str());

        let mut db = self.storage.session().await?;
        let user = match fetch::<User>(&mut db, &filter).await {
            Ok(user) => user,
            Err(RelayError::NotFound(_)) => return Ok(Envelope::status(404)),
            Err(e) => return Err(e),
        };
        let user = update(
            &mut db,
            &user,
            UserChanges::default().acc_token_ts(Utc::now()),
        )
        .await?;
        info!(user_id = user.id(), username = %user.username(), "access token timestamp updated");

        Ok(result)
    }

    pub async fn simple_post(&self, body: &Value) -> Envelope {
        self.upstream
            .post(&self.routes().simple_post, body, RequestOptions::default())
            .await
    }

    pub async fn auth_post(&self, body: &Value, auth_token: &str) -> Envelope {
        self.upstream
            .post(
                &self.routes().auth_post,
                body,
                RequestOptions::default().auth_token(auth_token),
            )
            .await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Envelope {
        self.upstream
            .get(
                &self.routes().refresh_token,
                RequestOptions::default().query("refresh_token", refresh_token),
            )
            .await
    }
}
