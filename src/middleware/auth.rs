use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::error::RelayError;
use crate::router::RelayState;

/// Upstream access token of the authenticated caller.
///
/// Extracting it requires `Authorization: Bearer <refresh token>`; the token is
/// resolved (and refreshed when stale) through the [`AuthGate`](crate::service::AuthGate).
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

impl FromRequestParts<RelayState> for AccessToken {
    type Rejection = RelayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RelayState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| RelayError::Unauthorized)?;
        let token = state.auth_gate.resolve(bearer.token()).await?;
        Ok(Self(token))
    }
}
