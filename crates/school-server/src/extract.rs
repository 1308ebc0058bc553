use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum::http::header::AUTHORIZATION;
use school::token::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct Caller(pub Claims);

impl Caller {
    pub fn user_id(&self) -> u64 {
        self.0.user_id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing authorization token"))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::unauthorized("malformed authorization header"))?;

        match state.tokens.verify(token) {
            Ok(claims) => Ok(Caller(claims)),
            Err(err) => {
                tracing::debug!(%err, "rejecting bearer token");
                Err(ApiError::unauthorized("invalid or expired token"))
            }
        }
    }
}
