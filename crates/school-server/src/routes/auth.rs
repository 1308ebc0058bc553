use crate::error::RouteError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use school::auth::{LoginRequest, RegisterRequest};
use school::errors::AuthError;
use school::models::user::User;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: User,
}

impl From<AuthError> for RouteError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::UserExists | AuthError::NumberTaken(_) => StatusCode::CONFLICT,
            AuthError::UserNotFound | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::UserDisabled => StatusCode::FORBIDDEN,
            AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => {
                tracing::error!("auth failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        RouteError::new(status, err.to_string())
    }
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), RouteError> {
    let Json(request) = payload.map_err(|err| RouteError::bad_request(err.body_text()))?;
    state.auth.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "registered" })),
    ))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, RouteError> {
    let Json(request) = payload.map_err(|err| RouteError::bad_request(err.body_text()))?;
    let user = state.auth.login(request).await?;
    let token = state.tokens.issue(&user).map_err(|err| {
        tracing::error!("failed to issue token: {}", err);
        RouteError::internal("failed to issue token")
    })?;

    Ok(Json(LoginResponse { token, user }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .with_state(state)
}
