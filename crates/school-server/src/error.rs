use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use school::relay::frame::ClientFrame;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Maps a dotted settings key to the environment variable that sets it,
/// e.g. `workflow.token` to `SCHOOL_WORKFLOW__TOKEN`.
pub fn to_env_var(field_path: &str) -> String {
    let mut env_var = String::from("SCHOOL_");
    env_var.push_str(&field_path.split('.').collect::<Vec<_>>().join("__"));
    env_var.to_uppercase()
}

/// An HTTP failure rendered as the `{"code", "msg", "data": null}` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ClientFrame::failure(self.status.as_u16(), self.msg);
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// An HTTP failure of the account and schedule routes, rendered as
/// `{"error": text}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteError {
    pub status: StatusCode,
    pub error: String,
}

impl RouteError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<ApiError> for RouteError {
    fn from(err: ApiError) -> Self {
        Self::new(err.status, err.msg)
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let body = ErrorResponse { error: self.error };
        (self.status, Json(body)).into_response()
    }
}
