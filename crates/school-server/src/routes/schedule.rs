use crate::error::{ApiError, RouteError};
use crate::extract::Caller;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use school::errors::ScheduleError;
use serde_json::{json, Value};

impl From<ScheduleError> for RouteError {
    fn from(err: ScheduleError) -> Self {
        let status = match &err {
            ScheduleError::NotAStudent(_) => StatusCode::NOT_FOUND,
            ScheduleError::Csv(_) | ScheduleError::Excel(_) | ScheduleError::EmptyWorkbook => {
                StatusCode::BAD_REQUEST
            }
            ScheduleError::Store(_) => {
                tracing::error!("schedule store failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        RouteError::new(status, err.to_string())
    }
}

/// Bytes of the multipart field named `file`.
async fn uploaded_file(mut multipart: Multipart) -> Result<Bytes, RouteError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| RouteError::bad_request(err.body_text()))?
    {
        if field.name() == Some("file") {
            return field
                .bytes()
                .await
                .map_err(|err| RouteError::bad_request(err.body_text()));
        }
    }
    Err(RouteError::bad_request("file field is required"))
}

async fn import_csv(
    State(state): State<AppState>,
    caller: Result<Caller, ApiError>,
    multipart: Multipart,
) -> Result<Json<Value>, RouteError> {
    let caller = caller?;
    let file = uploaded_file(multipart).await?;
    let imported = state.schedules.import_csv(caller.user_id(), &file).await?;
    Ok(Json(json!({ "message": "schedule imported", "imported": imported })))
}

async fn import_excel(
    State(state): State<AppState>,
    caller: Result<Caller, ApiError>,
    multipart: Multipart,
) -> Result<Json<Value>, RouteError> {
    let caller = caller?;
    let file = uploaded_file(multipart).await?;
    let imported = state.schedules.import_excel(caller.user_id(), &file).await?;
    Ok(Json(json!({ "message": "schedule imported", "imported": imported })))
}

async fn student_schedule(
    State(state): State<AppState>,
    caller: Result<Caller, ApiError>,
) -> Result<Json<Value>, RouteError> {
    let caller = caller?;
    let schedules = state.schedules.student_schedule(caller.user_id()).await?;
    Ok(Json(json!({ "schedules": schedules })))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/schedule", get(student_schedule))
        .route("/api/schedule/import/csv", post(import_csv))
        .route("/api/schedule/import/excel", post(import_excel))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{bearer, body_json, test_state};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    const BOUNDARY: &str = "school-test-boundary";

    fn upload(uri: &str, token: &str, field: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"upload\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY,
            f = field
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .uri(uri)
            .method("POST")
            .header("authorization", token)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn list(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/api/schedule")
            .header("authorization", token)
            .body(Body::empty())
            .unwrap()
    }

    const CSV: &str = "code,name,credit,semester,weekday,start,end,room,building\n\
        CS101,Intro to CS,3,2024-1,1,08:00,09:40,A101,Main\n\
        MA201,Linear Algebra,4,2024-1,3,10:00,11:40\n";

    #[tokio::test]
    async fn test_import_csv_then_list() {
        let state = test_state("http://127.0.0.1:9");
        let token = bearer(&state, "alice", 0).await;
        let app = routes(state);

        let response = app
            .clone()
            .oneshot(upload("/api/schedule/import/csv", &token, "file", CSV.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["imported"], 2);

        let response = app.oneshot(list(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let schedules = body["schedules"].as_array().unwrap();
        assert_eq!(schedules.len(), 2);
        assert_eq!(schedules[0]["classroom"], "A101");
        assert_eq!(schedules[1]["weekday"], 3);
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let app = routes(test_state("http://127.0.0.1:9"));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/schedule").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({"error": "missing authorization token"})
        );

        let response = app.oneshot(list("Bearer not-a-token")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let state = test_state("http://127.0.0.1:9");
        let token = bearer(&state, "bob", 0).await;

        let response = routes(state)
            .oneshot(upload("/api/schedule/import/csv", &token, "other", CSV.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "file field is required"})
        );
    }

    #[tokio::test]
    async fn test_teacher_cannot_import() {
        let state = test_state("http://127.0.0.1:9");
        let token = bearer(&state, "tina", 1).await;

        let response = routes(state)
            .oneshot(upload("/api/schedule/import/csv", &token, "file", CSV.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_workbook_is_bad_request() {
        let state = test_state("http://127.0.0.1:9");
        let token = bearer(&state, "carol", 0).await;

        let response = routes(state)
            .oneshot(upload("/api/schedule/import/excel", &token, "file", b"not a zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
