use crate::error::ApiError;
use crate::extract::Caller;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header::{self, HeaderName},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::Stream;
use school::relay::{ChatRequest, ClientSink, RelaySession};
use serde::Deserialize;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio_stream::wrappers::ReceiverStream;

/// Frames buffered per session before the relay waits on a slow client.
const SESSION_BUFFER: usize = 100;

static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    query: String,
}

/// Streams relay frames to the client as they are produced.
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = Body::from_stream(self);

        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache, no-transform"),
                (X_ACCEL_BUFFERING.clone(), "no"),
            ],
            body,
        )
            .into_response()
    }
}

async fn handler(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<SseResponse, ApiError> {
    let Json(body) = payload.map_err(|_| ApiError::bad_request("invalid request body"))?;
    if body.query.trim().is_empty() {
        return Err(ApiError::bad_request("query is required"));
    }

    let request = ChatRequest {
        query: body.query,
        caller_id: caller.user_id().to_string(),
    };
    tracing::info!(caller = %request.caller_id, "starting chat relay");

    let (sink, rx) = ClientSink::channel(SESSION_BUFFER, state.shutdown.child_token());
    let session = RelaySession::new(state.workflow.clone(), request).with_pacing(state.pacing);

    tokio::spawn(async move {
        let outcome = session.run(sink).await;
        tracing::debug!(?outcome, "chat relay finished");
    });

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/ai/chat", post(handler))
        .with_state(state)
}
