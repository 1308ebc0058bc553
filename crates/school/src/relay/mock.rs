use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::workflow::{ByteStream, ChatRequest, WorkflowClient};
use crate::errors::{RelayError, RelayResult};

/// Flags the upstream as released when the body stream is dropped.
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A scripted workflow for exercising relay sessions without a network.
pub struct MockWorkflow {
    connect_error: Mutex<Option<RelayError>>,
    chunks: Mutex<Vec<RelayResult<Bytes>>>,
    hang: bool,
    fallback: Mutex<Option<RelayResult<String>>>,
    pub stream_calls: AtomicUsize,
    pub run_calls: AtomicUsize,
    pub released: Arc<AtomicBool>,
}

impl MockWorkflow {
    /// Upstream body delivered as the given chunks, then EOF.
    pub fn new<S: Into<String>>(chunks: Vec<S>) -> Self {
        Self {
            connect_error: Mutex::new(None),
            chunks: Mutex::new(
                chunks
                    .into_iter()
                    .map(|c| Ok(Bytes::from(c.into())))
                    .collect(),
            ),
            hang: false,
            fallback: Mutex::new(None),
            stream_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fails the streaming call itself with the given status.
    pub fn rejecting(status: u16, body: &str) -> Self {
        let mock = Self::new(Vec::<String>::new());
        *mock.connect_error.lock().unwrap() = Some(RelayError::Status {
            status,
            body: body.to_string(),
        });
        mock
    }

    /// Never reaches EOF after the scripted chunks.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Append a failing read after the scripted chunks.
    pub fn then_fail(self, error: RelayError) -> Self {
        self.chunks.lock().unwrap().push(Err(error));
        self
    }

    pub fn with_fallback(self, result: RelayResult<String>) -> Self {
        *self.fallback.lock().unwrap() = Some(result);
        self
    }
}

#[async_trait]
impl WorkflowClient for MockWorkflow {
    async fn stream(&self, _request: &ChatRequest) -> RelayResult<ByteStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.connect_error.lock().unwrap().take() {
            return Err(err);
        }

        let chunks = std::mem::take(&mut *self.chunks.lock().unwrap());
        let guard = ReleaseGuard(self.released.clone());
        let body = stream::iter(chunks);
        let body: ByteStream = if self.hang {
            Box::pin(body.chain(stream::pending()))
        } else {
            Box::pin(body)
        };

        Ok(Box::pin(body.map(move |item| {
            let _held = &guard;
            item
        })))
    }

    async fn run(&self, _request: &ChatRequest) -> RelayResult<String> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        self.fallback
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(String::new()))
    }
}
