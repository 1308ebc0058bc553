use futures::TryStreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::chunker::split_content;
use super::frame::{ClientFrame, MessageFrame};
use super::sse::{self, EventName};
use super::workflow::{ChatRequest, WorkflowClient};
use crate::errors::{RelayError, RelayResult};

/// How a relay session ended. Decided exactly once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Success,
    UpstreamFailure(String),
    ClientCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Terminating,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Terminating => "terminating",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Write half of a client connection.
///
/// Every frame is its own channel message and so its own body chunk; the
/// HTTP layer writes it out as soon as it is received. The sink counts as
/// cancelled once the receiving side is dropped (peer disconnect) or the
/// token fires (abort or server shutdown).
#[derive(Debug, Clone)]
pub struct ClientSink {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl ClientSink {
    pub fn new(tx: mpsc::Sender<String>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    pub fn channel(capacity: usize, cancel: CancellationToken) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx, cancel), rx)
    }

    pub async fn send(&self, frame: &ClientFrame) -> RelayResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RelayError::ClientGone);
        }
        self.tx
            .send(frame.to_sse())
            .await
            .map_err(|_| RelayError::ClientGone)
    }

    /// Resolves once the client is gone.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.tx.closed() => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

/// One chat request relayed end to end.
pub struct RelaySession {
    workflow: Arc<dyn WorkflowClient>,
    request: ChatRequest,
    pacing: Duration,
    state: SessionState,
    message_sent: bool,
}

impl RelaySession {
    pub fn new(workflow: Arc<dyn WorkflowClient>, request: ChatRequest) -> Self {
        Self {
            workflow,
            request,
            pacing: Duration::ZERO,
            state: SessionState::Connecting,
            message_sent: false,
        }
    }

    /// Pause between consecutive chunks so clients render them one by one.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to its outcome.
    ///
    /// Upstream consumption races the client's cancellation; whichever
    /// finishes first decides the outcome. The losing side is dropped on the
    /// spot, which closes the upstream connection and guarantees nothing is
    /// written after the terminal frame.
    pub async fn run(mut self, sink: ClientSink) -> RelayOutcome {
        let outcome = {
            let pump = self.pump(&sink);
            tokio::select! {
                biased;
                _ = sink.cancelled() => RelayOutcome::ClientCancelled,
                result = pump => match result {
                    Ok(()) => RelayOutcome::Success,
                    Err(RelayError::ClientGone) => RelayOutcome::ClientCancelled,
                    Err(err) => RelayOutcome::UpstreamFailure(err.to_string()),
                },
            }
        };

        self.terminate(&sink, &outcome).await;
        outcome
    }

    async fn pump(&mut self, sink: &ClientSink) -> RelayResult<()> {
        sink.send(&ClientFrame::connected()).await?;

        debug!(caller = %self.request.caller_id, "opening upstream stream");
        let body = self.workflow.stream(&self.request).await?;
        self.transition(SessionState::Streaming);

        let mut events = sse::events(body);
        while let Some(event) = events.try_next().await? {
            match event.name {
                EventName::Message => match MessageFrame::decode(&event.data) {
                    Ok(frame) => {
                        self.message_sent = true;
                        self.emit(sink, &frame.content).await?;
                        if frame.is_final {
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        warn!(%err, data = %event.data, "undecodable Message payload, forwarding raw");
                        sink.send(&ClientFrame::chunk(event.data)).await?;
                    }
                },
                EventName::Done => return Ok(()),
                name => {
                    debug!(event = ?name, data = %event.data, "upstream event");
                    if !self.message_sent {
                        sink.send(&ClientFrame::chunk(event.data)).await?;
                    }
                }
            }
        }
        drop(events);

        if !self.message_sent {
            self.fallback(sink).await?;
        }
        Ok(())
    }

    async fn emit(&self, sink: &ClientSink, content: &str) -> RelayResult<()> {
        for chunk in split_content(content) {
            if chunk.is_empty() {
                continue;
            }
            sink.send(&ClientFrame::chunk(chunk)).await?;
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }
        Ok(())
    }

    /// Some upstream runs end without streaming a single message. Ask once
    /// more without streaming and hand the whole body over in one frame.
    async fn fallback(&mut self, sink: &ClientSink) -> RelayResult<()> {
        info!(caller = %self.request.caller_id, "upstream stream ended without a message, retrying as a blocking run");
        let body = self.workflow.run(&self.request).await?;
        sink.send(&ClientFrame::full_response(body)).await
    }

    async fn terminate(&mut self, sink: &ClientSink, outcome: &RelayOutcome) {
        let frame = match outcome {
            RelayOutcome::Success => {
                info!(caller = %self.request.caller_id, "relay completed");
                Some(ClientFrame::completed())
            }
            RelayOutcome::UpstreamFailure(detail) => {
                warn!(caller = %self.request.caller_id, %detail, "relay failed");
                Some(ClientFrame::error(detail.as_str()))
            }
            RelayOutcome::ClientCancelled => {
                info!(caller = %self.request.caller_id, "client went away, closing silently");
                None
            }
        };

        if let Some(frame) = frame {
            self.transition(SessionState::Terminating);
            if sink.send(&frame).await.is_err() {
                debug!("client left before the terminal frame was written");
            }
        }
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "relay session state");
        self.state = next;
    }
}
