//! Streaming relay between a chat client and the upstream AI workflow.
//!
//! A [`session::RelaySession`] opens the upstream event stream, re-chunks the
//! message content it carries and forwards it to the client as
//! `data: {"code", "msg", "data"}` frames, ending with exactly one terminal
//! frame unless the client went away first.

pub mod chunker;
pub mod frame;
pub mod session;
pub mod sse;
pub mod workflow;

#[cfg(test)]
pub mod mock;

pub use session::{ClientSink, RelayOutcome, RelaySession};
pub use workflow::{ChatRequest, HttpWorkflowClient, WorkflowClient, WorkflowConfig};
