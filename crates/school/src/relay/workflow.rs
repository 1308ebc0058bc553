use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;

use crate::errors::{RelayError, RelayResult};

/// Raw upstream body, read as it arrives.
pub type ByteStream = BoxStream<'static, RelayResult<Bytes>>;

/// A chat question accepted from an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub query: String,
    pub caller_id: String,
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub url: String,
    pub token: String,
    pub workflow_id: String,
    /// Upper bound for a whole upstream exchange, body included
    pub timeout: Duration,
}

/// The third-party workflow the relay talks to.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Start a streaming run. Resolves once a successful response head has
    /// arrived; dropping the returned stream releases the connection.
    async fn stream(&self, request: &ChatRequest) -> RelayResult<ByteStream>;

    /// Run to completion and return the whole response body.
    async fn run(&self, request: &ChatRequest) -> RelayResult<String>;
}

pub struct HttpWorkflowClient {
    client: Client,
    config: WorkflowConfig,
}

impl HttpWorkflowClient {
    pub fn new(config: WorkflowConfig) -> RelayResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn payload(&self, request: &ChatRequest) -> Value {
        json!({
            "parameters": {
                "query": request.query,
                "student_id": request.caller_id,
            },
            "workflow_id": self.config.workflow_id,
        })
    }

    async fn post(&self, request: &ChatRequest, streaming: bool) -> RelayResult<Response> {
        let mut builder = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.token)
            .json(&self.payload(request));
        if streaming {
            builder = builder.header(ACCEPT, "text/event-stream");
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn stream(&self, request: &ChatRequest) -> RelayResult<ByteStream> {
        let response = self.post(request, true).await?;
        Ok(Box::pin(response.bytes_stream().map_err(RelayError::from)))
    }

    async fn run(&self, request: &ChatRequest) -> RelayResult<String> {
        Ok(self.post(request, false).await?.text().await?)
    }
}
