use serde::{Deserialize, Serialize};

const CONNECTED_NOTICE: &str = "connection established, waiting for response...";

/// Envelope of every event written to the chat client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub code: u16,
    pub msg: String,
    pub data: Option<String>,
}

impl ClientFrame {
    fn ok(msg: &str, data: impl Into<String>) -> Self {
        Self {
            code: 200,
            msg: msg.to_string(),
            data: Some(data.into()),
        }
    }

    pub fn connected() -> Self {
        Self::ok("connected", CONNECTED_NOTICE)
    }

    pub fn chunk(payload: impl Into<String>) -> Self {
        Self::ok("success", payload)
    }

    pub fn full_response(body: impl Into<String>) -> Self {
        Self::ok("full_response", body)
    }

    pub fn completed() -> Self {
        Self::ok("completed", "")
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self::failure(500, detail)
    }

    pub fn failure(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            msg: detail.into(),
            data: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.code != 200 || self.msg == "completed"
    }

    /// Render as one SSE event: `data: <json>\n\n`
    pub fn to_sse(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"));
        format!("data: {}\n\n", json)
    }

    /// Inverse of [`ClientFrame::to_sse`] for a single event.
    pub fn from_sse(event: &str) -> Option<Self> {
        let json = event.trim_end().strip_prefix("data: ")?;
        serde_json::from_str(json).ok()
    }
}

/// Payload of an upstream `Message` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageFrame {
    #[serde(default)]
    pub content: String,
    /// Set on the last message of the run
    #[serde(default, rename = "node_is_finish")]
    pub is_final: bool,
}

impl MessageFrame {
    pub fn decode(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}
