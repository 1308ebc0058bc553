//! Incremental parsing of the upstream workflow's event stream.
//!
//! The upstream speaks line-oriented SSE: `event: <name>` sets the name used
//! by every following `data: <payload>` line until the next `event:` line.
//! Each data line yields one [`UpstreamEvent`].

use futures::stream::BoxStream;
use futures::StreamExt;

use super::workflow::ByteStream;
use crate::errors::{RelayError, RelayResult};

/// Longest line accepted from the upstream, excluding the line terminator.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventName {
    Message,
    Done,
    Other(String),
    /// No `event:` line has been seen yet
    Unnamed,
}

impl EventName {
    pub fn parse(name: &str) -> Self {
        match name {
            "Message" => EventName::Message,
            "Done" => EventName::Done,
            "" => EventName::Unnamed,
            other => EventName::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEvent {
    pub name: EventName,
    pub data: String,
}

/// Accumulates raw bytes and hands out complete lines.
///
/// Lines are read from `start` onwards; consumed bytes are only dropped on
/// the next `extend`, so handing out many lines from one chunk stays linear.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    start: usize,
    limit: usize,
}

impl LineBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            start: 0,
            limit,
        }
    }

    /// Append bytes. Fails as soon as the unterminated tail can no longer
    /// fit in one line, so a runaway line never grows the buffer unbounded.
    pub fn extend(&mut self, bytes: &[u8]) -> RelayResult<()> {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        self.buf.extend_from_slice(bytes);
        let tail = match self.buf.iter().rposition(|b| *b == b'\n') {
            Some(pos) => self.buf.len() - pos - 1,
            None => self.buf.len(),
        };
        // one extra byte of room for a CR that precedes the LF
        if tail > self.limit + 1 {
            return Err(RelayError::LineTooLong { limit: self.limit });
        }
        Ok(())
    }

    /// Next complete line without its `\n` / `\r\n` terminator.
    pub fn next_line(&mut self) -> RelayResult<Option<String>> {
        let unread = &self.buf[self.start..];
        let Some(pos) = unread.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let line = unread[..pos].to_vec();
        self.start += pos + 1;
        self.to_line(line).map(Some)
    }

    /// The unterminated remainder once the input has ended, if any.
    pub fn finish(&mut self) -> RelayResult<Option<String>> {
        let rest = self.buf.split_off(self.start);
        self.buf.clear();
        self.start = 0;
        if rest.is_empty() {
            return Ok(None);
        }
        self.to_line(rest).map(Some)
    }

    fn to_line(&self, mut line: Vec<u8>) -> RelayResult<String> {
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > self.limit {
            return Err(RelayError::LineTooLong { limit: self.limit });
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Turns lines into events, remembering the current event name.
#[derive(Debug, Default)]
pub struct EventParser {
    current: Option<String>,
}

impl EventParser {
    pub fn feed(&mut self, line: &str) -> Option<UpstreamEvent> {
        if line.is_empty() {
            return None;
        }
        if let Some(name) = field(line, "event") {
            self.current = Some(name.to_string());
            return None;
        }
        let data = field(line, "data")?;
        Some(UpstreamEvent {
            name: self
                .current
                .as_deref()
                .map_or(EventName::Unnamed, EventName::parse),
            data: data.to_string(),
        })
    }
}

/// `name:value` with at most one space after the colon dropped
fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

/// Lazily parse an upstream body into events. The stream ends after the
/// first error.
pub fn events(mut body: ByteStream) -> BoxStream<'static, RelayResult<UpstreamEvent>> {
    Box::pin(async_stream::try_stream! {
        let mut lines = LineBuffer::new(MAX_LINE_BYTES);
        let mut parser = EventParser::default();

        while let Some(chunk) = body.next().await {
            lines.extend(&chunk?)?;
            while let Some(line) = lines.next_line()? {
                if let Some(event) = parser.feed(&line) {
                    yield event;
                }
            }
        }

        if let Some(line) = lines.finish()? {
            if let Some(event) = parser.feed(&line) {
                yield event;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::{stream, TryStreamExt};

    fn body<S: Into<String>>(parts: Vec<S>) -> ByteStream {
        let chunks: Vec<RelayResult<Bytes>> = parts
            .into_iter()
            .map(|p| Ok(Bytes::from(p.into())))
            .collect();
        Box::pin(stream::iter(chunks))
    }

    async fn collect<S: Into<String>>(parts: Vec<S>) -> RelayResult<Vec<UpstreamEvent>> {
        events(body(parts)).try_collect().await
    }

    fn event(name: EventName, data: &str) -> UpstreamEvent {
        UpstreamEvent {
            name,
            data: data.to_string(),
        }
    }

    #[tokio::test]
    async fn test_event_name_persists_across_data_lines() {
        let parsed = collect(vec![
            "event: Message\ndata: {\"content\":\"a\"}\n\ndata: {\"content\":\"b\"}\n\n",
            "event: Done\ndata: {}\n\n",
        ])
        .await
        .unwrap();

        assert_eq!(
            parsed,
            vec![
                event(EventName::Message, "{\"content\":\"a\"}"),
                event(EventName::Message, "{\"content\":\"b\"}"),
                event(EventName::Done, "{}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let parsed = collect(vec!["ev", "ent: Mess", "age\r\nda", "ta: hel", "lo\r\n"])
            .await
            .unwrap();
        assert_eq!(parsed, vec![event(EventName::Message, "hello")]);
    }

    #[tokio::test]
    async fn test_data_without_event_is_unnamed() {
        let parsed = collect(vec!["data: ping\n", ": comment\nid: 7\n"])
            .await
            .unwrap();
        assert_eq!(parsed, vec![event(EventName::Unnamed, "ping")]);
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_parsed() {
        let parsed = collect(vec!["event: PING\ndata:tail"]).await.unwrap();
        assert_eq!(
            parsed,
            vec![event(EventName::Other("PING".to_string()), "tail")]
        );
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let line = format!("data: {}\n", "x".repeat(MAX_LINE_BYTES - "data: ".len()));
        let parsed = collect(vec![line]).await.unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_line_is_fatal() {
        let line = format!("data: {}", "x".repeat(MAX_LINE_BYTES + 10));
        let err = collect(vec!["event: Message\n".to_string(), line])
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::LineTooLong { .. }));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let failing: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"data: first\n")),
            Err(RelayError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            Ok(Bytes::from_static(b"data: never\n")),
        ]));

        let mut parsed = events(failing);
        assert_eq!(
            parsed.try_next().await.unwrap(),
            Some(event(EventName::Unnamed, "first"))
        );
        assert!(parsed.try_next().await.is_err());
        assert!(parsed.try_next().await.unwrap().is_none());
    }

    #[test]
    fn test_many_lines_in_one_chunk() {
        let mut lines = LineBuffer::new(MAX_LINE_BYTES);
        let chunk: String = (0..10_000).map(|i| format!("data: {}\n", i)).collect();
        lines.extend(chunk.as_bytes()).unwrap();

        let mut count = 0;
        while let Some(line) = lines.next_line().unwrap() {
            assert_eq!(line, format!("data: {}", count));
            count += 1;
        }
        assert_eq!(count, 10_000);

        // consumed lines are dropped on the next append
        lines.extend(b"data: tail").unwrap();
        assert_eq!(lines.buf, b"data: tail");
        assert_eq!(lines.next_line().unwrap(), None);
        assert_eq!(lines.finish().unwrap().as_deref(), Some("data: tail"));
        assert_eq!(lines.finish().unwrap(), None);
    }

    #[test]
    fn test_event_name_classification() {
        assert_eq!(EventName::parse("Message"), EventName::Message);
        assert_eq!(EventName::parse("Done"), EventName::Done);
        assert_eq!(EventName::parse(""), EventName::Unnamed);
        assert_eq!(
            EventName::parse("Error"),
            EventName::Other("Error".to_string())
        );
    }
}
