//! Incremental decoding of the assistant's newline-delimited event stream.
//!
//! The response body is an open-ended sequence of byte chunks. Lines are split on
//! `\n` with a carry-over buffer, so a line (or a UTF-8 sequence) cut across
//! chunk boundaries is reassembled before parsing. Each non-blank line that
//! starts with [`EVENT_PREFIX`] carries one JSON object with a `type`
//! discriminator; everything else is ignored.

use futures_util::{Stream, StreamExt};
use scribe_types::RateLimits;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Marker that introduces an event line.
pub const EVENT_PREFIX: &str = "data:";

const MAX_LINE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// One decoded protocol event, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistEvent {
    /// Incremental text for the current assistant turn.
    Content(String),
    /// Raw section-specific suggestion payload (may carry a `message`).
    Suggestion(Value),
    /// Remaining-request telemetry; overwrites both counters.
    RateLimit(RateLimits),
    /// Turn completed.
    Done,
    /// Server-reported or transport failure; terminates the turn.
    Error(String),
}

impl AssistEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssistEvent::Done | AssistEvent::Error(_))
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event has no type")]
    MissingType,
    #[error("malformed {kind} event: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

/// Carry-over buffer that yields complete lines as chunks arrive.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Drain the next complete line, without its `\n` (and trailing `\r`).
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whatever is left after the final newline, once the body has ended.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        let mut rest = std::mem::take(&mut self.pending);
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        Some(rest)
    }
}

/// Parse one line of the stream.
///
/// Returns `Ok(None)` for blank lines, lines without the event marker, and
/// events of an unrecognized type.
pub fn parse_event_line(line: &str) -> Result<Option<AssistEvent>, DecodeError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix(EVENT_PREFIX) else {
        return Ok(None);
    };
    let payload = rest.strip_prefix(' ').unwrap_or(rest);

    let json: Value = serde_json::from_str(payload)?;
    let kind = json
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;
    let data = json.get("data");

    let event = match kind {
        "content" => {
            let text = data
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("content", "data is not a string"))?;
            AssistEvent::Content(text.to_string())
        }
        "suggestion" => {
            let payload = data
                .filter(|value| value.is_object())
                .ok_or_else(|| malformed("suggestion", "data is not an object"))?;
            AssistEvent::Suggestion(payload.clone())
        }
        "rate_limit" => {
            let data = data.ok_or_else(|| malformed("rate_limit", "missing data"))?;
            let limits = RateLimits::deserialize(data)
                .map_err(|e| malformed("rate_limit", e.to_string()))?;
            AssistEvent::RateLimit(limits)
        }
        "done" => AssistEvent::Done,
        "error" => {
            let message = data
                .and_then(Value::as_str)
                .filter(|msg| !msg.trim().is_empty())
                .unwrap_or("Assistant reported an error");
            AssistEvent::Error(message.to_string())
        }
        other => {
            tracing::debug!(event_type = other, "Ignoring unknown stream event");
            return Ok(None);
        }
    };

    Ok(Some(event))
}

fn malformed(kind: &'static str, reason: impl Into<String>) -> DecodeError {
    DecodeError::Malformed {
        kind,
        reason: reason.into(),
    }
}

enum LineOutcome {
    Continue,
    Stop,
}

async fn send_event(tx: &mpsc::Sender<AssistEvent>, event: AssistEvent) -> bool {
    tx.send(event).await.is_ok()
}

async fn dispatch_line(line: &[u8], tx: &mpsc::Sender<AssistEvent>) -> LineOutcome {
    let Ok(line) = std::str::from_utf8(line) else {
        let _ = send_event(
            tx,
            AssistEvent::Error("Received invalid UTF-8 from assistant stream".to_string()),
        )
        .await;
        return LineOutcome::Stop;
    };

    match parse_event_line(line) {
        Ok(None) => LineOutcome::Continue,
        Ok(Some(event)) => {
            let terminal = event.is_terminal();
            if !send_event(tx, event).await || terminal {
                LineOutcome::Stop
            } else {
                LineOutcome::Continue
            }
        }
        Err(e) => {
            tracing::warn!(%e, line_bytes = line.len(), "Invalid assistant stream payload");
            let _ = send_event(tx, AssistEvent::Error(format!("Invalid stream payload: {e}")))
                .await;
            LineOutcome::Stop
        }
    }
}

/// Decode a byte-chunk stream into [`AssistEvent`]s delivered through `tx`.
///
/// Stops after the first terminal event. A body that ends without `done` or
/// `error` is reported as an error event. When the receiver is dropped the
/// loop exits at the next chunk boundary without decoding further.
pub async fn process_event_stream<S, B, E>(stream: S, tx: &mpsc::Sender<AssistEvent>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut buffer = LineBuffer::new();

    while let Some(chunk) = stream.next().await {
        if tx.is_closed() {
            return;
        }

        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = send_event(tx, AssistEvent::Error(format!("Stream read failed: {e}"))).await;
                return;
            }
        };
        buffer.push(chunk.as_ref());

        // Security: prevent unbounded buffer growth from a line that never ends
        if buffer.pending_len() > MAX_LINE_BUFFER_BYTES {
            let _ = send_event(
                tx,
                AssistEvent::Error("Stream line exceeded maximum size (4 MiB)".to_string()),
            )
            .await;
            return;
        }

        while let Some(line) = buffer.next_line() {
            if let LineOutcome::Stop = dispatch_line(&line, tx).await {
                return;
            }
        }
    }

    if tx.is_closed() {
        return;
    }

    if let Some(rest) = buffer.take_remainder()
        && let LineOutcome::Stop = dispatch_line(&rest, tx).await
    {
        return;
    }

    // Premature EOF: connection closed without completion signal
    let _ = send_event(
        tx,
        AssistEvent::Error("Connection closed before stream completed".to_string()),
    )
    .await;
}
