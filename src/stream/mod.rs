//! Live Server-Sent Events delivery.
//!
//! Receivers with the page open hold a `GET /events` stream. Each open stream
//! is one entry in the [`StreamRegistry`]; a notification is written to all of
//! them as a single named SSE frame.

pub mod registry;

pub use registry::{ConnectionId, FrameSender, StreamConnection, StreamRegistry};

use axum::response::sse::Event;

/// One named SSE event, shared by every connection it is broadcast to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFrame {
    event: String,
    data: String,
}

impl StreamFrame {
    /// Create a frame with the given event name and data payload.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Payload (the `data:` field).
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Serialized `text/event-stream` form, terminated by a blank line.
    pub fn to_wire(&self) -> String {
        let mut out = format!("event: {}\n", self.event);
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }

    /// Convert into the axum SSE event written to the response body.
    pub fn to_sse_event(&self) -> Event {
        Event::default().event(&self.event).data(&self.data)
    }
}
