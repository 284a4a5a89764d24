//! Streaming response events.
//!
//! The answer is fully computed before chunking begins; delivery slices it
//! into fixed-stride `delta` events followed by one terminal `done` event
//! carrying the source listing (or a single terminal `error` event if the
//! orchestrator failed). Concatenating all delta payloads reconstructs the
//! answer exactly, so every boundary is a deterministic function of answer
//! length and stride.

use serde::{Deserialize, Serialize};

/// One newline-delimited JSON wire event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Delta { text: String },
    Done { sources: String },
    Error { error: String },
}

impl StreamEvent {
    /// Serializes to one NDJSON line (including the trailing newline).
    pub fn to_ndjson(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("{json}\n"),
            // Unreachable for these variants; keep the stream well-formed
            // rather than panicking mid-response.
            Err(_) => "{\"type\":\"error\",\"error\":\"event serialization failed\"}\n".to_string(),
        }
    }
}

/// Slices `answer` into `stride`-character pieces in original order.
/// Slicing is character-based, never splitting a UTF-8 code point.
pub fn delta_chunks(answer: &str, stride: usize) -> Vec<String> {
    if answer.is_empty() || stride == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = answer.chars().collect();
    chars
        .chunks(stride)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// The full success event sequence: zero or more deltas, then `done`.
pub fn answer_events(answer: &str, sources: &str, stride: usize) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = delta_chunks(answer, stride)
        .into_iter()
        .map(|text| StreamEvent::Delta { text })
        .collect();
    events.push(StreamEvent::Done {
        sources: sources.to_string(),
    });
    events
}
