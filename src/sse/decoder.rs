// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Incremental decoder for `event:`/`data:` framed server-sent events

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::{OctoError, Result};

const BLOCK_DELIMITER: &[u8] = b"\n\n";

/// Data carried by one SSE block.
#[derive(Debug, Clone, PartialEq)]
pub enum SsePayload {
    Json(Value),
    /// The data line was not valid JSON
    Text(String),
}

/// One decoded SSE block that carried both an event name and data.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: String,
    pub raw_data: String,
    pub payload: SsePayload,
}

impl SseEvent {
    fn new(event_type: String, raw_data: String) -> Self {
        let payload = match serde_json::from_str::<Value>(&raw_data) {
            Ok(value) => SsePayload::Json(value),
            Err(_) => SsePayload::Text(raw_data.clone()),
        };
        Self {
            event_type,
            raw_data,
            payload,
        }
    }

    /// The JSON payload, if the data line parsed.
    pub fn json(&self) -> Option<&Value> {
        match &self.payload {
            SsePayload::Json(value) => Some(value),
            SsePayload::Text(_) => None,
        }
    }
}

/// Buffers raw bytes and yields events as complete blocks arrive.
///
/// Decoding to UTF-8 happens per complete block, so a multi-byte character
/// split across two chunks decodes the same as if it arrived in one.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete block.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(split) = find_delimiter(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..split + BLOCK_DELIMITER.len()).collect();
            if let Some(event) = parse_block(&block[..split]) {
                events.push(event);
            }
        }

        events
    }

    /// End of input. Complete blocks were already drained by `feed`, so
    /// whatever is left is an unterminated tail and is discarded.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let events = self.feed(&[]);
        if !self.buffer.is_empty() {
            tracing::trace!(
                target: "octopus.sse",
                bytes = self.buffer.len(),
                "discarding incomplete trailing block"
            );
            self.buffer.clear();
        }
        events
    }

    /// Bytes held back waiting for a block delimiter.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(BLOCK_DELIMITER.len())
        .position(|window| window == BLOCK_DELIMITER)
}

fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn parse_block(block: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(block);
    if text.trim().is_empty() {
        return None;
    }

    let mut event_type = None;
    let mut data = None;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(value) = field_value(line, "event") {
            event_type = Some(value.to_string());
        } else if let Some(value) = field_value(line, "data") {
            // A later data line replaces an earlier one
            data = Some(value.to_string());
        }
    }

    match (event_type, data) {
        (Some(event_type), Some(data)) => Some(SseEvent::new(event_type, data)),
        _ => {
            tracing::trace!(target: "octopus.sse", block = %text, "dropping block without event and data");
            None
        }
    }
}

/// Decode a body byte stream into SSE events.
///
/// Events decoded from one chunk are yielded before the next chunk is
/// polled. A transport error ends the stream with that error.
pub fn decode_stream<S, B, E>(body: S) -> impl Stream<Item = Result<SseEvent>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<OctoError>,
{
    async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        futures::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| -> OctoError { err.into() })?;
            for event in decoder.feed(chunk.as_ref()) {
                yield event;
            }
        }

        for event in decoder.finish() {
            yield event;
        }
    }
}
