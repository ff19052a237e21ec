//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! The completion endpoint frames each chunk as a `data:` line followed by a
//! blank line and closes the stream with `data: [DONE]`.  This module turns the
//! raw response body into a stream of [`SseEvent`]s.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// A decoded server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A completion chunk.
    Chunk(ChatCompletionChunk),
    /// The `[DONE]` sentinel.
    Done,
}

/// Process a stream of bytes into a stream of server-sent events.
///
/// Events are split on blank lines, with lines ending in any mix of `\n`, `\r\n`
/// and `\r`.  A chunk boundary may fall anywhere, including inside a multi-byte
/// character or a `\r\n` pair.  Comment-only and empty events are skipped.  The stream ends after `[DONE]` or when the body ends.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    // Convert transport errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    // Use a state machine to process the SSE stream
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // First check if we have a complete event in the buffer
                if let Some((event, remaining)) = take_event(&buffer) {
                    buffer = remaining;
                    match parse_event(&event) {
                        Some(Ok(SseEvent::Done)) => {
                            return Some((Ok(SseEvent::Done), (stream, buffer, true)));
                        }
                        Some(result) => return Some((result, (stream, buffer, false))),
                        None => continue,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer, true)));
                    }
                    None => {
                        // End of stream; a final event may lack its blank line
                        let tail = std::mem::take(&mut buffer);
                        return parse_event(&tail).map(|result| (result, (stream, buffer, true)));
                    }
                }
            }
        },
    )
}

/// Split the first complete event off the front of `buffer`.
fn take_event(buffer: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let (end, skip) = find_boundary(buffer)?;
    Some((buffer[..end].to_vec(), buffer[end + skip..].to_vec()))
}

/// Locate the earliest blank line, returning its offset and the length of its
/// line ending.  Lines end in `\n`, `\r\n` or a lone `\r`, mixed freely.
fn find_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    let mut i = 0;
    while i < buffer.len() {
        let ending = match (buffer[i], buffer.get(i + 1)) {
            (b'\r', Some(&b'\n')) => 2,
            (b'\r' | b'\n', _) => 1,
            _ => {
                i += 1;
                continue;
            }
        };
        if i == line_start && i > 0 {
            return Some((i, ending));
        }
        i += ending;
        line_start = i;
    }
    None
}

/// Decode one event.  `None` means the event carries no data and is skipped.
fn parse_event(raw: &[u8]) -> Option<Result<SseEvent>> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => {
            return Some(Err(Error::encoding(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            )));
        }
    };

    // Multiple data lines are joined with newlines
    let mut data: Option<String> = None;
    for line in text.split(['\r', '\n']) {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    let data = data?;
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(SseEvent::Done));
    }
    Some(
        serde_json::from_str::<ChatCompletionChunk>(data)
            .map(SseEvent::Chunk)
            .map_err(|e| {
                Error::serialization(
                    format!("Failed to parse event JSON: {e}"),
                    Some(Box::new(e)),
                )
            }),
    )
}
