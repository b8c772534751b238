//! Server-sent event streams
//!
//! Both hosted APIs stream replies as `data: <json>` lines. The response body
//! is read on a background task; text deltas are forwarded through a channel
//! and surface as a `TextStream`.

use futures::StreamExt;
use reqwest::Response;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::{Result, TroupeError};
use crate::llm::traits::TextStream;

/// Channel depth between the reader task and the consumer
const CHANNEL_CAPACITY: usize = 64;

/// What one `data:` payload means to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Text(String),
    Done,
    Skip,
}

/// Accumulates raw body bytes and hands out complete `data:` payloads
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: String,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete `data:` line
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

/// Turn an event-stream response into text chunks.
///
/// `interpret` maps each payload; `[DONE]` always ends the stream.
pub fn text_stream(
    response: Response,
    provider: &'static str,
    interpret: fn(&str) -> Result<SseEvent>,
) -> TextStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut buffer = SseBuffer::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let error = TroupeError::api(format!("{} stream error: {}", provider, e));
                    let _ = tx.send(Err(error)).await;
                    return;
                }
            };

            for payload in buffer.push(&String::from_utf8_lossy(&chunk)) {
                let event = if payload == "[DONE]" {
                    Ok(SseEvent::Done)
                } else {
                    interpret(&payload)
                };

                match event {
                    Ok(SseEvent::Text(text)) => {
                        if tx.send(Ok(text)).await.is_err() {
                            tracing::debug!(provider, "Stream consumer went away");
                            return;
                        }
                    }
                    Ok(SseEvent::Done) => return,
                    Ok(SseEvent::Skip) => {}
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
