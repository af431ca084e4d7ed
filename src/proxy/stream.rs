//! Pseudo-streaming of a fully computed reply.
//!
//! [`PseudoStream`] turns the final content into a finite sequence of
//! [`StreamFrame`]s: fixed-size content chunks, one stop chunk, then the
//! `[DONE]` sentinel. [`sse_body`] encodes those frames as server-sent
//! events and inserts a [`Pacer`] pause after every content chunk.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, Stream};

use super::types::ChatCompletionChunk;

/// Pause policy between content chunks.
pub trait Pacer: Send + Sync {
    fn pause(&self) -> BoxFuture<'static, ()>;
}

/// Sleeps for a fixed duration on every pause.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Pacer for FixedDelay {
    fn pause(&self) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(self.0))
    }
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) -> BoxFuture<'static, ()> {
        Box::pin(futures::future::ready(()))
    }
}

/// Pick a pacer for the configured delay; zero means no pausing at all.
pub fn pacer_for(delay: Duration) -> Arc<dyn Pacer> {
    if delay.is_zero() {
        Arc::new(NoDelay)
    } else {
        Arc::new(FixedDelay(delay))
    }
}

/// One unit of pseudo-stream output.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    /// A slice of the reply, `finish_reason: null`.
    Content(ChatCompletionChunk),
    /// Empty delta with `finish_reason: "stop"`.
    Stop(ChatCompletionChunk),
    /// The literal `[DONE]` sentinel.
    Done,
}

impl StreamFrame {
    pub fn is_content(&self) -> bool {
        matches!(self, StreamFrame::Content(_))
    }

    /// Encode as one SSE event: `data: <payload>\n\n`.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        match self {
            StreamFrame::Content(chunk) | StreamFrame::Stop(chunk) => sse_data(chunk),
            StreamFrame::Done => Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        }
    }
}

fn sse_data(chunk: &ChatCompletionChunk) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(chunk)?;
    Ok(Bytes::from(format!("data: {}\n\n", json)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Content,
    Stop,
    Done,
    Finished,
}

/// Lazy producer of the frames for one reply.
///
/// Slices are taken per `char`, so a multi-byte character is never split
/// across two chunks.
#[derive(Debug)]
pub struct PseudoStream {
    id: String,
    model: Option<String>,
    content: String,
    chunk_size: usize,
    offset: usize,
    phase: Phase,
}

impl PseudoStream {
    /// `chunk_size` is clamped to at least one character.
    pub fn new(
        id: impl Into<String>,
        model: Option<String>,
        content: String,
        chunk_size: usize,
    ) -> Self {
        Self {
            id: id.into(),
            model,
            content,
            chunk_size: chunk_size.max(1),
            offset: 0,
            phase: Phase::Content,
        }
    }

    /// Terminal chunk carrying an inline error annotation.
    pub fn error_chunk(&self, message: &str) -> ChatCompletionChunk {
        ChatCompletionChunk::new(
            &self.id,
            self.model.as_deref(),
            &format!("\n\n[Stream Error: {}]", message),
            Some("stop"),
        )
    }

    fn next_slice(&mut self) -> Option<String> {
        let rest = &self.content[self.offset..];
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(self.chunk_size)
            .map_or(rest.len(), |(i, _)| i);
        let slice = rest[..end].to_string();
        self.offset += end;
        Some(slice)
    }
}

impl Iterator for PseudoStream {
    type Item = StreamFrame;

    fn next(&mut self) -> Option<StreamFrame> {
        loop {
            match self.phase {
                Phase::Content => match self.next_slice() {
                    Some(slice) => {
                        return Some(StreamFrame::Content(ChatCompletionChunk::new(
                            &self.id,
                            self.model.as_deref(),
                            &slice,
                            None,
                        )));
                    }
                    None => self.phase = Phase::Stop,
                },
                Phase::Stop => {
                    self.phase = Phase::Done;
                    return Some(StreamFrame::Stop(ChatCompletionChunk::new(
                        &self.id,
                        self.model.as_deref(),
                        "",
                        Some("stop"),
                    )));
                }
                Phase::Done => {
                    self.phase = Phase::Finished;
                    return Some(StreamFrame::Done);
                }
                Phase::Finished => return None,
            }
        }
    }
}

type Encoder = fn(&StreamFrame) -> Result<Bytes, serde_json::Error>;

struct Emitter {
    frames: PseudoStream,
    pacer: Arc<dyn Pacer>,
    encode: Encoder,
    pause_pending: bool,
    closed: bool,
    emitted: usize,
}

/// Encode `frames` as an SSE byte stream, pausing after each content chunk.
///
/// If a frame cannot be encoded, one error chunk with `finish_reason: "stop"`
/// is emitted and the stream ends without `[DONE]`.
pub fn sse_body(
    frames: PseudoStream,
    pacer: Arc<dyn Pacer>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    encode_with(frames, pacer, StreamFrame::encode)
}

fn encode_with(
    frames: PseudoStream,
    pacer: Arc<dyn Pacer>,
    encode: Encoder,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let emitter = Emitter {
        frames,
        pacer,
        encode,
        pause_pending: false,
        closed: false,
        emitted: 0,
    };

    stream::unfold(emitter, |mut emitter| async move {
        if emitter.closed {
            return None;
        }
        if emitter.pause_pending {
            emitter.pacer.pause().await;
            emitter.pause_pending = false;
        }

        let frame = emitter.frames.next()?;
        match (emitter.encode)(&frame) {
            Ok(bytes) => {
                emitter.pause_pending = frame.is_content();
                emitter.emitted += 1;
                if matches!(frame, StreamFrame::Done) {
                    tracing::debug!(
                        id = %emitter.frames.id,
                        events = emitter.emitted,
                        "Stream complete"
                    );
                }
                Some((Ok::<_, Infallible>(bytes), emitter))
            }
            Err(e) => {
                tracing::error!(
                    id = %emitter.frames.id,
                    error = %e,
                    "Failed to encode stream chunk"
                );
                emitter.closed = true;
                let bytes =
                    sse_data(&emitter.frames.error_chunk(&e.to_string())).unwrap_or_default();
                Some((Ok::<_, Infallible>(bytes), emitter))
            }
        }
    })
}
