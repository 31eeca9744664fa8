//! Server-sent event stream client.
//!
//! Framing is separated from transport: [`SseDecoder`] turns bytes into
//! [`Event`]s, [`ChunkSource`] supplies bytes, and [`EventStream`] pulls one
//! from the other. Only the `event` and `data` fields are interpreted; there
//! is no retry handling and no last-event-id tracking. A stream is not
//! restartable: reconnecting means calling [`subscribe`] again.

use async_trait::async_trait;
use futures::Stream;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::debug;

use crate::error::{ConductError, ConductResult};

/// Frame delimiters, any of which ends an event.
const FRAME_DELIMITERS: [&[u8]; 3] = [b"\r\n\r\n", b"\r\r", b"\n\n"];

/// One parsed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Value of the `event` field.
    pub event: Option<String>,

    /// Value of the `data` field.
    pub data: Option<String>,
}

impl Event {
    /// Frames without an `event` field are heartbeats.
    pub fn is_heartbeat(&self) -> bool {
        self.event.is_none()
    }
}

/// Parse one frame (without its trailing delimiter).
///
/// Each line is split at its first colon and one leading space is stripped
/// from the value, so values may themselves contain colons. Later lines
/// override earlier ones; unknown fields and `:` comment lines are ignored.
/// A non-empty line without any colon makes the frame malformed.
pub fn parse_event(frame: &str) -> ConductResult<Event> {
    let mut event = Event::default();

    for line in frame.split(['\r', '\n']) {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or_else(|| ConductError::Stream {
            message: format!("line without field separator: {:?}", line),
        })?;
        let value = value.strip_prefix(' ').unwrap_or(value);

        match key {
            "event" => event.event = Some(value.to_string()),
            "data" => event.data = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(event)
}

/// Position and length of the earliest frame delimiter in `buf`.
fn find_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    FRAME_DELIMITERS
        .iter()
        .filter_map(|delim| {
            buf.windows(delim.len())
                .position(|w| w == *delim)
                .map(|pos| (pos, delim.len()))
        })
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
}

/// Incremental frame decoder backed by a growable buffer.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, keeping any remainder buffered.
    ///
    /// `None` means more bytes are needed.
    pub fn next_event(&mut self) -> Option<ConductResult<Event>> {
        let (pos, len) = find_delimiter(&self.buf)?;
        let frame: Vec<u8> = self.buf.drain(..pos + len).take(pos).collect();
        Some(parse_event(&String::from_utf8_lossy(&frame)))
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Source of raw bytes for an event stream.
#[async_trait]
pub trait ChunkSource: Send {
    /// Next chunk, or `None` once the connection is closed.
    async fn next_chunk(&mut self) -> ConductResult<Option<Vec<u8>>>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> ConductResult<Option<Vec<u8>>> {
        Ok(self.chunk().await?.map(|bytes| bytes.to_vec()))
    }
}

/// Pull-based event stream over a chunk source.
pub struct EventStream<S> {
    source: S,
    decoder: SseDecoder,
    closed: bool,
}

impl<S: ChunkSource> EventStream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            decoder: SseDecoder::new(),
            closed: false,
        }
    }

    /// Next event in stream order.
    ///
    /// Blocks until a full frame has arrived. `Ok(None)` means the
    /// connection closed; a trailing incomplete frame is discarded. A
    /// transport error also closes the stream, after frames already
    /// buffered have been returned.
    pub async fn next_event(&mut self) -> ConductResult<Option<Event>> {
        loop {
            if let Some(event) = self.decoder.next_event() {
                return event.map(Some);
            }
            if self.closed {
                return Ok(None);
            }

            let chunk = match self.source.next_chunk().await {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.closed = true;
                    return Err(e);
                }
            };
            match chunk {
                Some(chunk) => self.decoder.push(&chunk),
                None => {
                    if self.decoder.buffered() > 0 {
                        debug!(
                            bytes = self.decoder.buffered(),
                            "discarding incomplete trailing frame"
                        );
                    }
                    self.closed = true;
                    return Ok(None);
                }
            }
        }
    }

    /// Lazy `Stream` of events, ending when the connection closes.
    pub fn into_stream(self) -> impl Stream<Item = ConductResult<Event>> {
        futures::stream::unfold(self, |mut stream| async move {
            match stream.next_event().await {
                Ok(Some(event)) => Some((Ok(event), stream)),
                Ok(None) => None,
                Err(e) => Some((Err(e), stream)),
            }
        })
    }
}

/// Open an event stream.
///
/// `client` should not carry a total request timeout, which would cut the
/// stream off.
pub async fn subscribe(
    client: &reqwest::Client,
    url: &str,
) -> ConductResult<EventStream<reqwest::Response>> {
    debug!(url, "subscribing to event stream");
    let response = client
        .get(url)
        .header(CACHE_CONTROL, "no-cache")
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ConductError::Http {
            status: status.as_u16(),
            message: format!("failed to subscribe to {}", url),
        });
    }

    Ok(EventStream::new(response))
}
