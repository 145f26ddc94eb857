//! Streaming relay between a generative backend and an HTTP response
//!
//! [`RelayStream`] forwards each upstream chunk as soon as it arrives, in arrival
//! order, without batching. It owns the upstream stream: once the upstream ends,
//! fails, or the relay itself is dropped because the client went away, the
//! upstream is dropped and its connection released.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_stream::stream;
use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::{ready, Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::conversation::{Conversation, Message, ReplyBuffer};
use crate::providers::{ChunkStream, ProviderError};

use super::store::Conversations;

/// Assistant message recorded when generation fails
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Chunks are being forwarded
    Streaming,
    /// Upstream ended normally
    Closed,
    /// Upstream failed; nothing more is forwarded
    Failed,
}

pub struct RelayStream {
    upstream: Option<ChunkStream>,
    state: RelayState,
    chunks: usize,
    bytes: usize,
}

impl RelayStream {
    pub fn new(upstream: ChunkStream) -> Self {
        info!("relay started");
        Self {
            upstream: Some(upstream),
            state: RelayState::Streaming,
            chunks: 0,
            bytes: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Number of chunks forwarded so far
    pub fn forwarded(&self) -> usize {
        self.chunks
    }

    fn finish(&mut self, state: RelayState) {
        self.state = state;
        self.upstream = None;
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let Some(upstream) = this.upstream.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(upstream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => {
                    this.chunks += 1;
                    this.bytes += chunk.len();
                    return Poll::Ready(Some(Ok(Bytes::from(chunk))));
                }
                Some(Err(e)) => {
                    error!(
                        chunks = this.forwarded(),
                        bytes = this.bytes,
                        "upstream failed mid-stream: {}",
                        e
                    );
                    this.finish(RelayState::Failed);
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    debug!(chunks = this.forwarded(), bytes = this.bytes, "relay closed");
                    this.finish(RelayState::Closed);
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if self.state() == RelayState::Streaming {
            debug!(
                chunks = self.forwarded(),
                "client disconnected, releasing upstream stream"
            );
        }
    }
}

impl IntoResponse for RelayStream {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}

/// Wrap `upstream` so the finished reply is appended to `chat` and saved.
///
/// On upstream failure the fallback reply is stored instead, then the error is
/// passed on. If the consumer drops the stream early nothing is saved.
pub fn record_reply(
    upstream: ChunkStream,
    conversations: Conversations,
    user_id: String,
    chat: Conversation,
) -> ChunkStream {
    Box::pin(stream! {
        let mut upstream = upstream;
        let mut chat = chat;
        let mut reply = ReplyBuffer::new();
        let mut failure = None;

        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    reply.append(&chunk);
                    yield Ok(chunk);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(upstream);

        let message = match failure {
            Some(_) => Message::assistant(FALLBACK_REPLY),
            None => {
                if reply.is_empty() {
                    warn!(chat_id = %chat.id, "backend produced an empty reply");
                }
                debug!(
                    chat_id = %chat.id,
                    chunks = reply.chunks(),
                    bytes = reply.text().len(),
                    "reply complete"
                );
                reply.into_message()
            }
        };

        if let Err(e) = conversations.append(&user_id, &mut chat, message).await {
            error!(user_id = %user_id, chat_id = %chat.id, "failed to save reply: {}", e);
        }

        if let Some(e) = failure {
            yield Err(e);
        }
    })
}
