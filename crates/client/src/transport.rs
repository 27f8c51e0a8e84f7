// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Frame transport over WebSocket.
//!
//! A [`Transport`] moves whole STOMP frames and knows nothing about the
//! handshake or subscriptions, which live in the client driver. Tests
//! swap in a mock implementation.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use parley_core::Frame;
use tracing::{debug, warn};
use url::Url;

/// Socket-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Dial or upgrade failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The socket is gone.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// Everything needed to open one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Endpoint URL (`ws://` or `wss://`).
    pub url: String,
    /// Bearer token read from the credential source for this attempt.
    pub token: String,
    /// Also pass the token as an `access_token` query parameter.
    pub query_token: bool,
}

impl ConnectRequest {
    /// Returns the URL to dial, with the query token appended when enabled.
    pub fn effective_url(&self) -> TransportResult<Url> {
        let mut url = Url::parse(&self.url).map_err(|e| {
            TransportError::ConnectionFailed(format!("invalid url {}: {}", self.url, e))
        })?;
        if self.query_token {
            url.query_pairs_mut()
                .append_pair("access_token", &self.token);
        }
        Ok(url)
    }

    /// Returns `host[:port]` of the URL, used as the CONNECT `host`.
    ///
    /// Falls back to the raw URL when it does not parse.
    pub fn host(&self) -> String {
        let Ok(url) = Url::parse(&self.url) else {
            return self.url.clone();
        };
        match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => self.url.clone(),
        }
    }

    /// Returns the `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// A bidirectional frame channel to the broker.
pub trait Transport: Send {
    /// Open a connection, authenticating the upgrade request.
    fn connect(&mut self, request: &ConnectRequest) -> TransportFuture<'_, ()>;

    /// Close the connection. Closing a closed transport is a no-op.
    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    /// Send one frame.
    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()>;

    /// Receive the next frame.
    ///
    /// Returns `None` if the connection is closed.
    fn recv(&mut self) -> TransportFuture<'_, Option<Frame>>;

    fn is_connected(&self) -> bool;
}

/// [`Transport`] over tokio-tungstenite.
pub struct WebSocketTransport {
    /// Present while the socket is open.
    ws: Option<WebSocketConnection>,
    /// Frames decoded from a text message but not yet returned.
    pending: VecDeque<Frame>,
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, tokio_tungstenite::tungstenite::Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        WebSocketTransport {
            ws: None,
            pending: VecDeque::new(),
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, request: &ConnectRequest) -> TransportFuture<'_, ()> {
        let url = request.effective_url();
        let bearer = request.bearer();
        Box::pin(async move {
            let url = url?;
            use futures_util::StreamExt;
            use tokio_tungstenite::tungstenite::client::IntoClientRequest;
            use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};

            let mut upgrade = url
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            let value = HeaderValue::from_str(&bearer)
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            upgrade.headers_mut().insert(AUTHORIZATION, value);

            let (ws_stream, _) = tokio_tungstenite::connect_async(upgrade)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            self.ws = Some(WebSocketConnection { sink, stream });
            self.pending.clear();
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.pending.clear();
            if let Some(mut ws) = self.ws.take() {
                use futures_util::SinkExt;
                if let Err(e) = ws.sink.close().await {
                    debug!("error closing websocket: {}", e);
                }
            }
            Ok(())
        })
    }

    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            use futures_util::SinkExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            if let Err(e) = ws.sink.send(Message::Text(frame.encode().into())).await {
                self.ws = None;
                return Err(TransportError::SendFailed(e.to_string()));
            }

            // A broken socket often only shows up on flush
            if let Err(e) = ws.sink.flush().await {
                self.ws = None;
                return Err(TransportError::SendFailed(e.to_string()));
            }

            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<Frame>> {
        Box::pin(async move {
            use futures_util::StreamExt;
            use tokio_tungstenite::tungstenite::Message;

            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }

            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            loop {
                let text = match ws.stream.next().await {
                    Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => text.to_string(),
                        Err(e) => {
                            warn!("dropping non-UTF-8 binary message: {}", e);
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) => {
                        self.ws = None;
                        return Ok(None);
                    }
                    Some(Ok(_)) => {
                        continue;
                    }
                    Some(Err(e)) => {
                        self.ws = None;
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                    None => {
                        self.ws = None;
                        return Ok(None);
                    }
                };

                for decoded in Frame::decode_each(&text) {
                    match decoded {
                        Ok(frame) => self.pending.push_back(frame),
                        Err(e) => warn!("dropping malformed frame: {}", e),
                    }
                }
                if let Some(frame) = self.pending.pop_front() {
                    return Ok(Some(frame));
                }
                // Heart-beat or nothing usable, keep waiting
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
