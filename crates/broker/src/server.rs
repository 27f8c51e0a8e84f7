// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Speaks STOMP 1.2 over WebSocket text messages: CONNECT, SUBSCRIBE,
//! UNSUBSCRIBE, SEND and DISCONNECT from clients, CONNECTED, MESSAGE,
//! RECEIPT and ERROR back. Every ERROR closes the connection.
//!
//! Frame handling lives in [`handle_frame`], which has no I/O. The
//! connection task only moves frames between the socket, the broker
//! state and that function.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use parley_core::topic::{is_topic, private_queue_owner, SEND_DESTINATION};
use parley_core::{Command, Frame};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::chat::route_chat;
use crate::state::{BrokerState, Delivery};

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: BrokerState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Accept connections from an already bound listener.
pub async fn serve(listener: TcpListener, state: BrokerState) -> std::io::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Per-connection protocol state.
#[derive(Debug, Default)]
pub struct Session {
    /// Token presented on the WebSocket upgrade, if any.
    upgrade_token: Option<String>,
    connected: bool,
    /// Subscription id to destination.
    subscriptions: BTreeMap<String, String>,
}

impl Session {
    pub fn new(upgrade_token: Option<String>) -> Self {
        Session {
            upgrade_token,
            ..Session::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Builds one MESSAGE frame per subscription matching the delivery.
    pub fn deliveries(&self, delivery: &Delivery) -> Vec<Frame> {
        if !self.connected {
            return Vec::new();
        }
        let message_id = delivery.seq.to_string();
        self.subscriptions
            .iter()
            .filter(|(_, destination)| **destination == delivery.destination)
            .map(|(id, _)| {
                Frame::message(
                    &delivery.destination,
                    id,
                    &message_id,
                    delivery.body.as_str(),
                )
            })
            .collect()
    }
}

/// What the connection task should do after one inbound frame.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub replies: Vec<Frame>,
    pub close: bool,
}

impl Outcome {
    fn reply(frame: Frame) -> Self {
        Outcome {
            replies: vec![frame],
            close: false,
        }
    }

    fn fail(message: &str) -> Self {
        Outcome {
            replies: vec![Frame::error(message)],
            close: true,
        }
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: BrokerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut upgrade_token = None;
    let capture_token =
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            upgrade_token = upgrade_token_of(request);
            Ok(response)
        };
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, capture_token).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let mut broadcast_rx = state.subscribe();
    let mut session = Session::new(upgrade_token);

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                        continue;
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong and raw frames carry nothing for us
                        continue;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                };

                let outcome = handle_text(&text, &mut session, &state);

                for frame in outcome.replies {
                    ws_sink.send(Message::Text(frame.encode().into())).await?;
                }
                if outcome.close {
                    let _ = ws_sink.close().await;
                    break;
                }
            }

            delivery = broadcast_rx.recv() => {
                match delivery {
                    Ok(delivery) => {
                        for frame in session.deliveries(&delivery) {
                            if let Err(e) = ws_sink.send(Message::Text(frame.encode().into())).await {
                                warn!("Failed to deliver to {}: {}", peer_addr, e);
                                return Ok(());
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} messages", peer_addr, n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process every frame in one text message, in order.
///
/// Frames ahead of a malformed one still take effect; the malformed one
/// gets an ERROR and closes the connection.
pub fn handle_text(text: &str, session: &mut Session, state: &BrokerState) -> Outcome {
    let mut outcome = Outcome::default();
    for decoded in Frame::decode_each(text) {
        let step = match decoded {
            Ok(frame) => handle_frame(&frame, session, state),
            Err(e) => {
                warn!("Malformed frame: {}", e);
                Outcome::fail(&format!("malformed frame: {}", e))
            }
        };
        outcome.replies.extend(step.replies);
        if step.close {
            outcome.close = true;
            break;
        }
    }
    outcome
}

/// Process one client frame.
pub fn handle_frame(frame: &Frame, session: &mut Session, state: &BrokerState) -> Outcome {
    debug!("Received {} frame", frame.command);

    let mut outcome = match frame.command {
        Command::Connect | Command::Stomp => return connect(frame, session, state),
        _ if !session.connected => return Outcome::fail("not connected"),
        Command::Subscribe => {
            let (Some(id), Some(destination)) = (frame.header("id"), frame.header("destination"))
            else {
                return Outcome::fail("SUBSCRIBE requires id and destination headers");
            };
            session
                .subscriptions
                .insert(id.to_string(), destination.to_string());
            debug!("Subscribed {} to {}", id, destination);
            Outcome::default()
        }
        Command::Unsubscribe => {
            let Some(id) = frame.header("id") else {
                return Outcome::fail("UNSUBSCRIBE requires an id header");
            };
            if session.subscriptions.remove(id).is_none() {
                debug!("Unsubscribe for unknown id {}", id);
            }
            Outcome::default()
        }
        Command::Send => {
            let Some(destination) = frame.header("destination") else {
                return Outcome::fail("SEND requires a destination header");
            };
            if let Err(reason) = send(destination, &frame.body, state) {
                return Outcome::fail(&reason);
            }
            Outcome::default()
        }
        Command::Disconnect => {
            session.connected = false;
            session.subscriptions.clear();
            Outcome {
                replies: Vec::new(),
                close: true,
            }
        }
        other => return Outcome::fail(&format!("unexpected {} frame", other)),
    };

    if let Some(receipt) = frame.header("receipt") {
        outcome.replies.push(Frame::receipt(receipt));
    }
    outcome
}

fn connect(frame: &Frame, session: &mut Session, state: &BrokerState) -> Outcome {
    if session.connected {
        return Outcome::fail("already connected");
    }
    let token = frame
        .header("Authorization")
        .or_else(|| frame.header("authorization"))
        .and_then(bearer_token)
        .or(session.upgrade_token.as_deref());
    if !state.accepts(token) {
        warn!("Rejecting CONNECT with a missing or invalid token");
        return Outcome::fail("invalid token");
    }
    session.connected = true;
    Outcome::reply(Frame::connected())
}

fn send(destination: &str, body: &str, state: &BrokerState) -> Result<(), String> {
    if destination == SEND_DESTINATION {
        let route = route_chat(body, || state.next_message_id()).map_err(|e| e.to_string())?;
        for destination in &route.destinations {
            state.publish(destination, route.body.as_str());
        }
        debug!("Routed chat message to {:?}", route.destinations);
        return Ok(());
    }
    if is_topic(destination) || private_queue_owner(destination).is_some() {
        state.publish(destination, body);
        return Ok(());
    }
    Err(format!("unknown destination '{}'", destination))
}

fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Reads the token from the upgrade `Authorization` header, or else from
/// the `access_token` query parameter.
pub(crate) fn upgrade_token_of(request: &Request) -> Option<String> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);
    header.or_else(|| {
        let query = request.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "access_token")
            .map(|(_, value)| value.into_owned())
            .filter(|t| !t.is_empty())
    })
}
