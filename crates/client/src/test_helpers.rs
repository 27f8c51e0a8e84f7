// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures for the client crate.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley_core::frame::Command;
use parley_core::Frame;
use tokio::sync::mpsc;

use crate::event::{ClientEvent, EventReceiver};
use crate::transport::{ConnectRequest, Transport, TransportError, TransportFuture};

/// How the mock answers a CONNECT frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Reply with CONNECTED.
    Accept,
    /// Reply with an ERROR frame carrying the message.
    Reject(String),
    /// Never reply.
    Silent,
}

enum Incoming {
    Frame(Frame),
    Close,
}

struct MockState {
    connected: bool,
    connect_count: u32,
    connect_script: VecDeque<Result<(), TransportError>>,
    handshake: Handshake,
    fail_sends: bool,
    sent: Vec<Frame>,
    requests: Vec<ConnectRequest>,
}

/// Mock transport for testing the client without real sockets.
///
/// Inbound traffic is pushed through the paired [`MockHandle`]; a CONNECT
/// frame is answered according to the configured [`Handshake`].
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    incoming: mpsc::UnboundedReceiver<Incoming>,
    replies: VecDeque<Frame>,
}

/// Test-side control over a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    incoming: mpsc::UnboundedSender<Incoming>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState {
            connected: false,
            connect_count: 0,
            connect_script: VecDeque::new(),
            handshake: Handshake::Accept,
            fail_sends: false,
            sent: Vec::new(),
            requests: Vec::new(),
        }));
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = MockTransport {
            state: Arc::clone(&state),
            incoming: rx,
            replies: VecDeque::new(),
        };
        (
            transport,
            MockHandle {
                state,
                incoming: tx,
            },
        )
    }
}

impl MockHandle {
    /// Queues a frame for the next `recv()`.
    pub fn deliver(&self, frame: Frame) {
        self.incoming.send(Incoming::Frame(frame)).unwrap();
    }

    /// Queues a MESSAGE frame on `destination` with a JSON body.
    pub fn deliver_message(&self, destination: &str, body: &str) {
        self.deliver(
            Frame::new(Command::Message)
                .with_header("destination", destination)
                .with_body(body),
        );
    }

    /// Makes the next `recv()` report the socket as closed by the peer.
    pub fn drop_connection(&self) {
        self.incoming.send(Incoming::Close).unwrap();
    }

    /// Makes the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state
                .connect_script
                .push_back(Err(TransportError::ConnectionFailed("refused".into())));
        }
    }

    pub fn set_handshake(&self, handshake: Handshake) {
        self.state.lock().unwrap().handshake = handshake;
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().unwrap().fail_sends = fail;
    }

    pub fn connect_count(&self) -> u32 {
        self.state.lock().unwrap().connect_count
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_commands(&self) -> Vec<Command> {
        self.sent().iter().map(|f| f.command).collect()
    }

    /// Returns the frames sent with the given command.
    pub fn sent_of(&self, command: Command) -> Vec<Frame> {
        self.sent()
            .into_iter()
            .filter(|f| f.command == command)
            .collect()
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, request: &ConnectRequest) -> TransportFuture<'_, ()> {
        let request = request.clone();
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.connect_count += 1;
            state.requests.push(request);
            let outcome = state.connect_script.pop_front().unwrap_or(Ok(()));
            state.connected = outcome.is_ok();
            drop(state);
            self.replies.clear();
            outcome
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.state.lock().unwrap().connected = false;
            self.replies.clear();
            Ok(())
        })
    }

    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return Err(TransportError::ConnectionClosed);
            }
            if state.fail_sends {
                state.connected = false;
                return Err(TransportError::SendFailed("broken pipe".into()));
            }
            if frame.command == Command::Connect {
                match &state.handshake {
                    Handshake::Accept => self.replies.push_back(Frame::connected()),
                    Handshake::Reject(msg) => self.replies.push_back(Frame::error(msg)),
                    Handshake::Silent => {}
                }
            }
            state.sent.push(frame);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<Frame>> {
        Box::pin(async move {
            if let Some(frame) = self.replies.pop_front() {
                return Ok(Some(frame));
            }
            if !self.state.lock().unwrap().connected {
                return Err(TransportError::ConnectionClosed);
            }
            match self.incoming.recv().await {
                Some(Incoming::Frame(frame)) => Ok(Some(frame)),
                Some(Incoming::Close) | None => {
                    self.state.lock().unwrap().connected = false;
                    Ok(None)
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }
}

/// Waits for the next event, failing the test if none arrives in time.
pub async fn next_event(events: &mut EventReceiver) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(300), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Drains events until `pred` matches, returning everything seen.
pub async fn events_until(
    events: &mut EventReceiver,
    pred: impl Fn(&ClientEvent) -> bool,
) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Lets the driver task run until it is idle.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
