// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! STOMP 1.2 frames carried over WebSocket text messages.
//!
//! The protocol is simple:
//! - Client sends CONNECT, SUBSCRIBE, UNSUBSCRIBE, SEND and DISCONNECT
//! - Server answers CONNECTED, delivers MESSAGE frames, and reports ERROR
//!
//! A frame is a command line, header lines, a blank line and a body
//! terminated by a NUL octet. Bare end-of-lines between frames are
//! heart-beats and decode to nothing.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Protocol version negotiated in CONNECT / CONNECTED.
pub const STOMP_VERSION: &str = "1.2";

/// Content type attached to every SEND and MESSAGE body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    /// Returns the wire representation of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    /// CONNECT and CONNECTED headers are sent verbatim, everything else
    /// uses the 1.2 escape rules.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CONNECT" => Ok(Command::Connect),
            "STOMP" => Ok(Command::Stomp),
            "CONNECTED" => Ok(Command::Connected),
            "SEND" => Ok(Command::Send),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            "DISCONNECT" => Ok(Command::Disconnect),
            _ => Err(Error::UnknownCommand(s.to_string())),
        }
    }
}

/// A single protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order. Repeated names are allowed; the first wins.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// Creates a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Frame {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the value of the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Creates a CONNECT frame, carrying the bearer token when present.
    pub fn connect(host: &str, token: Option<&str>) -> Self {
        let frame = Frame::new(Command::Connect)
            .with_header("accept-version", STOMP_VERSION)
            .with_header("host", host)
            .with_header("heart-beat", "0,0");
        match token {
            Some(token) => frame.with_header("Authorization", format!("Bearer {}", token)),
            None => frame,
        }
    }

    /// Creates a CONNECTED frame.
    pub fn connected() -> Self {
        Frame::new(Command::Connected)
            .with_header("version", STOMP_VERSION)
            .with_header("heart-beat", "0,0")
    }

    /// Creates a SUBSCRIBE frame.
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// Creates an UNSUBSCRIBE frame.
    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).with_header("id", id)
    }

    /// Creates a SEND frame with a JSON body.
    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", JSON_CONTENT_TYPE)
            .with_body(body)
    }

    /// Creates a MESSAGE frame for delivery to a subscriber.
    pub fn message(
        destination: &str,
        subscription: &str,
        message_id: &str,
        body: impl Into<String>,
    ) -> Self {
        Frame::new(Command::Message)
            .with_header("destination", destination)
            .with_header("subscription", subscription)
            .with_header("message-id", message_id)
            .with_header("content-type", JSON_CONTENT_TYPE)
            .with_body(body)
    }

    /// Creates a RECEIPT frame.
    pub fn receipt(receipt_id: &str) -> Self {
        Frame::new(Command::Receipt).with_header("receipt-id", receipt_id)
    }

    /// Creates an ERROR frame.
    pub fn error(message: &str) -> Self {
        Frame::new(Command::Error)
            .with_header("message", message)
            .with_body(message)
    }

    /// Creates a DISCONNECT frame, optionally asking for a receipt.
    pub fn disconnect(receipt: Option<&str>) -> Self {
        let frame = Frame::new(Command::Disconnect);
        match receipt {
            Some(id) => frame.with_header("receipt", id),
            None => frame,
        }
    }

    /// Serializes the frame to its wire form, including the NUL terminator.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(32 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parses every frame contained in one text message, failing on the
    /// first malformed one.
    ///
    /// Heart-beat end-of-lines are skipped; a message made only of them
    /// yields an empty vector.
    pub fn decode(text: &str) -> Result<Vec<Frame>> {
        Frame::decode_each(text).into_iter().collect()
    }

    /// Parses one text message frame by frame.
    ///
    /// A malformed frame yields an error in its slot and parsing resumes
    /// after its NUL terminator, so later frames in the same message still
    /// come through. Without a terminator the rest of the message is lost.
    pub fn decode_each(text: &str) -> Vec<Result<Frame>> {
        let mut frames = Vec::new();
        let mut rest = text;
        loop {
            rest = rest.trim_start_matches(['\r', '\n']);
            if rest.is_empty() {
                break;
            }
            match parse_one(rest) {
                Ok((frame, remaining)) => {
                    frames.push(Ok(frame));
                    rest = remaining;
                }
                Err(e) => {
                    frames.push(Err(e));
                    match rest.find('\0') {
                        Some(nul) => rest = &rest[nul + 1..],
                        None => break,
                    }
                }
            }
        }
        frames
    }
}

fn parse_one(input: &str) -> Result<(Frame, &str)> {
    let mut rest = input;
    let command_line = take_line(&mut rest).ok_or(Error::Truncated("missing command line"))?;
    if command_line.is_empty() {
        return Err(Error::EmptyFrame);
    }
    let command: Command = command_line.parse()?;
    let escaped = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let line = take_line(&mut rest).ok_or(Error::Truncated("missing end of headers"))?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::MalformedHeader(line.to_string()))?;
        if escaped {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.trim().parse::<usize>().ok());

    let (body, remaining) = match content_length {
        Some(len)
            if rest.len() > len && rest.is_char_boundary(len) && rest.as_bytes()[len] == 0 =>
        {
            (&rest[..len], &rest[len + 1..])
        }
        _ => {
            let nul = rest
                .find('\0')
                .ok_or(Error::Truncated("missing NUL terminator"))?;
            (&rest[..nul], &rest[nul + 1..])
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        remaining,
    ))
}

/// Splits off one line, accepting both LF and CRLF endings.
fn take_line<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let idx = rest.find('\n')?;
    let line = &rest[..idx];
    *rest = &rest[idx + 1..];
    Some(line.strip_suffix('\r').unwrap_or(line))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(Error::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
