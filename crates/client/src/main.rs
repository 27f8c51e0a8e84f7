// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! parley: terminal chat over a STOMP WebSocket broker.
//!
//! Reads lines from stdin and sends them to `--peer` (or to the broadcast
//! topic when no peer is given). Received messages are printed to stdout,
//! connection changes and logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parley::{
    ChatSession, ChatStore, ClientConfig, ClientError, ClientEvent, DomainMessage,
    EnvCredential, ErrorKind,
};

/// parley: reconnecting chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Terminal chat client for STOMP over WebSocket brokers")]
struct Args {
    /// Config file (defaults to PARLEY_CONFIG or the per-user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker endpoint, overrides the config file
    #[arg(short, long)]
    endpoint: Option<String>,

    /// User id to sign in as, overrides the config file
    #[arg(short, long)]
    user: Option<String>,

    /// Send typed lines to this user instead of the broadcast topic
    #[arg(short, long)]
    peer: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let path = args.config.clone().or_else(ClientConfig::default_path);
    let mut config = match path {
        Some(path) => ClientConfig::load_or_default(&path)?,
        None => ClientConfig::default(),
    };
    config.apply_env();
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if let Some(user) = &args.user {
        config.user_id = Some(user.clone());
    }
    config.validate()?;
    Ok(config)
}

fn print_message(message: &DomainMessage, user_id: &str) {
    let time = message.timestamp.format("%H:%M:%S");
    let scope = if message.is_broadcast() {
        "all".to_string()
    } else {
        message.peer_of(user_id).to_string()
    };
    let mut line = format!("[{}] <{}> ({}) {}", time, message.sender_id, scope, message.text);
    if let Some(attachment) = &message.attachment {
        let label = if attachment.is_image() { "image" } else { "file" };
        line.push_str(&format!(" [{}: {}]", label, attachment.url));
    }
    println!("{}", line);
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let mut session = ChatSession::from_config(&config, Arc::new(EnvCredential), ChatStore::new())?;
    let peer = args.peer.unwrap_or_default();

    info!(user = %session.user_id(), "starting session");
    session.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result: Result<(), Box<dyn std::error::Error>> = loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else { break Ok(()) };
                match event {
                    ClientEvent::Message(message) => print_message(&message, session.user_id()),
                    ClientEvent::Error(e) if ends_session(&e) => break Err(e.into()),
                    ClientEvent::Error(e) => eprintln!("warning: {}", e),
                    other => eprintln!("-- {}", status_line(&other, &session)),
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        if !text.trim().is_empty() && !session.send_text(&peer, &text) {
                            warn!("message not sent: {}", session.client().status_string());
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e.into()),
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    session.disconnect();
    session.shutdown().await;
    result
}

/// Errors the client will not recover from on its own.
fn ends_session(error: &ClientError) -> bool {
    matches!(error.kind(), ErrorKind::Configuration | ErrorKind::Terminal)
}

fn status_line(event: &ClientEvent, session: &ChatSession<ChatStore>) -> String {
    match event {
        ClientEvent::Reconnecting { attempt, delay } => {
            format!("reconnecting (attempt {}) in {}ms", attempt, delay.as_millis())
        }
        _ => session.client().status_string(),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
