// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! parley-broker: WebSocket broker for local parley development.

use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use parley_broker::{server, BrokerState};

/// parley-broker: STOMP over WebSocket chat broker
#[derive(Parser, Debug)]
#[command(name = "parley-broker")]
#[command(about = "STOMP over WebSocket broker for parley development")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Require this bearer token on every CONNECT
    #[arg(short, long)]
    token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting parley-broker");
    info!("  Bind address: {}", args.bind);
    if args.token.is_some() {
        info!("  Token: required");
    }

    let state = BrokerState::new(args.token);
    server::run(args.bind, state).await?;

    Ok(())
}
