//! Gateway binary: binds the listen port, registers the configured
//! instruments, and serves the line protocol.
//!
//! Exit codes: 0 clean shutdown, 1 bind/listen failure, 2 fatal invariant
//! violation (raised by the engine).

mod conn;
mod notifier;
mod protocol;
mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use matching_engine::events::{l1_group, tape_group};
use matching_engine::{EngineConfig, InstrumentManager};
use tokio::net::TcpListener;
use types::prelude::Symbol;

use conn::GatewayState;
use notifier::SessionNotifier;
use session::{SessionRegistry, SESSION_IDLE_TIMEOUT_S};

#[derive(Parser, Debug)]
#[command(name = "gateway", about = "Line-protocol gateway for the matching venue")]
struct Args {
    /// TCP port to listen on
    port: u16,

    /// Comma-separated instruments to register at startup
    #[arg(long, default_value = "TSLA")]
    symbols: String,

    /// Reject orders that would immediately match the submitter's own
    /// resting orders
    #[arg(long)]
    reject_self_match: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let registry = Arc::new(SessionRegistry::new());
    let notifier = Arc::new(SessionNotifier::new(Arc::clone(&registry)));
    let manager = Arc::new(InstrumentManager::new(
        notifier.clone(),
        EngineConfig {
            reject_self_match: args.reject_self_match,
        },
    ));

    for token in args.symbols.split(',') {
        let symbol = Symbol::try_new(token.trim())
            .with_context(|| format!("invalid symbol {token:?}"))?;
        notifier.register_group(&l1_group(&symbol));
        notifier.register_group(&tape_group(&symbol));
        manager.add_instrument(symbol);
    }

    let listener = match TcpListener::bind(("0.0.0.0", args.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(port = args.port, %err, "bind failed");
            std::process::exit(1);
        }
    };
    tracing::info!(port = args.port, symbols = %args.symbols, "gateway listening");

    let state = Arc::new(GatewayState {
        manager,
        notifier,
        registry,
    });

    // Reap sessions that have been quiet past the idle timeout.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            loop {
                ticker.tick().await;
                for stale in state.registry.stale(SESSION_IDLE_TIMEOUT_S) {
                    tracing::info!(conn = stale.conn_id, "reaping idle session");
                    stale.shutdown.notify_one();
                }
            }
        });
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(conn::handle_connection(stream, addr, state));
                }
                Err(err) => tracing::warn!(%err, "accept failed"),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("shutting down");
    Ok(())
}
