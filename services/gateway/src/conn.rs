//! Per-connection handling
//!
//! One reader task per connection translates request lines into intents and
//! synchronous replies; one writer task drains the session's outbound queue.
//! Events published by the engines land on the same queue, so replies and
//! async frames stay ordered per session.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use matching_engine::{InstrumentManager, NotifierPort, SubmitRequest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use types::prelude::*;

use crate::notifier::SessionNotifier;
use crate::protocol::{self, Command};
use crate::session::{ConnHandle, SessionRegistry};

/// Passkey for AUTH. Compile-time constant by design.
pub const PASSKEY: &str = "sesame";
/// Secret elevating a session for DEBUG queries.
pub const DEBUG_SECRET: &str = "s3cr3t";

pub struct GatewayState {
    pub manager: Arc<InstrumentManager>,
    pub notifier: Arc<SessionNotifier>,
    pub registry: Arc<SessionRegistry>,
}

pub async fn handle_connection(
    stream: TcpStream,
    addr: std::net::SocketAddr,
    state: Arc<GatewayState>,
) {
    let _ = stream.set_nodelay(true);
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = state.registry.register(addr, tx);
    tracing::info!(conn = handle.conn_id, %addr, "session accepted");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write_half.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            _ = handle.shutdown.notified() => {
                tracing::info!(conn = handle.conn_id, "session shut down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    handle.touch();
                    dispatch(&line, &handle, &state).await;
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::debug!(conn = handle.conn_id, %err, "read failed");
                    break;
                }
            }
        }
    }

    // Peer closed (or was evicted/reaped): release the session and, if this
    // connection still owned its client identity, cancel the client's book.
    state.registry.remove(&handle);
    if let Some(client) = handle.client_id() {
        if state.registry.lookup(&client).is_none() {
            state.notifier.remove_client(&client);
            state.manager.client_gone(&client);
        }
    }
    drop(handle);
    let _ = writer.await;
    tracing::info!(%addr, "session closed");
}

fn err_line(reject: Reject) -> String {
    format!("ERR {}", reject.wire_token())
}

/// The session's client id, or queue the UNAUTHORIZED reply.
fn require_auth(handle: &ConnHandle) -> Option<ClientId> {
    let client = handle.client_id();
    if client.is_none() {
        handle.send(err_line(AuthError::Unauthorized.into()));
    }
    client
}

async fn dispatch(line: &str, handle: &Arc<ConnHandle>, state: &Arc<GatewayState>) {
    let command = match protocol::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(parse_err) => {
            handle.send(err_line(parse_err.reject));
            if let Some(usage) = parse_err.usage {
                handle.send(usage);
            }
            return;
        }
    };

    match command {
        Command::Ping => {
            handle.send("PONG");
        }

        Command::Auth { passkey, client } => {
            if passkey != PASSKEY {
                handle.send(err_line(AuthError::BadPasskey.into()));
                return;
            }
            if let Some(evicted) = state.registry.bind_client(handle, client.clone()) {
                tracing::info!(client = %client, evicted_conn = evicted.conn_id, "evicting prior session");
                evicted.send("EVICTED");
                evicted.shutdown.notify_one();
            }
            handle.send("OK AUTH");
        }

        Command::New { side, symbol, qty, price } => {
            let Some(client) = require_auth(handle) else { return };
            let req = SubmitRequest {
                client_id: client,
                client_order_id: String::new(),
                symbol,
                side,
                order_type: if price.is_some() { OrderType::Limit } else { OrderType::Market },
                price: price.unwrap_or(Price::ZERO),
                qty,
            };
            // The admission ack ("OK NEW <id>") is published by the engine
            // ahead of any fills; only errors are reported here.
            if let Err(reject) = state.manager.submit(req).await {
                handle.send(err_line(reject));
            }
        }

        Command::Cancel { id } => {
            let Some(client) = require_auth(handle) else { return };
            // The CANCELLED frame doubles as the acknowledgement.
            if let Err(reject) = state.manager.cancel(id, client).await {
                handle.send(err_line(reject));
            }
        }

        Command::Sub { group } => {
            let Some(client) = require_auth(handle) else { return };
            state.notifier.subscribe(&group, &client);
            handle.send(format!("OK SUB {group}"));
        }

        Command::Unsub { group } => {
            let Some(client) = require_auth(handle) else { return };
            state.notifier.unsubscribe(&group, &client);
            handle.send(format!("OK UNSUB {group}"));
        }

        Command::Quote { symbol } => {
            let Some(client) = require_auth(handle) else { return };
            // The L1_SNAPSHOT frame is the response line.
            if let Err(reject) = state.manager.snapshot(&symbol, client).await {
                handle.send(err_line(reject));
            }
        }

        Command::Send { group, message } => {
            let Some(client) = require_auth(handle) else { return };
            tracing::debug!(client = %client, group, "relaying group message");
            state.notifier.notify_group(&group, message);
            handle.send("OK SENT");
        }

        Command::DebugAuth { secret } => {
            if secret == DEBUG_SECRET {
                handle.set_debug(true);
                handle.send("OK DEBUG");
            } else {
                handle.send(err_line(AuthError::BadPasskey.into()));
            }
        }

        Command::DebugList => {
            if !handle.is_debug() {
                handle.send(err_line(AuthError::Unauthorized.into()));
                return;
            }
            handle.send(list_sessions(state));
        }

        Command::DebugOrders => {
            let Some(client) = require_debug(handle) else { return };
            state.manager.dump_depth(&client);
        }

        Command::DebugInstruments => {
            let Some(client) = require_debug(handle) else { return };
            state.manager.dump_stats(&client);
        }
    }
}

/// Debug queries answered through the notifier need both an elevated session
/// and a bound client id to address the reply.
fn require_debug(handle: &ConnHandle) -> Option<ClientId> {
    if !handle.is_debug() {
        handle.send(err_line(AuthError::Unauthorized.into()));
        return None;
    }
    require_auth(handle)
}

/// Multi-line session listing; ends with a newline so the writer's
/// terminator yields the blank line closing the response.
fn list_sessions(state: &GatewayState) -> String {
    let now_s = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let sessions = state.registry.snapshot();
    let mut out = format!("At: {now_s}\nSessions({})\n", sessions.len());
    for session in sessions {
        let client = session
            .client_id()
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        out.push_str(&format!(
            "  conn={} addr={} client={} debug={} idle={}s\n",
            session.conn_id,
            session.addr,
            client,
            session.is_debug(),
            session.idle_secs(),
        ));
    }
    out
}
