//! Debate arena server, JSON lines over stdio.
//!
//! Reads control messages one per line on stdin and writes events one per
//! line on stdout. Logs go to stderr so they never mix with the protocol.
//!
//! ```bash
//! ARENA_API_KEY=sk-... arena
//! ```

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use arena::events::{ArenaEvent, ControlMessage};
use arena::{ChatClient, ConnectionRegistry, Gateway};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arena=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let generator = Arc::new(ChatClient::from_env()?);
    let registry = ConnectionRegistry::new();
    let gateway = Gateway::new(registry, generator);

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ControlMessage>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ArenaEvent>();

    // Stdin reader. Malformed lines are logged and dropped, never fatal.
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ControlMessage>(&line) {
                Ok(message) => {
                    if inbound_tx.send(message).is_err() {
                        break;
                    }
                }
                Err(e) => debug!(error = %e, "unparseable control message dropped"),
            }
        }
    });

    // Stdout writer.
    let writer = tokio::spawn(async move {
        let mut out = stdout();
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if out.write_all(json.as_bytes()).await.is_err()
                        || out.write_all(b"\n").await.is_err()
                        || out.flush().await.is_err()
                    {
                        break;
                    }
                }
                Err(e) => debug!(error = %e, "unserializable event dropped"),
            }
        }
    });

    let connection_id = uuid::Uuid::new_v4().to_string();
    gateway
        .run_connection(connection_id, inbound_rx, event_tx)
        .await;
    let _ = writer.await;
    Ok(())
}
