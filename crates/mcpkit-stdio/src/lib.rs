//! # mcpkit-stdio
//!
//! The reference `Transport` implementation: newline-delimited JSON-RPC
//! over standard input/output (`spec.md` §4.9).
//!
//! A dedicated writer task owns the only handle to `Stdout` for the
//! lifetime of the transport, serializing response order across
//! concurrently-dispatched requests. Library and handler code must log
//! via `tracing` (which this crate does not redirect) rather than
//! `println!`/`eprintln!`, since stdout is reserved exclusively for the
//! wire protocol.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mcpkit_core::{CoreError, CoreResult, DispatchFn, RespondFn, Transport, TransportInfo};
use mcpkit_protocol::{decode, encode_line, JsonRpcError, JsonRpcMessage};

const TRANSPORT_NAME: &str = "stdio";

struct RunningTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    outgoing: mpsc::UnboundedSender<JsonRpcMessage>,
}

/// Newline-delimited JSON-RPC transport over process stdin/stdout.
///
/// One message per line, UTF-8. `start` spawns a reader task that
/// decodes lines and a writer task that owns `Stdout` exclusively so
/// response order matches the order `respond` was invoked
/// (`spec.md` §4.9, §5).
pub struct StdioTransport {
    tasks: Mutex<Option<RunningTasks>>,
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("running", &self.tasks.lock().is_some())
            .finish()
    }
}

impl StdioTransport {
    /// A transport not yet started.
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    async fn start(&self, dispatch: DispatchFn) -> CoreResult<()> {
        if self.tasks.lock().is_some() {
            return Err(CoreError::Transport("stdio transport already started".to_string()));
        }

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<JsonRpcMessage>();

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(message) = outgoing_rx.recv().await {
                match encode_line(&message) {
                    Ok(line) => {
                        if let Err(err) = stdout.write_all(line.as_bytes()).await {
                            warn!(%err, "failed to write response to stdout");
                        }
                        let _ = stdout.flush().await;
                    }
                    Err(err) => warn!(%err, "failed to encode response"),
                }
            }
        });

        let reply_tx = outgoing_tx.clone();
        let respond: RespondFn = Arc::new(move |message| {
            let _ = reply_tx.send(message);
        });

        let reader = tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let mut lines = BufReader::new(stdin).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match decode(trimmed) {
                            Ok(message) => {
                                let transport = TransportInfo {
                                    name: TRANSPORT_NAME.to_string(),
                                };
                                dispatch(message, Arc::clone(&respond), transport);
                            }
                            Err(err) => {
                                debug!(%err, "failed to decode incoming line");
                                let error = JsonRpcError::new(-32700, "Parse error");
                                respond(JsonRpcMessage::error(None, error));
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "stdin read failed");
                        break;
                    }
                }
            }
        });

        *self.tasks.lock() = Some(RunningTasks {
            reader,
            writer,
            outgoing: outgoing_tx,
        });
        Ok(())
    }

    async fn stop(&self) -> CoreResult<()> {
        let tasks = self.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.reader.abort();
            drop(tasks.outgoing);
            let _ = tasks.writer.await;
        }
        Ok(())
    }
}
