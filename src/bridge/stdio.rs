//! Newline-delimited JSON bridge to a native host process.
//!
//! Frames written to the host:
//!
//! ```text
//! {"id":1,"command":"sendMessageToNode","args":["_EVENTS_","{...}"]}
//! ```
//!
//! Frames read from the host are either replies to a call
//! (`{"id":1,"ok":true,"result":...}` / `{"id":1,"ok":false,"error":"..."}`)
//! or channel deliveries (`{"channel":"_EVENTS_","data":"{...}"}`), which go
//! to the installed [`InboundHandler`].

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Mutex};

use super::{Bridge, BridgeCall, BridgeError, InboundHandler, CMD_SET_ALL_CHANNELS_LISTENER};
use crate::config::HostConfig;

type PendingReply = oneshot::Sender<Result<Value, BridgeError>>;

#[derive(Debug, Serialize)]
struct OutboundFrame<'a> {
    id: u64,
    command: &'a str,
    args: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InboundFrame {
    Delivery {
        channel: String,
        data: String,
    },
    Reply {
        id: u64,
        ok: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Default)]
struct Shared {
    pending: DashMap<u64, PendingReply>,
    handler: OnceLock<Arc<dyn InboundHandler>>,
    closed: AtomicBool,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // Flag first, then drain: a call registered after the drain sees the flag.
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, reply)) = self.pending.remove(&id) {
                let _ = reply.send(Err(BridgeError::Closed));
            }
        }
        tracing::debug!("bridge closed");
    }

    fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let frame: InboundFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("skipping malformed frame from bridge host: {e}");
                return;
            }
        };

        match frame {
            InboundFrame::Delivery { channel, data } => match self.handler.get() {
                Some(handler) => handler.on_inbound_message(&channel, &data),
                None => {
                    tracing::warn!(channel = %channel, "no channel listener installed; dropping delivery")
                }
            },
            InboundFrame::Reply {
                id,
                ok,
                result,
                error,
            } => {
                let Some((_, reply)) = self.pending.remove(&id) else {
                    tracing::debug!(id, "reply for a call nobody is waiting on");
                    return;
                };
                let outcome = if ok {
                    Ok(result.unwrap_or(Value::Null))
                } else {
                    Err(BridgeError::Invocation(
                        error.unwrap_or_else(|| "bridge host reported an unknown error".to_string()),
                    ))
                };
                let _ = reply.send(outcome);
            }
        }
    }
}

pub struct StdioBridge {
    outbound: mpsc::UnboundedSender<String>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    child: Mutex<Option<Child>>,
}

impl StdioBridge {
    /// Launch the host process described by `host` and bridge over its stdio.
    pub fn spawn(host: &HostConfig) -> Result<Self, BridgeError> {
        let mut command = Command::new(&host.command);
        command
            .args(&host.args)
            .envs(&host.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            BridgeError::Host(format!("failed to start bridge host '{}': {e}", host.command))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Host("failed to acquire bridge host stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Host("failed to acquire bridge host stdout".to_string()))?;

        let mut bridge = Self::from_io(stdout, stdin)?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "nodebridge::host", "{line}");
                }
            });
        }

        tracing::info!(command = %host.command, pid = ?child.id(), "bridge host started");
        *bridge.child.get_mut() = Some(child);
        Ok(bridge)
    }

    /// Bridge over an arbitrary byte stream pair. Must be called inside a
    /// tokio runtime.
    pub fn from_io<R, W>(reader: R, writer: W) -> Result<Self, BridgeError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| BridgeError::NoRuntime(e.to_string()))?;
        let shared = Arc::new(Shared::default());
        let (outbound, rx) = mpsc::unbounded_channel();

        runtime.spawn(write_loop(writer, rx, shared.clone()));
        runtime.spawn(read_loop(reader, shared.clone()));

        Ok(Self {
            outbound,
            shared,
            next_id: AtomicU64::new(1),
            child: Mutex::new(None),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stop the host process (if any) and fail every outstanding call.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        let child = self.child.lock().await.take();
        self.shared.close();
        if let Some(mut child) = child {
            child
                .kill()
                .await
                .map_err(|e| BridgeError::Host(format!("failed to stop bridge host: {e}")))?;
            tracing::info!("bridge host stopped");
        }
        Ok(())
    }

    fn send_frame(&self, id: u64, command: &str, args: Option<Vec<Value>>) -> Result<(), BridgeError> {
        let line = serde_json::to_string(&OutboundFrame { id, command, args })
            .map_err(|e| BridgeError::Protocol(e.to_string()))?;
        self.outbound.send(line).map_err(|_| BridgeError::Closed)
    }
}

#[async_trait]
impl Bridge for StdioBridge {
    async fn invoke(&self, call: BridgeCall) -> Result<Value, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply, response) = oneshot::channel();
        self.shared.pending.insert(id, reply);

        if self.shared.is_closed() {
            self.shared.pending.remove(&id);
            return Err(BridgeError::Closed);
        }
        if let Err(e) = self.send_frame(id, call.command(), Some(call.args())) {
            self.shared.pending.remove(&id);
            return Err(e);
        }

        response.await.unwrap_or(Err(BridgeError::Closed))
    }

    fn set_all_channels_listener(
        &self,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<(), BridgeError> {
        self.shared.handler.set(handler).map_err(|_| {
            BridgeError::Protocol("all-channels listener is already installed".to_string())
        })?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.send_frame(id, CMD_SET_ALL_CHANNELS_LISTENER, None)
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>, shared: Arc<Shared>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &line).await {
            tracing::warn!("failed to write to bridge host: {e}");
            break;
        }
    }
    shared.close();
}

async fn write_frame<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

async fn read_loop<R>(reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => shared.handle_line(&line),
            Ok(None) => {
                tracing::debug!("bridge host closed its output");
                break;
            }
            Err(e) => {
                tracing::warn!("failed to read from bridge host: {e}");
                break;
            }
        }
    }
    shared.close();
}
