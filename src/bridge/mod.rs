//! Native bridge abstraction.
//!
//! The bridge is the only way across the environment boundary. It offers one
//! asynchronous call primitive plus a single persistent inbound listener;
//! all channel multiplexing happens above it.
//!
//! - `Bridge`: the transport seam (implemented by `StdioBridge` and by test doubles)
//! - `BridgeCall`: the commands this crate issues
//! - `BridgeInvoker`: fire-and-forget invocation on a tokio runtime, in
//!   submission order

pub mod stdio;


use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::engine::StartOptions;

pub use stdio::StdioBridge;

pub const CMD_SET_ALL_CHANNELS_LISTENER: &str = "setAllChannelsListener";
pub const CMD_SEND_MESSAGE_TO_NODE: &str = "sendMessageToNode";
pub const CMD_START_ENGINE: &str = "startEngine";
pub const CMD_START_ENGINE_WITH_SCRIPT: &str = "startEngineWithScript";

/// Failures reported by the bridge for a single call.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// The far side reported that the call failed.
    #[error("bridge invocation failed: {0}")]
    Invocation(String),

    /// The bridge stream is closed; no further calls can be delivered.
    #[error("bridge is closed")]
    Closed,

    /// The host process could not be started or controlled.
    #[error("bridge host error: {0}")]
    Host(String),

    /// A frame could not be encoded, or the listener was installed twice.
    #[error("bridge protocol error: {0}")]
    Protocol(String),

    /// No tokio runtime was available to drive bridge calls.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),
}

/// A command sent across the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    /// Deliver a serialized envelope to the named channel on the backend.
    SendMessageToNode { channel: String, data: String },
    /// Start the engine by loading a file.
    StartEngine {
        entry_file: String,
        options: StartOptions,
    },
    /// Start the engine with inline script text.
    StartEngineWithScript {
        script: String,
        options: StartOptions,
    },
}

impl BridgeCall {
    /// Wire command name for this call.
    pub fn command(&self) -> &'static str {
        match self {
            BridgeCall::SendMessageToNode { .. } => CMD_SEND_MESSAGE_TO_NODE,
            BridgeCall::StartEngine { .. } => CMD_START_ENGINE,
            BridgeCall::StartEngineWithScript { .. } => CMD_START_ENGINE_WITH_SCRIPT,
        }
    }

    /// Positional argument list for this call.
    pub fn args(&self) -> Vec<Value> {
        match self {
            BridgeCall::SendMessageToNode { channel, data } => {
                vec![Value::String(channel.clone()), Value::String(data.clone())]
            }
            BridgeCall::StartEngine {
                entry_file,
                options,
            } => vec![Value::String(entry_file.clone()), options.to_value()],
            BridgeCall::StartEngineWithScript { script, options } => {
                vec![Value::String(script.clone()), options.to_value()]
            }
        }
    }
}

/// Receiver for every inbound `(channel, data)` delivery from the backend.
///
/// Installed once per bridge and invoked for every message, so an
/// implementation must not fail or unregister itself on bad input.
pub trait InboundHandler: Send + Sync {
    fn on_inbound_message(&self, channel: &str, data: &str);
}

/// Transport across the environment boundary.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Perform one call. Resolves once the far side acknowledges or rejects it.
    async fn invoke(&self, call: BridgeCall) -> Result<Value, BridgeError>;

    /// Install the persistent listener for all inbound channel traffic.
    fn set_all_channels_listener(&self, handler: Arc<dyn InboundHandler>)
        -> Result<(), BridgeError>;
}

type Completion = Box<dyn FnOnce(Result<Value, BridgeError>) + Send>;

struct Outbound {
    call: BridgeCall,
    on_complete: Completion,
}

/// Runs bridge calls on a tokio runtime without blocking the caller.
///
/// Calls go through one FIFO queue drained by a single task, so they reach
/// [`Bridge::invoke`] in the order they were submitted, from every clone of
/// the invoker.
#[derive(Clone)]
pub struct BridgeInvoker {
    bridge: Arc<dyn Bridge>,
    runtime: Handle,
    queue: mpsc::UnboundedSender<Outbound>,
}

impl BridgeInvoker {
    /// Build an invoker and start its queue task on `runtime`.
    pub fn new(bridge: Arc<dyn Bridge>, runtime: Handle) -> Self {
        let (queue, pending) = mpsc::unbounded_channel();
        runtime.spawn(drain_queue(bridge.clone(), pending));
        Self {
            bridge,
            runtime,
            queue,
        }
    }

    /// Build an invoker on the runtime of the calling context.
    pub fn current(bridge: Arc<dyn Bridge>) -> Result<Self, BridgeError> {
        let runtime = Handle::try_current().map_err(|e| BridgeError::NoRuntime(e.to_string()))?;
        Ok(Self::new(bridge, runtime))
    }

    pub fn bridge(&self) -> &Arc<dyn Bridge> {
        &self.bridge
    }

    /// Queue `call` and return immediately. `on_complete` runs at most once,
    /// on the runtime, with the outcome reported by the bridge.
    ///
    /// If the queue task is gone (its runtime shut down) `on_complete` gets
    /// [`BridgeError::Closed`] right away.
    pub fn invoke<F>(&self, call: BridgeCall, on_complete: F)
    where
        F: FnOnce(Result<Value, BridgeError>) + Send + 'static,
    {
        let outbound = Outbound {
            call,
            on_complete: Box::new(on_complete),
        };
        if let Err(mpsc::error::SendError(rejected)) = self.queue.send(outbound) {
            tracing::warn!(
                command = rejected.call.command(),
                "bridge queue is closed; dropping call"
            );
            (rejected.on_complete)(Err(BridgeError::Closed));
        }
    }

    /// Run `f` on the runtime without touching the bridge.
    pub fn defer<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.runtime.spawn(async move { f() });
    }
}

/// Hands queued calls to the bridge one at a time. Completions are spawned
/// so a slow callback never holds up the next call.
async fn drain_queue(bridge: Arc<dyn Bridge>, mut pending: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(Outbound { call, on_complete }) = pending.recv().await {
        let command = call.command();
        let result = bridge.invoke(call).await;
        if let Err(e) = &result {
            tracing::debug!(command, "bridge call failed: {e}");
        }
        tokio::spawn(async move { on_complete(result) });
    }
    tracing::debug!("bridge queue closed");
}
