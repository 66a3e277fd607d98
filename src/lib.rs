//! Event transport between a UI-side controller and an embedded Node.js engine.
//!
//! Named events with JSON arguments are multiplexed onto named channels and
//! carried over a native bridge that only offers an asynchronous,
//! string-based call primitive.
//!
//! # Architecture
//!
//! Outbound: `EventChannel::post` → `MessageCodec` → `BridgeCall::SendMessageToNode`.
//! Inbound: bridge → `Dispatcher` → `ChannelRegistry` lookup →
//! `EventChannel::process_data` → local listeners.
//!
//! - `codec`: double-encoded envelope wire format
//! - `channel`: listener tables and event channels
//! - `registry`: channel name → channel routing table
//! - `dispatcher`: single inbound fan-in point
//! - `bridge`: transport seam and the stdio host bridge
//! - `engine`: engine start calls
//! - `node`: wiring of all of the above
//! - `config`: configuration

pub mod bridge;
pub mod channel;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod node;
pub mod registry;

#[cfg(test)]
mod testing;

use std::sync::{Arc, Mutex, OnceLock};

pub use bridge::{Bridge, BridgeCall, BridgeError, BridgeInvoker, InboundHandler, StdioBridge};
pub use channel::{EventChannel, ListenerId, ListenerTable, LocalEmitter, MESSAGE_EVENT};
pub use codec::{CodecError, Envelope, MessageCodec};
pub use config::{BridgeConfig, HostConfig, DEFAULT_EVENTS_CHANNEL};
pub use dispatcher::{DispatchError, Dispatcher};
pub use engine::{EngineControl, EngineError, StartOptions};
pub use error::{Error, Result};
pub use node::NodeBridge;
pub use registry::{ChannelRegistry, RegistryError};

static NODE_BRIDGE: OnceLock<NodeBridge> = OnceLock::new();
// Held across the check and the construction so only one caller ever
// registers a dispatcher with a bridge.
static INIT_GUARD: Mutex<()> = Mutex::new(());

/// Install the process-wide [`NodeBridge`]. Fails if one is already installed,
/// without touching `bridge`.
pub fn init(bridge: Arc<dyn Bridge>, config: &BridgeConfig) -> Result<&'static NodeBridge> {
    let _guard = INIT_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if NODE_BRIDGE.get().is_some() {
        return Err(Error::AlreadyInitialized);
    }
    let node = NodeBridge::new(bridge, config)?;
    NODE_BRIDGE
        .set(node)
        .map_err(|_| Error::AlreadyInitialized)?;
    NODE_BRIDGE.get().ok_or(Error::AlreadyInitialized)
}

/// The process-wide [`NodeBridge`], if [`init`] has run.
pub fn global() -> Option<&'static NodeBridge> {
    NODE_BRIDGE.get()
}

/// Install a `tracing` subscriber. `RUST_LOG` takes precedence over `filter`.
/// Later calls are no-ops.
pub fn init_tracing(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}
