//! Inbound fan-in: every message the bridge delivers, on every channel,
//! enters here and is routed to the registered channel by name.
//!
//! The bridge calls the same listener for the rest of the process, so a
//! failure while handling one message is logged and dropped; it never
//! escapes into the bridge.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

use crate::bridge::InboundHandler;
use crate::codec::CodecError;
use crate::registry::ChannelRegistry;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("malformed message on channel {channel}: {source}")]
    Codec {
        channel: String,
        #[source]
        source: CodecError,
    },

    #[error("listener panicked on channel {channel}: {message}")]
    ListenerPanicked { channel: String, message: String },
}

pub struct Dispatcher {
    registry: Arc<ChannelRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Route one inbound message to its channel.
    pub fn dispatch(&self, channel_name: &str, data: &str) -> Result<(), DispatchError> {
        let channel = self
            .registry
            .lookup(channel_name)
            .ok_or_else(|| DispatchError::ChannelNotFound(channel_name.to_string()))?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| channel.process_data(data)));
        match outcome {
            Ok(Ok(delivered)) => {
                if !delivered {
                    tracing::trace!(channel = %channel_name, "inbound event had no listeners");
                }
                Ok(())
            }
            Ok(Err(source)) => Err(DispatchError::Codec {
                channel: channel_name.to_string(),
                source,
            }),
            Err(payload) => Err(DispatchError::ListenerPanicked {
                channel: channel_name.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl InboundHandler for Dispatcher {
    fn on_inbound_message(&self, channel: &str, data: &str) {
        match self.dispatch(channel, data) {
            Ok(()) => {}
            // Already logged by the channel.
            Err(e @ DispatchError::Codec { .. }) => {
                tracing::debug!("dropping inbound message: {e}")
            }
            Err(e) => tracing::error!("dropping inbound message: {e}"),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
