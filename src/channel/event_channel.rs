use serde::Serialize;
use serde_json::Value;

use super::listeners::{ListenerId, ListenerTable, LocalEmitter};
use crate::bridge::{BridgeCall, BridgeError, BridgeInvoker};
use crate::codec::{CodecError, MessageCodec};

/// Event name used by the `send` / `set_listener` compatibility pair.
pub const MESSAGE_EVENT: &str = "message";

/// A named, bidirectional event pipe multiplexed over the bridge.
///
/// Inbound data from the far side becomes a local emission through
/// [`EventChannel::process_data`]; [`EventChannel::post`] pushes an event to
/// the far side. Constructed through `NodeBridge::create_channel`, which
/// registers it for inbound routing.
pub struct EventChannel {
    name: String,
    listeners: ListenerTable,
    invoker: BridgeInvoker,
}

impl EventChannel {
    pub(crate) fn new(name: impl Into<String>, invoker: BridgeInvoker) -> Self {
        Self {
            name: name.into(),
            listeners: ListenerTable::new(),
            invoker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post `event` with `args` to the far side.
    ///
    /// Encoding failures are returned here. The send itself is
    /// fire-and-forget; a failure reported by the bridge is logged.
    pub fn post(&self, event: &str, args: &[Value]) -> Result<(), CodecError> {
        let data = MessageCodec::serialize(event, args)?;
        let channel = self.name.clone();
        let event_name = event.to_string();
        self.dispatch_outbound(data, move |err| {
            tracing::warn!(channel = %channel, event = %event_name, "post failed: {err}");
        });
        Ok(())
    }

    /// Like [`post`](Self::post), with arguments taken from any value that
    /// serializes to a sequence (a tuple, `Vec`, slice).
    pub fn post_args<A>(&self, event: &str, args: &A) -> Result<(), CodecError>
    where
        A: Serialize + ?Sized,
    {
        let data = MessageCodec::serialize_args(event, args)?;
        let channel = self.name.clone();
        let event_name = event.to_string();
        self.dispatch_outbound(data, move |err| {
            tracing::warn!(channel = %channel, event = %event_name, "post failed: {err}");
        });
        Ok(())
    }

    /// Like [`post`](Self::post), but a bridge-level failure is handed to
    /// `on_error` instead of being logged.
    pub fn post_with_error_handler<F>(
        &self,
        event: &str,
        args: &[Value],
        on_error: F,
    ) -> Result<(), CodecError>
    where
        F: FnOnce(BridgeError) + Send + 'static,
    {
        let data = MessageCodec::serialize(event, args)?;
        self.dispatch_outbound(data, on_error);
        Ok(())
    }

    /// Posts a `"message"` event whose single argument is `args` as an array.
    pub fn send(&self, args: &[Value]) -> Result<(), CodecError> {
        self.post(MESSAGE_EVENT, &[Value::Array(args.to_vec())])
    }

    /// Subscribes `callback` to `"message"` events.
    pub fn set_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.listeners.subscribe(MESSAGE_EVENT, callback)
    }

    /// Inbound path: decode `data` and emit it locally.
    ///
    /// Returns whether any listener ran. Never posts back to the far side.
    /// Undecodable data is logged at error level and returned as `Err`; no
    /// listener runs.
    pub fn process_data(&self, data: &str) -> Result<bool, CodecError> {
        let envelope = MessageCodec::deserialize(data).map_err(|e| {
            tracing::error!(channel = %self.name, "dropping malformed message: {e}");
            e
        })?;
        tracing::trace!(channel = %self.name, event = %envelope.event, "emitting inbound event");
        Ok(self.listeners.emit_local(&envelope.event, &envelope.payload))
    }

    fn dispatch_outbound<F>(&self, data: String, on_error: F)
    where
        F: FnOnce(BridgeError) + Send + 'static,
    {
        let call = BridgeCall::SendMessageToNode {
            channel: self.name.clone(),
            data,
        };
        self.invoker.invoke(call, move |result| {
            if let Err(err) = result {
                on_error(err);
            }
        });
    }
}

impl LocalEmitter for EventChannel {
    fn listener_table(&self) -> &ListenerTable {
        &self.listeners
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("events", &self.listeners.event_names())
            .finish()
    }
}
