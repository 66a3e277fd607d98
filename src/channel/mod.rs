//! Named event channels.
//!
//! - `ListenerTable` / `LocalEmitter`: in-process subscription and emission
//! - `EventChannel`: a named pipe that emits locally on inbound data and
//!   posts outbound events across the bridge

mod event_channel;
mod listeners;


pub use event_channel::{EventChannel, MESSAGE_EVENT};
pub use listeners::{Handler, ListenerId, ListenerTable, LocalEmitter};
