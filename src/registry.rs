//! Channel registry: channel name → channel, used for inbound routing.
//!
//! Names are unique. A second registration under an existing name is
//! rejected rather than replacing the live channel and stranding its
//! listeners.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::channel::EventChannel;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("channel already registered: {0}")]
    DuplicateChannel(String),

    #[error("invalid channel name: {0:?}")]
    InvalidName(String),
}

/// Routing table consulted by the dispatcher for every inbound message.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<EventChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `channel` under its own name. Empty and already-taken names are rejected.
    pub fn register(&self, channel: Arc<EventChannel>) -> Result<(), RegistryError> {
        let name = channel.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::InvalidName(name));
        }
        match self.channels.entry(name) {
            Entry::Occupied(existing) => {
                Err(RegistryError::DuplicateChannel(existing.key().clone()))
            }
            Entry::Vacant(slot) => {
                tracing::debug!(channel = %slot.key(), "registered channel");
                slot.insert(channel);
                Ok(())
            }
        }
    }

    /// The channel registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Arc<EventChannel>> {
        self.channels.get(name).map(|entry| entry.value().clone())
    }

    /// Remove a channel so it no longer receives inbound data.
    pub fn unregister(&self, name: &str) -> Option<Arc<EventChannel>> {
        let removed = self.channels.remove(name).map(|(_, channel)| channel);
        if removed.is_some() {
            tracing::debug!(channel = %name, "unregistered channel");
        }
        removed
    }

    /// Whether a channel is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Registered channel names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
