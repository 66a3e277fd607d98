//! Module wiring.
//!
//! `NodeBridge` owns the channel registry and the dispatcher, installs the
//! dispatcher as the bridge's single all-channels listener, and creates the
//! default events channel up front.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::bridge::{Bridge, BridgeInvoker};
use crate::channel::EventChannel;
use crate::config::BridgeConfig;
use crate::dispatcher::Dispatcher;
use crate::engine::{EngineControl, EngineError, StartOptions};
use crate::error::Result;
use crate::registry::{ChannelRegistry, RegistryError};

pub struct NodeBridge {
    registry: Arc<ChannelRegistry>,
    dispatcher: Arc<Dispatcher>,
    invoker: BridgeInvoker,
    engine: EngineControl,
    events: Arc<EventChannel>,
}

impl NodeBridge {
    /// Wire up on the tokio runtime of the calling context.
    pub fn new(bridge: Arc<dyn Bridge>, config: &BridgeConfig) -> Result<Self> {
        let invoker = BridgeInvoker::current(bridge)?;
        Self::with_invoker(invoker, config)
    }

    pub fn with_runtime(
        bridge: Arc<dyn Bridge>,
        runtime: Handle,
        config: &BridgeConfig,
    ) -> Result<Self> {
        Self::with_invoker(BridgeInvoker::new(bridge, runtime), config)
    }

    fn with_invoker(invoker: BridgeInvoker, config: &BridgeConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ChannelRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
        invoker
            .bridge()
            .set_all_channels_listener(dispatcher.clone())?;

        let events = Arc::new(EventChannel::new(
            config.events_channel.clone(),
            invoker.clone(),
        ));
        registry.register(events.clone())?;

        tracing::info!(events_channel = %config.events_channel, "node bridge ready");
        Ok(Self {
            registry,
            dispatcher,
            engine: EngineControl::new(invoker.clone()),
            invoker,
            events,
        })
    }

    /// The default channel for general-purpose user events.
    pub fn channel(&self) -> &Arc<EventChannel> {
        &self.events
    }

    /// Create a channel and register it for inbound routing.
    pub fn create_channel(
        &self,
        name: impl Into<String>,
    ) -> std::result::Result<Arc<EventChannel>, RegistryError> {
        let channel = Arc::new(EventChannel::new(name, self.invoker.clone()));
        self.registry.register(channel.clone())?;
        Ok(channel)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<EventChannel>> {
        self.registry.lookup(name)
    }

    /// Stop routing inbound data to `name`. The default channel cannot be removed.
    pub fn remove_channel(&self, name: &str) -> Option<Arc<EventChannel>> {
        if name == self.events.name() {
            tracing::warn!(channel = %name, "refusing to remove the default events channel");
            return None;
        }
        self.registry.unregister(name)
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn engine(&self) -> &EngineControl {
        &self.engine
    }

    pub fn start<F>(&self, entry_file: impl Into<String>, options: StartOptions, callback: F)
    where
        F: FnOnce(std::result::Result<(), EngineError>) + Send + 'static,
    {
        self.engine.start(entry_file, options, callback)
    }

    pub fn start_with_script<F>(&self, script: impl Into<String>, options: StartOptions, callback: F)
    where
        F: FnOnce(std::result::Result<(), EngineError>) + Send + 'static,
    {
        self.engine.start_with_script(script, options, callback)
    }
}
