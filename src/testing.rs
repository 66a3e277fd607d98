//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::bridge::{Bridge, BridgeCall, BridgeError, InboundHandler};

/// Bridge that records every call and optionally fails them.
#[derive(Default)]
pub struct RecordingBridge {
    calls: Mutex<Vec<BridgeCall>>,
    failure: Mutex<Option<String>>,
    handler: Mutex<Option<Arc<dyn InboundHandler>>>,
    listener_installs: Mutex<usize>,
}

impl RecordingBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn listener_installs(&self) -> usize {
        *self.listener_installs.lock().unwrap()
    }

    /// Wait until at least `count` calls were recorded.
    pub async fn wait_for_calls(&self, count: usize) -> Vec<BridgeCall> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let calls = self.calls();
                if calls.len() >= count {
                    return calls;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for bridge calls")
    }

    /// Simulate the backend delivering `data` on `channel`.
    pub fn deliver(&self, channel: &str, data: &str) {
        let handler = self.handler.lock().unwrap().clone();
        handler
            .expect("no inbound listener installed")
            .on_inbound_message(channel, data);
    }
}

#[async_trait]
impl Bridge for RecordingBridge {
    async fn invoke(&self, call: BridgeCall) -> Result<Value, BridgeError> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(BridgeError::Invocation(message)),
            None => Ok(Value::Null),
        }
    }

    fn set_all_channels_listener(
        &self,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<(), BridgeError> {
        *self.handler.lock().unwrap() = Some(handler);
        *self.listener_installs.lock().unwrap() += 1;
        Ok(())
    }
}
