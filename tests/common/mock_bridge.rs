// tests/common/mock_bridge.rs
//! Mock bridge connecting the crate to a MockNode.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use nodebridge_lib::{Bridge, BridgeCall, BridgeError, InboundHandler};

use super::mock_node::MockNode;

pub struct MockBridge {
    node: Arc<MockNode>,
    handler: StdMutex<Option<Arc<dyn InboundHandler>>>,
    listener_installs: StdMutex<usize>,
    commands: Mutex<Vec<&'static str>>,
    should_fail: Mutex<Option<String>>,
}

impl MockBridge {
    pub fn new(node: MockNode) -> Arc<Self> {
        Arc::new(Self {
            node: Arc::new(node),
            handler: StdMutex::new(None),
            listener_installs: StdMutex::new(0),
            commands: Mutex::new(Vec::new()),
            should_fail: Mutex::new(None),
        })
    }

    pub fn node(&self) -> &Arc<MockNode> {
        &self.node
    }

    /// Make every subsequent call fail with `message`.
    pub async fn set_should_fail(&self, message: impl Into<String>) {
        *self.should_fail.lock().await = Some(message.into());
    }

    /// How many times a dispatcher was registered with this bridge.
    pub fn listener_installs(&self) -> usize {
        *self.listener_installs.lock().unwrap()
    }

    pub async fn commands(&self) -> Vec<&'static str> {
        self.commands.lock().await.clone()
    }

    /// Deliver raw data as if the backend had sent it on `channel`.
    pub fn deliver(&self, channel: &str, data: &str) {
        let handler = self.handler.lock().unwrap().clone();
        handler
            .expect("dispatcher was not registered with the bridge")
            .on_inbound_message(channel, data);
    }

    /// Wait until the backend has received `count` messages.
    pub async fn wait_for_received(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.node.received().await.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for the backend to receive messages");
    }
}

#[async_trait]
impl Bridge for MockBridge {
    async fn invoke(&self, call: BridgeCall) -> Result<Value, BridgeError> {
        self.commands.lock().await.push(call.command());

        if let Some(message) = self.should_fail.lock().await.clone() {
            return Err(BridgeError::Invocation(message));
        }

        match call {
            BridgeCall::SendMessageToNode { channel, data } => {
                let reply = self
                    .node
                    .receive(&channel, &data)
                    .await
                    .map_err(BridgeError::Invocation)?;
                if let Some(reply) = reply {
                    self.deliver(&channel, &reply);
                }
            }
            BridgeCall::StartEngine { entry_file, .. } => {
                self.node
                    .start(&entry_file)
                    .await
                    .map_err(BridgeError::Invocation)?;
            }
            BridgeCall::StartEngineWithScript { script, .. } => {
                self.node
                    .start(&script)
                    .await
                    .map_err(BridgeError::Invocation)?;
            }
        }
        Ok(Value::Null)
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
