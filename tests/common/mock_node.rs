// tests/common/mock_node.rs
//! Simulated backend engine on the far side of the bridge.

use serde_json::Value;
use tokio::sync::Mutex;

use nodebridge_lib::{Envelope, MessageCodec};

/// Backend stand-in: remembers what it received and can echo messages back.
pub struct MockNode {
    received: Mutex<Vec<(String, Envelope)>>,
    started_with: Mutex<Option<String>>,
    echo: bool,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            started_with: Mutex::new(None),
            echo: false,
        }
    }

    /// A backend that sends every message straight back on the same channel.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    /// Record an inbound message. Returns the data to send back, if any.
    pub async fn receive(&self, channel: &str, data: &str) -> Result<Option<String>, String> {
        let envelope = MessageCodec::deserialize(data).map_err(|e| e.to_string())?;
        self.received
            .lock()
            .await
            .push((channel.to_string(), envelope));
        Ok(self.echo.then(|| data.to_string()))
    }

    pub async fn start(&self, program: &str) -> Result<(), String> {
        let mut started = self.started_with.lock().await;
        if started.is_some() {
            return Err("engine already started".to_string());
        }
        *started = Some(program.to_string());
        Ok(())
    }

    pub async fn started_with(&self) -> Option<String> {
        self.started_with.lock().await.clone()
    }

    pub async fn received(&self) -> Vec<(String, Envelope)> {
        self.received.lock().await.clone()
    }

    /// Encode an event the way the backend would before delivering it.
    pub fn encode(event: &str, args: &[Value]) -> String {
        MessageCodec::serialize(event, args).expect("test arguments are serializable")
    }
}
