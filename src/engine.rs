//! Backend engine lifecycle calls.
//!
//! Starting the engine is a one-shot call across the bridge, independent of
//! the channel protocol. Failures are reported only through the completion
//! callback (or the returned future for the `_async` forms), never by
//! panicking or returning early in the caller's context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::bridge::{BridgeCall, BridgeError, BridgeInvoker};

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("invalid engine start request: {0}")]
    InvalidRequest(String),

    #[error("engine failed to start: {0}")]
    StartFailed(#[from] BridgeError),

    /// The completion was dropped without reporting an outcome.
    #[error("engine start was abandoned before completing")]
    Abandoned,
}

/// Backend-defined start options. Opaque to this crate; forwarded as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StartOptions(Map<String, Value>);

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any earlier value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// The value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The options as the JSON object sent across the bridge.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for StartOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

pub struct EngineControl {
    invoker: BridgeInvoker,
}

impl EngineControl {
    pub fn new(invoker: BridgeInvoker) -> Self {
        Self { invoker }
    }

    /// Ask the backend to start by loading `entry_file`.
    pub fn start<F>(&self, entry_file: impl Into<String>, options: StartOptions, callback: F)
    where
        F: FnOnce(Result<(), EngineError>) + Send + 'static,
    {
        let entry_file = entry_file.into();
        if entry_file.trim().is_empty() {
            self.reject("engine entry file cannot be empty", callback);
            return;
        }
        tracing::info!(entry_file = %entry_file, "starting engine");
        self.run(
            BridgeCall::StartEngine {
                entry_file,
                options,
            },
            callback,
        );
    }

    /// Ask the backend to start by executing inline script text.
    pub fn start_with_script<F>(&self, script: impl Into<String>, options: StartOptions, callback: F)
    where
        F: FnOnce(Result<(), EngineError>) + Send + 'static,
    {
        let script = script.into();
        if script.trim().is_empty() {
            self.reject("engine script cannot be empty", callback);
            return;
        }
        tracing::info!(script_len = script.len(), "starting engine with inline script");
        self.run(BridgeCall::StartEngineWithScript { script, options }, callback);
    }

    pub async fn start_async(
        &self,
        entry_file: impl Into<String>,
        options: StartOptions,
    ) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.start(entry_file, options, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(EngineError::Abandoned))
    }

    pub async fn start_with_script_async(
        &self,
        script: impl Into<String>,
        options: StartOptions,
    ) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.start_with_script(script, options, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(EngineError::Abandoned))
    }

    fn run<F>(&self, call: BridgeCall, callback: F)
    where
        F: FnOnce(Result<(), EngineError>) + Send + 'static,
    {
        let command = call.command();
        self.invoker.invoke(call, move |result| match result {
            Ok(_) => {
                tracing::info!(command, "engine started");
                callback(Ok(()));
            }
            Err(e) => {
                tracing::error!(command, "engine start failed: {e}");
                callback(Err(EngineError::StartFailed(e)));
            }
        });
    }

    // Validation failures still go through the callback, deferred onto the
    // runtime like every other outcome.
    fn reject<F>(&self, message: &str, callback: F)
    where
        F: FnOnce(Result<(), EngineError>) + Send + 'static,
    {
        let err = EngineError::InvalidRequest(message.to_string());
        tracing::warn!("{err}");
        self.invoker.defer(move || callback(Err(err)));
    }
}
