use crate::bridge::BridgeError;
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::dispatcher::DispatchError;
use crate::engine::EngineError;
use crate::registry::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Codec(#[from] CodecError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Dispatch(#[from] DispatchError),
    #[error("{0}")]
    Bridge(#[from] BridgeError),
    #[error("{0}")]
    Engine(#[from] EngineError),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("node bridge is already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, Error>;
