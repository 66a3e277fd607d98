// tests/common/mod.rs
//! Common test utilities for bridge integration tests.

pub mod mock_bridge;
pub mod mock_node;

pub use mock_bridge::MockBridge;
pub use mock_node::MockNode;
