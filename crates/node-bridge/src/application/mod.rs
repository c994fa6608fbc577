//! # Application Module
//!
//! Long-running listeners and the `NodeBridge` facade orchestrating the
//! domain and the outbound ports.

pub mod bridge;
pub mod stream;
pub mod tangle_listener;

pub use bridge::NodeBridge;
pub use stream::listen_to_stream;
pub use tangle_listener::{ListenerQueryError, TangleEvents, TangleListener};
