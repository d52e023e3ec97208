//! # RustJanusGateway
//!
//! Async client for the Janus WebRTC Gateway General API over WebSocket.
//!
//! ## Features
//!
//! - **Transaction correlation**: every request gets a unique id, replies are
//!   matched by it, and interim `ack` frames are handled in either order
//! - **Session keep-alive**: periodic heartbeats with a failure threshold
//! - **Event routing**: unsolicited events go connection → session → plugin handle
//! - **Idle watchdog**: a silent connection is closed and optionally reopened
//! - **VideoRoom**: publisher and subscriber helpers for `janus.plugin.videoroom`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_janus_gateway::{JanusClient, JanusClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = JanusClient::new(JanusClientConfig::new("ws://localhost:8188"))?;
//!     client.connect().await?;
//!     println!("Janus {}", client.version().await?);
//!
//!     let session = client.create_session().await?;
//!     let rooms = session.video_room().default_handle().await?.list().await?;
//!     println!("{} rooms", rooms.len());
//!
//!     session.destroy().await?;
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod plugins;
pub mod protocol;
pub mod utils;

// Client exports (connection, session and handle objects)
pub use client::{
    ClientEvent, ConnectionState, ConnectionStats, HandleEvent, JanusClient, Plugin, PluginHandle,
    RequestOptions, Session, SessionEvent, SessionState,
};

// Protocol exports (wire types and the transaction state machine)
pub use protocol::{
    ClientResponse, CorrelationTable, JanusEventKind, JanusId, JanusRequest, PluginResponse, Transaction,
    TransactionObserver, TransactionOptions, TransactionState,
};

// Transport exports
pub use core::{Connector, TransportCommand, TransportEvent, TransportLink, WebSocketConnector};

// Plugin exports
pub use plugins::{VideoRoomHandle, VideoRoomPlugin, VideoRoomRole};

// Configuration exports
pub use config::JanusClientConfig;

// Error exports
pub use error::{JanusError, Result};

// Utility exports
pub use utils::JsonUtils;

// Re-export common dependencies for convenience
pub use serde_json::{json, Value as JsonValue};

/// Prelude module for convenient importing
pub mod prelude {
    pub use crate::{
        ClientEvent, ClientResponse, ConnectionState, HandleEvent, JanusClient, JanusClientConfig, JanusError,
        JanusId, JanusRequest, PluginHandle, PluginResponse, RequestOptions, Result, Session, SessionEvent,
        SessionState, VideoRoomHandle, VideoRoomPlugin,
        JsonValue, json,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
