//! Connection, session and plugin handle objects.
//!
//! All mutable state lives inside one spawned event loop per connection
//! (the connection loop); the public types here are cheap clonable
//! handles that talk to it over channels.

pub(crate) mod connection_loop;
pub mod janus_client;
pub mod plugin;
pub mod plugin_handle;
pub mod session;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::JanusError;

pub use janus_client::JanusClient;
pub use plugin::Plugin;
pub use plugin_handle::PluginHandle;
pub use session::Session;

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Session liveness as tracked by the heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Alive,
    Dying,
    Dead,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Alive => write!(f, "alive"),
            SessionState::Dying => write!(f, "dying"),
            SessionState::Dead => write!(f, "dead"),
        }
    }
}

/// Connection-level notifications
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Transport open and the `info` handshake succeeded
    Connected,
    Disconnected,
    Error(JanusError),
}

/// Session-level notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Outcome of one keep-alive round trip
    KeepAlive(bool),
    StateChanged(SessionState),
    /// Heartbeat failures crossed the threshold; the session is gone
    Timeout,
    /// The server expired the session on its own
    Expired,
    /// An event that no attached handle claimed
    Event(Value),
}

/// Events pushed to one plugin handle
#[derive(Debug, Clone, PartialEq)]
pub enum HandleEvent {
    WebrtcUp(Value),
    Media(Value),
    Hangup(Value),
    SlowLink(Value),
    Detached(Value),
    Event(Value),
}

impl HandleEvent {
    pub fn body(&self) -> &Value {
        match self {
            HandleEvent::WebrtcUp(body)
            | HandleEvent::Media(body)
            | HandleEvent::Hangup(body)
            | HandleEvent::SlowLink(body)
            | HandleEvent::Detached(body)
            | HandleEvent::Event(body) => body,
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// The server may answer with an interim `ack`
    pub ack: bool,
    /// Overrides the configured request timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn ack() -> Self {
        Self {
            ack: true,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Traffic counters for the current client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}
