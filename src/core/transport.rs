use std::fmt;
use tokio::sync::mpsc;

use crate::error::JanusError;

/// What the transport reports back to the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The opening handshake completed
    Open,
    Message(String),
    Error(String),
    /// The channel is gone; no further events follow
    Closed,
}

/// What the connection asks of the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Send(String),
    Close,
}

/// Both directions of one opened transport
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<TransportCommand>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportLink {
    /// Build a link plus the far ends a transport implementation drives
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<TransportCommand>,
        mpsc::UnboundedSender<TransportEvent>,
    ) {
        let (outbound, commands) = mpsc::unbounded_channel();
        let (events, inbound) = mpsc::unbounded_channel();
        (Self { outbound, inbound }, commands, events)
    }
}

/// Opens transports. `open` must return immediately; the handshake outcome is
/// reported later as [`TransportEvent::Open`] or [`TransportEvent::Closed`].
pub trait Connector: Send + Sync + fmt::Debug {
    fn open(&self, url: &str, protocol: &str) -> TransportLink;
}

/// Anything a serialized frame can be pushed into
pub trait FrameSink {
    fn send_text(&self, text: String) -> Result<(), JanusError>;
}

impl FrameSink for mpsc::UnboundedSender<TransportCommand> {
    fn send_text(&self, text: String) -> Result<(), JanusError> {
        self.send(TransportCommand::Send(text))
            .map_err(|_| JanusError::Transport("transport channel closed".to_string()))
    }
}
