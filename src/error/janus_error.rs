use std::time::Duration;
use thiserror::Error;

use crate::client::ConnectionState;
use crate::protocol::message_types::{ClientResponse, JanusId};
use crate::protocol::transaction::TransactionState;

/// Every failure the client can surface to a caller or an observer
#[derive(Error, Debug, Clone)]
pub enum JanusError {
    #[error("Wrong connection state: {state}")]
    ConnectionState { state: ConnectionState },

    #[error("Transaction {transaction_id} timed out after {timeout:?}")]
    TransactionTimeout {
        transaction_id: String,
        timeout: Duration,
    },

    #[error("Janus error {code}: {reason}")]
    Response {
        code: i64,
        reason: String,
        response: Box<ClientResponse>,
    },

    #[error("Plugin error {code} on handle {handle_id}: {reason}")]
    Plugin {
        code: i64,
        reason: String,
        handle_id: JanusId,
        response: Box<ClientResponse>,
    },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid transaction state {0}")]
    InvalidTransactionState(TransactionState),

    #[error("Handle {0} already disposed")]
    AlreadyDisposed(JanusId),

    #[error("Invalid handle id {0}")]
    InvalidHandle(JanusId),

    #[error("Handle {0} not connected")]
    HandleNotConnected(JanusId),

    #[error("Session {0} not found")]
    SessionNotFound(JanusId),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Client event loop has shut down")]
    Shutdown,
}

impl JanusError {
    /// Builds a protocol error from a `janus: "error"` final frame
    pub fn from_response(response: ClientResponse) -> Self {
        Self::Response {
            code: response.error_code().unwrap_or_default(),
            reason: response.error_reason().unwrap_or_default().to_string(),
            response: Box::new(response),
        }
    }

    /// Builds a plugin error from a success frame carrying `plugindata.data.error_code`
    pub fn from_plugin_response(response: ClientResponse, handle_id: JanusId) -> Self {
        let code = response
            .get("plugindata.data.error_code")
            .and_then(|v| v.as_i64())
            .unwrap_or_default();
        let reason = response
            .get("plugindata.data.error")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Self::Plugin {
            code,
            reason,
            handle_id,
            response: Box::new(response),
        }
    }

    /// Returns the stable string form of the error kind
    pub fn code(&self) -> &'static str {
        match self {
            JanusError::ConnectionState { .. } => "CONNECTION_STATE",
            JanusError::TransactionTimeout { .. } => "TRANSACTION_TIMEOUT",
            JanusError::Response { .. } => "RESPONSE_ERROR",
            JanusError::Plugin { .. } => "PLUGIN_ERROR",
            JanusError::MalformedFrame(_) => "MALFORMED_FRAME",
            JanusError::InvalidTransactionState(_) => "INVALID_TRANSACTION_STATE",
            JanusError::AlreadyDisposed(_) => "ALREADY_DISPOSED",
            JanusError::InvalidHandle(_) => "INVALID_HANDLE",
            JanusError::HandleNotConnected(_) => "HANDLE_NOT_CONNECTED",
            JanusError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            JanusError::UnexpectedResponse(_) => "UNEXPECTED_RESPONSE",
            JanusError::InvalidOperation(_) => "INVALID_OPERATION",
            JanusError::Transport(_) => "TRANSPORT_ERROR",
            JanusError::Configuration(_) => "CONFIGURATION_ERROR",
            JanusError::Serialization(_) => "SERIALIZATION_ERROR",
            JanusError::Shutdown => "SHUTDOWN",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, JanusError::TransactionTimeout { .. })
    }
}

impl From<serde_json::Error> for JanusError {
    fn from(error: serde_json::Error) -> Self {
        JanusError::Serialization(error.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for JanusError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        JanusError::Transport(error.to_string())
    }
}
