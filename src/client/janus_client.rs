use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::client::connection_loop::{self, Command, LoopHandle};
use crate::client::session::Session;
use crate::client::{ClientEvent, ConnectionState, ConnectionStats, RequestOptions};
use crate::config::JanusClientConfig;
use crate::core::{Connector, WebSocketConnector};
use crate::error::JanusError;
use crate::protocol::{ClientResponse, JanusId, JanusRequest, TableStatistics};

/// Client for the Janus General API over one WebSocket connection.
///
/// Cloning is cheap; every clone talks to the same event loop. The loop
/// stops once [`JanusClient::shutdown`] is called or every clone, session
/// and handle has been dropped.
#[derive(Debug, Clone)]
pub struct JanusClient {
    config: Arc<JanusClientConfig>,
    handle: LoopHandle,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<ClientEvent>,
}

impl JanusClient {
    /// Create a client using the WebSocket transport.
    /// Must be called from within a tokio runtime.
    pub fn new(config: JanusClientConfig) -> Result<Self, JanusError> {
        Self::with_connector(config, Arc::new(WebSocketConnector::new()))
    }

    /// Create a client on top of a custom transport
    pub fn with_connector(config: JanusClientConfig, connector: Arc<dyn Connector>) -> Result<Self, JanusError> {
        config.validate()?;
        let (handle, state, events) = connection_loop::spawn(config.clone(), connector);
        Ok(Self {
            config: Arc::new(config),
            handle,
            state,
            events,
        })
    }

    /// Open the transport and wait for the `info` handshake.
    /// Returns immediately when already connected.
    pub async fn connect(&self) -> Result<(), JanusError> {
        self.handle
            .call(|reply| Command::Connect { reply: Some(reply) })
            .await?
    }

    pub async fn disconnect(&self) -> Result<(), JanusError> {
        self.close(false).await
    }

    /// Close the transport, optionally opening a fresh one right away.
    /// Outstanding transactions are left to time out.
    pub async fn close(&self, reconnect: bool) -> Result<(), JanusError> {
        self.handle
            .call(|reply| Command::Close { reconnect, reply })
            .await
    }

    /// Send a request and wait for its final response
    pub async fn request(&self, request: JanusRequest, options: RequestOptions) -> Result<ClientResponse, JanusError> {
        self.handle.request(request, options).await
    }

    /// Query the gateway; the reply must be of type `server_info`
    pub async fn get_info(&self) -> Result<ClientResponse, JanusError> {
        let response = self.request(JanusRequest::new("info"), RequestOptions::default()).await?;
        if response.response_type() != Some("server_info") {
            return Err(JanusError::UnexpectedResponse(format!(
                "expected server_info, got {:?}",
                response.response_type()
            )));
        }
        self.handle
            .send(Command::CacheServerInfo(response.response().clone()))?;
        Ok(response)
    }

    /// Last `server_info` payload received, if any
    pub async fn server_info(&self) -> Result<Option<Value>, JanusError> {
        self.handle.call(|reply| Command::ServerInfo { reply }).await
    }

    /// Gateway version string, empty when unknown
    pub async fn version(&self) -> Result<String, JanusError> {
        let info = self.server_info().await?;
        Ok(info
            .as_ref()
            .and_then(|info| info.get("version_string"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Create a server-side session and start its heartbeat
    pub async fn create_session(&self) -> Result<Session, JanusError> {
        let response = self.request(JanusRequest::new("create"), RequestOptions::default()).await?;
        let id = response
            .data_id()
            .ok_or_else(|| JanusError::UnexpectedResponse("create response without data.id".to_string()))?;
        let channels = self
            .handle
            .call(|reply| Command::AddSession { id: id.clone(), reply })
            .await?;
        Ok(Session::new(id, self.handle.clone(), channels))
    }

    /// Destroy a session; the local mapping is dropped only if the server agrees
    pub async fn destroy_session(&self, id: &JanusId) -> Result<(), JanusError> {
        self.handle.destroy_session(id).await.map(|_| ())
    }

    pub async fn session_ids(&self) -> Result<Vec<JanusId>, JanusError> {
        self.handle.call(|reply| Command::SessionIds { reply }).await
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Watch the connection state
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn pending_transaction_count(&self) -> Result<usize, JanusError> {
        Ok(self.transaction_statistics().await?.pending_count)
    }

    pub async fn transaction_statistics(&self) -> Result<TableStatistics, JanusError> {
        self.handle.call(|reply| Command::Statistics { reply }).await
    }

    pub async fn stats(&self) -> Result<ConnectionStats, JanusError> {
        self.handle.call(|reply| Command::Stats { reply }).await
    }

    pub fn config(&self) -> &JanusClientConfig {
        &self.config
    }

    /// Stop the event loop; pending requests fail with [`JanusError::Shutdown`]
    pub fn shutdown(&self) {
        let _ = self.handle.send(Command::Shutdown);
    }
}
