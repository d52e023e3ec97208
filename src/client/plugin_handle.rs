use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::client::connection_loop::HandleChannels;
use crate::client::plugin::Plugin;
use crate::client::session::Session;
use crate::client::{HandleEvent, RequestOptions};
use crate::error::JanusError;
use crate::protocol::{ClientResponse, JanusId, JanusRequest, PluginResponse};

/// One attached instance of a plugin
#[derive(Debug, Clone)]
pub struct PluginHandle {
    id: JanusId,
    plugin: Plugin,
    connected: watch::Receiver<bool>,
    events: broadcast::Sender<HandleEvent>,
    disposed: Arc<AtomicBool>,
}

impl PluginHandle {
    pub(crate) fn new(plugin: Plugin, id: JanusId, channels: HandleChannels) -> Self {
        Self {
            id,
            plugin,
            connected: channels.connected,
            events: channels.events,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &JanusId {
        &self.id
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    pub fn session(&self) -> &Session {
        self.plugin.session()
    }

    /// Send a handle-scoped request
    pub async fn request(&self, mut request: JanusRequest, options: RequestOptions) -> Result<ClientResponse, JanusError> {
        request.set("handle_id", self.id.to_value());
        self.session().request(request, options).await
    }

    /// Send a plugin `message`. A `jsep` inside `body` travels at the top level.
    pub async fn request_message(&self, mut body: Value, options: RequestOptions) -> Result<PluginResponse, JanusError> {
        let jsep = body.as_object_mut().and_then(|fields| fields.remove("jsep"));
        let mut request = JanusRequest::new("message").with("body", body);
        if let Some(jsep) = jsep {
            request.set("jsep", jsep);
        }

        let response = PluginResponse::new(self.request(request, options).await?);
        if response.is_error() {
            return Err(JanusError::from_plugin_response(
                response.into_client_response(),
                self.id.clone(),
            ));
        }
        Ok(response)
    }

    pub async fn detach(&self) -> Result<ClientResponse, JanusError> {
        self.request(JanusRequest::new("detach"), RequestOptions::default())
            .await
    }

    /// Tear down the PeerConnection; only valid while media is up
    pub async fn hangup(&self) -> Result<ClientResponse, JanusError> {
        if !self.is_connected() {
            return Err(JanusError::HandleNotConnected(self.id.clone()));
        }
        self.request(JanusRequest::new("hangup"), RequestOptions::default())
            .await
    }

    pub async fn trickle(&self, candidate: Value) -> Result<ClientResponse, JanusError> {
        let request = JanusRequest::new("trickle").with("candidate", candidate);
        self.request(request, RequestOptions::default()).await
    }

    pub async fn trickle_completed(&self) -> Result<ClientResponse, JanusError> {
        self.trickle(json!({ "completed": true })).await
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Detach and forget this handle. A second call fails without a remote call.
    pub async fn dispose(&self) -> Result<(), JanusError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(JanusError::AlreadyDisposed(self.id.clone()));
        }
        self.plugin.destroy_handle_by_id(&self.id).await
    }

    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HandleEvent> {
        self.events.subscribe()
    }
}
