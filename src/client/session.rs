use std::sync::Arc;
use tokio::sync::{broadcast, watch, OnceCell};

use crate::client::connection_loop::{Command, LoopHandle, SessionChannels};
use crate::client::plugin::Plugin;
use crate::client::{RequestOptions, SessionEvent, SessionState};
use crate::error::JanusError;
use crate::plugins::videoroom::{VideoRoomHandle, VideoRoomPlugin};
use crate::protocol::{ClientResponse, JanusId, JanusRequest};

/// A server-side session kept alive by a heartbeat
#[derive(Debug, Clone)]
pub struct Session {
    id: JanusId,
    handle: LoopHandle,
    state: watch::Receiver<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    video_room: Arc<OnceCell<VideoRoomHandle>>,
}

impl Session {
    pub(crate) fn new(id: JanusId, handle: LoopHandle, channels: SessionChannels) -> Self {
        Self {
            id,
            handle,
            state: channels.state,
            events: channels.events,
            video_room: Arc::new(OnceCell::new()),
        }
    }

    pub fn id(&self) -> &JanusId {
        &self.id
    }

    /// Send a session-scoped request; this also pushes back the next heartbeat
    pub async fn request(&self, mut request: JanusRequest, options: RequestOptions) -> Result<ClientResponse, JanusError> {
        request.set("session_id", self.id.to_value());
        self.handle.request(request, options).await
    }

    /// Run one keep-alive round trip now, counted like a scheduled one
    pub async fn keep_alive(&self) -> Result<(), JanusError> {
        self.handle
            .call(|reply| Command::KeepAlive {
                id: self.id.clone(),
                reply,
            })
            .await?
    }

    /// Attach `plugin` and return the new handle id without registering it
    pub async fn create_plugin_handle(&self, plugin: &str) -> Result<JanusId, JanusError> {
        self.plugin(plugin).create_handle().await
    }

    pub fn plugin(&self, name: &str) -> Plugin {
        Plugin::new(self.clone(), name)
    }

    pub fn video_room(&self) -> VideoRoomPlugin {
        VideoRoomPlugin::new(self.plugin(crate::plugins::videoroom::VIDEOROOM_PLUGIN), self.video_room.clone())
    }

    /// Stop the heartbeat and destroy the session on the server
    pub async fn destroy(&self) -> Result<(), JanusError> {
        self.handle.send(Command::StopHeartbeat { id: self.id.clone() })?;
        self.handle.destroy_session(&self.id).await.map(|_| ())
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_alive(&self) -> bool {
        self.state() == SessionState::Alive
    }

    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn loop_handle(&self) -> &LoopHandle {
        &self.handle
    }
}
