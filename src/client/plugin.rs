use crate::client::connection_loop::Command;
use crate::client::plugin_handle::PluginHandle;
use crate::client::session::Session;
use crate::client::RequestOptions;
use crate::error::JanusError;
use crate::protocol::{JanusId, JanusRequest};

/// A named plugin bound to one session
#[derive(Debug, Clone)]
pub struct Plugin {
    session: Session,
    name: String,
}

impl Plugin {
    pub(crate) fn new(session: Session, name: &str) -> Self {
        Self {
            session,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Ask the server to attach this plugin and return the handle id
    pub async fn create_handle(&self) -> Result<JanusId, JanusError> {
        let request = JanusRequest::new("attach").with("plugin", self.name.clone());
        let response = self.session.request(request, RequestOptions::default()).await?;
        response
            .data_id()
            .ok_or_else(|| JanusError::UnexpectedResponse("attach response without data.id".to_string()))
    }

    /// Attach and register a handle so events addressed to it reach it
    pub async fn attach(&self) -> Result<PluginHandle, JanusError> {
        let handle_id = self.create_handle().await?;
        let channels = self
            .session
            .loop_handle()
            .call(|reply| Command::AddHandle {
                session_id: self.session.id().clone(),
                plugin: self.name.clone(),
                handle_id: handle_id.clone(),
                reply,
            })
            .await??;
        Ok(PluginHandle::new(self.clone(), handle_id, channels))
    }

    pub async fn has_handle(&self, handle_id: &JanusId) -> Result<bool, JanusError> {
        self.session
            .loop_handle()
            .call(|reply| Command::HasHandle {
                session_id: self.session.id().clone(),
                plugin: self.name.clone(),
                handle_id: handle_id.clone(),
                reply,
            })
            .await
    }

    /// Detach a handle. The local entry is dropped whether or not the server
    /// accepts the detach; a failed detach is still returned.
    pub async fn destroy_handle_by_id(&self, handle_id: &JanusId) -> Result<(), JanusError> {
        if !self.has_handle(handle_id).await? {
            return Err(JanusError::InvalidHandle(handle_id.clone()));
        }

        let request = JanusRequest::new("detach").with("handle_id", handle_id.to_value());
        let detached = self.session.request(request, RequestOptions::default()).await;
        self.session
            .loop_handle()
            .call(|reply| Command::RemoveHandle {
                session_id: self.session.id().clone(),
                plugin: self.name.clone(),
                handle_id: handle_id.clone(),
                reply,
            })
            .await?;
        detached.map(|_| ())
    }
}
