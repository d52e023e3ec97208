//! `janus.plugin.videoroom` requests and the publisher/subscriber helpers.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, OnceCell};

use crate::client::{Plugin, PluginHandle, RequestOptions};
use crate::error::JanusError;
use crate::protocol::{JanusId, PluginResponse};
use crate::utils::JsonUtils;

pub const VIDEOROOM_PLUGIN: &str = "janus.plugin.videoroom";

/// What a VideoRoom handle was attached for, with the state that role keeps
#[derive(Debug, Clone, PartialEq)]
pub enum VideoRoomRole {
    Generic,
    Publisher {
        room: JanusId,
        publisher_id: Option<JanusId>,
        answer: Option<String>,
    },
    Subscriber {
        room: JanusId,
        feed: JanusId,
        offer: Option<String>,
    },
}

/// Outcome of `create`
#[derive(Debug, Clone)]
pub struct RoomCreated {
    pub room: Option<JanusId>,
    pub response: PluginResponse,
}

/// Outcome of `join` and `joinandconfigure`
#[derive(Debug, Clone)]
pub struct Joined {
    pub id: Option<JanusId>,
    pub jsep: Option<Value>,
    pub publishers: Vec<Value>,
    pub response: PluginResponse,
}

impl Joined {
    fn from_response(response: PluginResponse) -> Self {
        Self {
            id: response.data_field("id").and_then(JanusId::from_value),
            jsep: response.jsep().cloned(),
            publishers: array_field(&response, "publishers"),
            response,
        }
    }

    fn sdp(&self) -> Result<String, JanusError> {
        self.jsep
            .as_ref()
            .and_then(|jsep| jsep.get("sdp"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| JanusError::UnexpectedResponse("videoroom reply carries no jsep.sdp".to_string()))
    }
}

fn array_field(response: &PluginResponse, field: &str) -> Vec<Value> {
    response
        .data_field(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

static SDP_DIRECTION: OnceLock<Regex> = OnceLock::new();

/// Subscribers only receive: the first `a=sendrecv`/`a=sendonly` becomes `a=recvonly`
pub fn recvonly_answer(sdp: &str) -> String {
    let direction = SDP_DIRECTION.get_or_init(|| Regex::new(r"a=(sendrecv|sendonly)").expect("Invalid SDP direction regex"));
    direction.replace(sdp, "a=recvonly").into_owned()
}

/// A VideoRoom plugin handle
#[derive(Debug, Clone)]
pub struct VideoRoomHandle {
    handle: PluginHandle,
    role: Arc<Mutex<VideoRoomRole>>,
}

impl VideoRoomHandle {
    pub fn new(handle: PluginHandle, role: VideoRoomRole) -> Self {
        Self {
            handle,
            role: Arc::new(Mutex::new(role)),
        }
    }

    pub fn id(&self) -> &JanusId {
        self.handle.id()
    }

    pub fn handle(&self) -> &PluginHandle {
        &self.handle
    }

    pub async fn role(&self) -> VideoRoomRole {
        self.role.lock().await.clone()
    }

    async fn send(&self, request: &str, options: Value, ack: bool) -> Result<PluginResponse, JanusError> {
        let body = JsonUtils::merge(json!({ "request": request }), options);
        let options = if ack {
            RequestOptions::ack()
        } else {
            RequestOptions::default()
        };
        self.handle.request_message(body, options).await
    }

    pub async fn create(&self, options: Value) -> Result<RoomCreated, JanusError> {
        let response = self.send("create", options, false).await?;
        Ok(RoomCreated {
            room: response.data_field("room").and_then(JanusId::from_value),
            response,
        })
    }

    pub async fn destroy(&self, room: &JanusId, options: Value) -> Result<PluginResponse, JanusError> {
        let options = JsonUtils::merge(json!({ "room": room }), options);
        self.send("destroy", options, false).await
    }

    pub async fn exists(&self, room: &JanusId) -> Result<bool, JanusError> {
        let response = self.send("exists", json!({ "room": room }), false).await?;
        Ok(JsonUtils::is_truthy(response.data_field("exists")))
    }

    pub async fn list(&self) -> Result<Vec<Value>, JanusError> {
        let response = self.send("list", Value::Null, false).await?;
        Ok(array_field(&response, "rooms"))
    }

    pub async fn list_participants(&self, room: &JanusId) -> Result<Vec<Value>, JanusError> {
        let response = self.send("listparticipants", json!({ "room": room }), false).await?;
        Ok(array_field(&response, "participants"))
    }

    pub async fn join(&self, options: Value) -> Result<Joined, JanusError> {
        let response = self.send("join", options, true).await?;
        Ok(Joined::from_response(response))
    }

    pub async fn join_publisher(&self, options: Value) -> Result<Joined, JanusError> {
        self.join(JsonUtils::merge(json!({ "ptype": "publisher" }), options))
            .await
    }

    pub async fn join_subscriber(&self, options: Value) -> Result<Joined, JanusError> {
        self.join(JsonUtils::merge(json!({ "ptype": "subscriber" }), options))
            .await
    }

    /// `audio` and `video` default to true unless given
    pub async fn configure(&self, options: Value) -> Result<PluginResponse, JanusError> {
        let options = JsonUtils::merge(json!({ "audio": true, "video": true }), options);
        self.send("configure", options, true).await
    }

    pub async fn join_and_configure(&self, options: Value) -> Result<Joined, JanusError> {
        let options = JsonUtils::merge(json!({ "ptype": "publisher" }), options);
        let response = self.send("joinandconfigure", options, true).await?;
        Ok(Joined::from_response(response))
    }

    pub async fn publish(&self, options: Value) -> Result<PluginResponse, JanusError> {
        self.send("publish", options, true).await
    }

    pub async fn unpublish(&self) -> Result<PluginResponse, JanusError> {
        self.send("unpublish", Value::Null, true).await
    }

    pub async fn start(&self, options: Value) -> Result<PluginResponse, JanusError> {
        self.send("start", options, true).await
    }

    pub async fn pause(&self) -> Result<PluginResponse, JanusError> {
        self.send("pause", Value::Null, true).await
    }

    pub async fn switch(&self, options: Value) -> Result<PluginResponse, JanusError> {
        self.send("switch", options, true).await
    }

    pub async fn stop(&self) -> Result<PluginResponse, JanusError> {
        self.send("stop", Value::Null, true).await
    }

    pub async fn add(&self, options: Value) -> Result<PluginResponse, JanusError> {
        self.send("add", options, true).await
    }

    pub async fn remove(&self, options: Value) -> Result<PluginResponse, JanusError> {
        self.send("remove", options, true).await
    }

    pub async fn leave(&self) -> Result<PluginResponse, JanusError> {
        self.send("leave", Value::Null, true).await
    }

    pub async fn publish_feed(&self, options: Value) -> Result<Joined, JanusError> {
        self.join_and_configure(options).await
    }

    pub async fn subscribe_feed(&self, options: Value) -> Result<Joined, JanusError> {
        self.join_subscriber(options).await
    }

    /// Publisher: send the local offer and keep the returned answer SDP
    pub async fn create_answer(&self, offer: &str) -> Result<String, JanusError> {
        let room = match &*self.role.lock().await {
            VideoRoomRole::Publisher { room, .. } => room.clone(),
            other => return Err(wrong_role("create_answer", other)),
        };
        let joined = self
            .publish_feed(json!({ "room": room, "jsep": { "type": "offer", "sdp": offer } }))
            .await?;
        let answer = joined.sdp()?;

        if let VideoRoomRole::Publisher {
            publisher_id,
            answer: stored,
            ..
        } = &mut *self.role.lock().await
        {
            *publisher_id = joined.id.clone();
            *stored = Some(answer.clone());
        }
        Ok(answer)
    }

    /// Subscriber: join the feed and keep the offer SDP the server made
    pub async fn create_offer(&self) -> Result<String, JanusError> {
        let (room, feed) = match &*self.role.lock().await {
            VideoRoomRole::Subscriber { room, feed, .. } => (room.clone(), feed.clone()),
            other => return Err(wrong_role("create_offer", other)),
        };
        let joined = self.subscribe_feed(json!({ "room": room, "feed": feed })).await?;
        let offer = joined.sdp()?;

        if let VideoRoomRole::Subscriber { offer: stored, .. } = &mut *self.role.lock().await {
            *stored = Some(offer.clone());
        }
        Ok(offer)
    }

    /// Subscriber: start receiving with the local answer forced to recvonly
    pub async fn set_remote_answer(&self, answer: &str) -> Result<PluginResponse, JanusError> {
        let (room, feed) = match &*self.role.lock().await {
            VideoRoomRole::Subscriber { room, feed, .. } => (room.clone(), feed.clone()),
            other => return Err(wrong_role("set_remote_answer", other)),
        };
        let answer = recvonly_answer(answer);
        self.start(json!({
            "room": room,
            "feed": feed,
            "jsep": { "type": "answer", "sdp": answer },
        }))
        .await
    }
}

fn wrong_role(operation: &str, role: &VideoRoomRole) -> JanusError {
    JanusError::InvalidOperation(format!("{} is not available on a {:?} handle", operation, role))
}

/// VideoRoom bound to one session
#[derive(Debug, Clone)]
pub struct VideoRoomPlugin {
    plugin: Plugin,
    default_handle: Arc<OnceCell<VideoRoomHandle>>,
}

impl VideoRoomPlugin {
    pub(crate) fn new(plugin: Plugin, default_handle: Arc<OnceCell<VideoRoomHandle>>) -> Self {
        Self { plugin, default_handle }
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    /// The session's shared generic handle, attached on first use
    pub async fn default_handle(&self) -> Result<VideoRoomHandle, JanusError> {
        self.default_handle
            .get_or_try_init(|| self.create_handle())
            .await
            .cloned()
    }

    pub async fn create_handle(&self) -> Result<VideoRoomHandle, JanusError> {
        self.attach(VideoRoomRole::Generic).await
    }

    pub async fn create_publisher_handle(&self, room: JanusId) -> Result<VideoRoomHandle, JanusError> {
        self.attach(VideoRoomRole::Publisher {
            room,
            publisher_id: None,
            answer: None,
        })
        .await
    }

    pub async fn create_subscriber_handle(&self, room: JanusId, feed: JanusId) -> Result<VideoRoomHandle, JanusError> {
        self.attach(VideoRoomRole::Subscriber { room, feed, offer: None })
            .await
    }

    async fn attach(&self, role: VideoRoomRole) -> Result<VideoRoomHandle, JanusError> {
        let handle = self.plugin.attach().await?;
        Ok(VideoRoomHandle::new(handle, role))
    }

    /// New publisher handle whose answer SDP is ready
    pub async fn publish_feed(&self, room: JanusId, offer: &str) -> Result<VideoRoomHandle, JanusError> {
        let handle = self.create_publisher_handle(room).await?;
        handle.create_answer(offer).await?;
        Ok(handle)
    }

    /// New subscriber handle whose offer SDP is ready
    pub async fn subscribe_feed(&self, room: JanusId, feed: JanusId) -> Result<VideoRoomHandle, JanusError> {
        let handle = self.create_subscriber_handle(room, feed).await?;
        handle.create_offer().await?;
        Ok(handle)
    }

    /// Ids of the participants currently publishing in `room`
    pub async fn get_feeds(&self, room: &JanusId) -> Result<Vec<JanusId>, JanusError> {
        let participants = self.default_handle().await?.list_participants(room).await?;
        Ok(participants
            .iter()
            .filter(|participant| JsonUtils::is_truthy(participant.get("publisher")))
            .filter_map(|participant| participant.get("id").and_then(JanusId::from_value))
            .collect())
    }

    pub async fn get_feeds_exclude(&self, room: &JanusId, feed: &JanusId) -> Result<Vec<JanusId>, JanusError> {
        let mut feeds = self.get_feeds(room).await?;
        feeds.retain(|id| id != feed);
        Ok(feeds)
    }
}
