use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::JanusError;
use crate::utils::JsonUtils;

/// Server-assigned identifier of a session or plugin handle.
///
/// Janus normally hands out 64-bit integers, but some deployments (and
/// test doubles) use strings; the id is echoed back in its original form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JanusId {
    Number(u64),
    Text(String),
}

impl JanusId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(JanusId::Number),
            Value::String(s) if !s.is_empty() => Some(JanusId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            JanusId::Number(n) => Value::from(*n),
            JanusId::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for JanusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JanusId::Number(n) => write!(f, "{}", n),
            JanusId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for JanusId {
    fn from(id: u64) -> Self {
        JanusId::Number(id)
    }
}

impl From<&str> for JanusId {
    fn from(id: &str) -> Self {
        JanusId::Text(id.to_string())
    }
}

impl From<String> for JanusId {
    fn from(id: String) -> Self {
        JanusId::Text(id)
    }
}

/// Outbound request object: `{ janus: <verb>, transaction, session_id?, handle_id?, ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JanusRequest(Map<String, Value>);

impl JanusRequest {
    /// Create a request for the given verb (`create`, `attach`, `message`, ...)
    pub fn new(verb: &str) -> Self {
        let mut map = Map::new();
        map.insert("janus".to_string(), Value::String(verb.to_string()));
        Self(map)
    }

    /// Builder-style field setter
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn verb(&self) -> Option<&str> {
        self.0.get("janus").and_then(Value::as_str)
    }

    pub fn transaction(&self) -> Option<&str> {
        self.0.get("transaction").and_then(Value::as_str)
    }

    /// Accepts any JSON object; anything else is not a request
    pub fn from_value(value: Value) -> Result<Self, JanusError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(JanusError::Serialization(format!(
                "request must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn to_json(&self) -> Result<String, JanusError> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

/// A final or interim frame correlated to the request that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
    request: JanusRequest,
    response: Value,
    acknowledged: bool,
}

impl ClientResponse {
    pub fn new(request: JanusRequest, response: Value) -> Self {
        Self {
            request,
            response,
            acknowledged: false,
        }
    }

    pub(crate) fn with_acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = acknowledged;
        self
    }

    pub fn request(&self) -> &JanusRequest {
        &self.request
    }

    pub fn response(&self) -> &Value {
        &self.response
    }

    pub fn into_response(self) -> Value {
        self.response
    }

    /// Value of the `janus` field
    pub fn response_type(&self) -> Option<&str> {
        self.response.get("janus").and_then(Value::as_str)
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        JsonUtils::get_path(&self.response, path)
    }

    pub fn jsep(&self) -> Option<&Value> {
        self.get("jsep")
    }

    pub fn is_error(&self) -> bool {
        self.response_type() == Some("error")
    }

    pub fn is_ack(&self) -> bool {
        self.response_type() == Some("ack")
    }

    pub fn is_success(&self) -> bool {
        self.response_type() == Some("success")
    }

    /// Whether an interim ack had already arrived when this response was delivered
    pub fn acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn error_code(&self) -> Option<i64> {
        self.get("error.code").and_then(Value::as_i64)
    }

    pub fn error_reason(&self) -> Option<&str> {
        self.get("error.reason").and_then(Value::as_str)
    }

    /// `data.id` of a `create`/`attach` reply
    pub fn data_id(&self) -> Option<JanusId> {
        self.get("data.id").and_then(JanusId::from_value)
    }
}

/// Plugin-scoped view of a response: `plugindata: { plugin, data }`
#[derive(Debug, Clone, PartialEq)]
pub struct PluginResponse {
    inner: ClientResponse,
}

impl PluginResponse {
    pub fn new(inner: ClientResponse) -> Self {
        Self { inner }
    }

    /// Plugin errors travel inside the envelope, independent of the `janus` field
    pub fn is_error(&self) -> bool {
        self.inner.get("plugindata.data.error_code").is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.get("plugindata.plugin").and_then(Value::as_str)
    }

    pub fn data(&self) -> Option<&Value> {
        self.inner.get("plugindata.data")
    }

    pub fn data_field(&self, field: &str) -> Option<&Value> {
        self.data().and_then(|data| JsonUtils::get_path(data, field))
    }

    pub fn error_code(&self) -> Option<i64> {
        self.inner.get("plugindata.data.error_code").and_then(Value::as_i64)
    }

    pub fn error(&self) -> Option<&str> {
        self.inner.get("plugindata.data.error").and_then(Value::as_str)
    }

    pub fn jsep(&self) -> Option<&Value> {
        self.inner.jsep()
    }

    pub fn client_response(&self) -> &ClientResponse {
        &self.inner
    }

    pub fn into_client_response(self) -> ClientResponse {
        self.inner
    }
}

/// Asynchronous event names Janus pushes without a transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JanusEventKind {
    WebrtcUp,
    Media,
    Hangup,
    SlowLink,
    Detached,
    Timeout,
    Other(String),
}

impl JanusEventKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "webrtcup" => JanusEventKind::WebrtcUp,
            "media" => JanusEventKind::Media,
            "hangup" => JanusEventKind::Hangup,
            "slowlink" => JanusEventKind::SlowLink,
            "detached" => JanusEventKind::Detached,
            "timeout" => JanusEventKind::Timeout,
            other => JanusEventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JanusEventKind::WebrtcUp => "webrtcup",
            JanusEventKind::Media => "media",
            JanusEventKind::Hangup => "hangup",
            JanusEventKind::SlowLink => "slowlink",
            JanusEventKind::Detached => "detached",
            JanusEventKind::Timeout => "timeout",
            JanusEventKind::Other(name) => name,
        }
    }
}

/// A parsed inbound frame with its routing keys pulled out
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub janus: String,
    pub transaction: Option<String>,
    pub session_id: Option<JanusId>,
    pub sender: Option<JanusId>,
    pub body: Value,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, JanusError> {
        let body: Value =
            serde_json::from_str(text).map_err(|e| JanusError::MalformedFrame(e.to_string()))?;
        Self::from_value(body)
    }

    pub fn from_value(body: Value) -> Result<Self, JanusError> {
        if !body.is_object() {
            return Err(JanusError::MalformedFrame(format!(
                "expected a JSON object, got {}",
                body
            )));
        }
        let janus = body
            .get("janus")
            .and_then(Value::as_str)
            .ok_or_else(|| JanusError::MalformedFrame("missing 'janus' field".to_string()))?
            .to_string();
        let transaction = match body.get("transaction") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        let session_id = body.get("session_id").and_then(JanusId::from_value);
        let sender = body.get("sender").and_then(JanusId::from_value);

        Ok(Self {
            janus,
            transaction,
            session_id,
            sender,
            body,
        })
    }

    pub fn event_kind(&self) -> JanusEventKind {
        JanusEventKind::parse(&self.janus)
    }
}
