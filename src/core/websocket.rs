use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use crate::core::transport::{Connector, TransportCommand, TransportEvent, TransportLink};
use crate::error::JanusError;

/// WebSocket transport speaking the Janus subprotocol
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(&self, url: &str, protocol: &str) -> TransportLink {
        let (link, commands, events) = TransportLink::pair();
        tokio::spawn(run_websocket(url.to_string(), protocol.to_string(), commands, events));
        link
    }
}

async fn run_websocket(
    url: String,
    protocol: String,
    mut commands: mpsc::UnboundedReceiver<TransportCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let ws = match handshake(&url, &protocol).await {
        Ok(ws) => ws,
        Err(e) => {
            log::error!("WebSocket connect to {} failed: {}", url, e);
            let _ = events.send(TransportEvent::Error(e.to_string()));
            let _ = events.send(TransportEvent::Closed);
            return;
        }
    };
    log::debug!("WebSocket open url={}", url);
    let _ = events.send(TransportEvent::Open);

    let (mut ws_tx, mut ws_rx) = ws.split();
    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(TransportCommand::Send(text)) => {
                        if let Err(e) = ws_tx.send(Message::Text(text)).await {
                            let _ = events.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                    }
                    Some(TransportCommand::Close) | None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            message = ws_rx.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send(TransportEvent::Message(text));
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            let _ = events.send(TransportEvent::Message(text));
                        }
                        Err(e) => {
                            let _ = events.send(TransportEvent::Error(format!("non UTF-8 binary frame: {}", e)));
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
    }
    log::debug!("WebSocket closed url={}", url);
    let _ = events.send(TransportEvent::Closed);
}

async fn handshake(
    url: &str,
    protocol: &str,
) -> Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    JanusError,
> {
    let mut request = url.into_client_request()?;
    let header = HeaderValue::from_str(protocol)
        .map_err(|e| JanusError::Configuration(format!("invalid subprotocol '{}': {}", protocol, e)))?;
    request.headers_mut().insert("Sec-WebSocket-Protocol", header);
    let (ws, _) = connect_async(request).await?;
    Ok(ws)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_server_reports_closed() {
        let connector = WebSocketConnector::new();
        let mut link = connector.open("ws://127.0.0.1:1", "janus-protocol");

        let mut saw_error = false;
        loop {
            match link.inbound.recv().await {
                Some(TransportEvent::Error(_)) => saw_error = true,
                Some(TransportEvent::Closed) | None => break,
                Some(other) => panic!("Unexpected event {:?}", other),
            }
        }
        assert!(saw_error);
    }
}
