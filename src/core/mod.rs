pub mod transport;
pub mod websocket;

pub use transport::{Connector, FrameSink, TransportCommand, TransportEvent, TransportLink};
pub use websocket::WebSocketConnector;
