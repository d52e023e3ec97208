pub mod janus_error;

pub use janus_error::JanusError;

pub type Result<T> = std::result::Result<T, JanusError>;
