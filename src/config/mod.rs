pub mod client_config;

pub use client_config::JanusClientConfig;
