//! HTTP relay forwarder
//!
//! Connects to a relay, opens a tunnel for one local port and serves the requests
//! the relay forwards by re-issuing them against the local service.

pub mod config;
pub mod connection;
pub mod forward;

pub use config::{Args, Config, ReconnectConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use forward::LocalForwarder;
