//! In-process transport: channels pair up inside the same program instead of going over a real
//! socket, so integration tests and in-VM pipelines (actor-style services, embedded brokers) can
//! exercise the same [`relay_core::bootstrap::Bootstrap`]/[`relay_core::bootstrap::ServerBootstrap`]
//! surface a real transport would use, without touching the network stack.
//!
//! Addresses are process-wide names (`relay_core::transport::TransportSocketAddr::Local`)
//! resolved through [`registry`]; `LocalAcceptor::bind` registers a name, `LocalConnector::connect`
//! looks it up and constructs both ends of the pair.
mod channel;
mod connector;
mod registry;

pub use channel::{LocalChannel, LocalListener};
pub use connector::{LocalAcceptor, LocalConnector};
