//! TCP transport: a single reactor thread polls every registered socket with `mio`, handing
//! readiness off to each channel's own [`relay_core::runtime::EventExecutor`] so pipelines never
//! run concurrently with themselves — the same invariant `relay-transport-local` upholds by
//! posting to the peer's executor instead of touching its pipeline directly.
mod channel;
mod error;
mod listener;
mod reactor;

pub use channel::TcpChannel;
pub use error::TcpError;
pub use listener::{TcpAcceptor, TcpConnector, TcpListenerChannel};
