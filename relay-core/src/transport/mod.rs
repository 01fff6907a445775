//! Address types and the channel-option set shared by every transport (TCP, local, and any
//! future UDP implementation).
mod options;

pub use options::{ChannelOptionKey, ChannelOptions};

use alloc::string::String;

/// An address a channel can be bound to or connected toward.
///
/// A flat enum rather than trait-object transport addresses: the set of address shapes this
/// crate needs to reason about (socket addresses, local in-VM names) is small and closed, and a
/// enum keeps equality/hashing/Display trivial compared to boxing a `dyn` address per transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportSocketAddr {
    /// A standard IPv4/IPv6 socket address, textually `host:port`.
    Socket(String),
    /// A local (in-VM) transport address — see `relay-transport-local`.
    Local(String),
    /// Reserved sentinel meaning "mint me a fresh, unused address" — the local-transport
    /// equivalent of binding TCP to port 0. Only meaningful as an argument to a bind call; no
    /// channel's `local_addr()` ever reports `Any` back.
    Any,
}

impl core::fmt::Display for TransportSocketAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportSocketAddr::Socket(addr) => write!(f, "{addr}"),
            TransportSocketAddr::Local(name) => write!(f, "local:{name}"),
            TransportSocketAddr::Any => write!(f, "any"),
        }
    }
}

// Bare strings are the common case for TCP (`"127.0.0.1:0"`), so `bind`/`connect` accept one
// directly as a `Socket` address. Local transport addresses have no natural string shape to infer
// from a bare `&str`/`String` and are constructed explicitly as `TransportSocketAddr::Local`.
impl From<&str> for TransportSocketAddr {
    fn from(addr: &str) -> Self {
        TransportSocketAddr::Socket(String::from(addr))
    }
}

impl From<String> for TransportSocketAddr {
    fn from(addr: String) -> Self {
        TransportSocketAddr::Socket(addr)
    }
}
