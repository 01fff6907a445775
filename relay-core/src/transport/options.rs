//! Channel options: the recognized, typed configuration surface every transport validates writes
//! against before applying them to a socket or a local channel.
use alloc::string::String;
use core::time::Duration;

use crate::error::{CoreError, Result, codes};

/// One of the recognized channel option names. Unlike a loosely-typed `HashMap<String, Value>`,
/// this enum means `apply`-time rejection of an unknown option ([`codes::CHANNEL_UNKNOWN_OPTION`])
/// can only happen at the parsing boundary (e.g. deserializing a config snapshot), not deep in a
/// transport implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ChannelOptionKey {
    SoBacklog,
    SoBroadcast,
    SoReuseaddr,
    TcpNodelay,
    SoKeepalive,
    SoLinger,
    SoRcvbuf,
    SoSndbuf,
    ConnectTimeoutMillis,
    WriteBufferHighWaterMark,
    WriteBufferLowWaterMark,
    AutoRead,
    MaxMessagesPerRead,
}

impl ChannelOptionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelOptionKey::SoBacklog => "SO_BACKLOG",
            ChannelOptionKey::SoBroadcast => "SO_BROADCAST",
            ChannelOptionKey::SoReuseaddr => "SO_REUSEADDR",
            ChannelOptionKey::TcpNodelay => "TCP_NODELAY",
            ChannelOptionKey::SoKeepalive => "SO_KEEPALIVE",
            ChannelOptionKey::SoLinger => "SO_LINGER",
            ChannelOptionKey::SoRcvbuf => "SO_RCVBUF",
            ChannelOptionKey::SoSndbuf => "SO_SNDBUF",
            ChannelOptionKey::ConnectTimeoutMillis => "CONNECT_TIMEOUT_MILLIS",
            ChannelOptionKey::WriteBufferHighWaterMark => "WRITE_BUFFER_HIGH_WATER_MARK",
            ChannelOptionKey::WriteBufferLowWaterMark => "WRITE_BUFFER_LOW_WATER_MARK",
            ChannelOptionKey::AutoRead => "AUTO_READ",
            ChannelOptionKey::MaxMessagesPerRead => "MAX_MESSAGES_PER_READ",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "SO_BACKLOG" => ChannelOptionKey::SoBacklog,
            "SO_BROADCAST" => ChannelOptionKey::SoBroadcast,
            "SO_REUSEADDR" => ChannelOptionKey::SoReuseaddr,
            "TCP_NODELAY" => ChannelOptionKey::TcpNodelay,
            "SO_KEEPALIVE" => ChannelOptionKey::SoKeepalive,
            "SO_LINGER" => ChannelOptionKey::SoLinger,
            "SO_RCVBUF" => ChannelOptionKey::SoRcvbuf,
            "SO_SNDBUF" => ChannelOptionKey::SoSndbuf,
            "CONNECT_TIMEOUT_MILLIS" => ChannelOptionKey::ConnectTimeoutMillis,
            "WRITE_BUFFER_HIGH_WATER_MARK" => ChannelOptionKey::WriteBufferHighWaterMark,
            "WRITE_BUFFER_LOW_WATER_MARK" => ChannelOptionKey::WriteBufferLowWaterMark,
            "AUTO_READ" => ChannelOptionKey::AutoRead,
            "MAX_MESSAGES_PER_READ" => ChannelOptionKey::MaxMessagesPerRead,
            other => {
                return Err(CoreError::new(
                    codes::CHANNEL_UNKNOWN_OPTION,
                    alloc::format!("unrecognized channel option '{other}'"),
                ));
            }
        })
    }
}

/// A typed, chainable set of channel options, independent of any one transport's representation
/// of them (a TCP channel maps these onto `socket2::Socket` calls; a local channel mostly ignores
/// the socket-specific ones).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct ChannelOptions {
    pub so_backlog: Option<i32>,
    pub so_broadcast: Option<bool>,
    pub so_reuseaddr: Option<bool>,
    pub tcp_nodelay: Option<bool>,
    pub so_keepalive: Option<bool>,
    pub so_linger: Option<Duration>,
    pub so_rcvbuf: Option<usize>,
    pub so_sndbuf: Option<usize>,
    pub connect_timeout: Option<Duration>,
    pub write_buffer_high_water_mark: usize,
    pub write_buffer_low_water_mark: usize,
    /// Past this many queued outbound bytes, `write` stops accepting and returns
    /// `CHANNEL_WRITE_REJECTED` instead of queuing — a hard backstop below the high water mark's
    /// soft flow-control signal, for a caller that keeps writing despite `FlowControlApplied`.
    pub write_buffer_hard_limit: usize,
    pub auto_read: bool,
    pub max_messages_per_read: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            so_backlog: None,
            so_broadcast: None,
            so_reuseaddr: None,
            tcp_nodelay: None,
            so_keepalive: None,
            so_linger: None,
            so_rcvbuf: None,
            so_sndbuf: None,
            connect_timeout: None,
            // 64 KiB / 32 KiB mirrors the high/low defaults commonly used by Netty's
            // `WriteBufferWaterMark`.
            write_buffer_high_water_mark: 64 * 1024,
            write_buffer_low_water_mark: 32 * 1024,
            // 8x the high water mark: far enough past the soft signal that a caller has clearly
            // ignored `FlowControlApplied`, not just raced one more write before observing it.
            write_buffer_hard_limit: 8 * 64 * 1024,
            auto_read: true,
            max_messages_per_read: 16,
        }
    }
}

impl ChannelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tcp_nodelay(mut self, value: bool) -> Self {
        self.tcp_nodelay = Some(value);
        self
    }

    pub fn with_so_keepalive(mut self, value: bool) -> Self {
        self.so_keepalive = Some(value);
        self
    }

    pub fn with_connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = Some(value);
        self
    }

    pub fn with_water_marks(mut self, low: usize, high: usize) -> Result<Self> {
        if low >= high {
            return Err(CoreError::new(
                codes::CHANNEL_UNKNOWN_OPTION,
                "low water mark must be strictly below high water mark",
            ));
        }
        self.write_buffer_low_water_mark = low;
        self.write_buffer_high_water_mark = high;
        Ok(self)
    }

    pub fn with_auto_read(mut self, value: bool) -> Self {
        self.auto_read = value;
        self
    }

    pub fn with_write_buffer_hard_limit(mut self, value: usize) -> Self {
        self.write_buffer_hard_limit = value;
        self
    }
}

/// Parses a process-level default `ChannelOptions` from a TOML snapshot, for the seeding path
/// described by this crate's configuration story — a convenience loader, not a persistence layer.
#[cfg(feature = "std")]
pub fn from_toml_str(text: &str) -> Result<ChannelOptions> {
    toml::from_str(text)
        .map_err(|err| CoreError::new(codes::CHANNEL_UNKNOWN_OPTION, err.to_string()).with_cause(err))
}
