use std::io;

use relay_core::error::{CoreError, codes};

/// Wraps the `io::Error`s this crate produces with the stable error codes the rest of the
/// framework already uses, layering `thiserror` variants over the codes the core error module
/// defines.
#[derive(Debug, thiserror::Error)]
pub enum TcpError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, #[source] source: io::Error },

    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, #[source] source: io::Error },

    #[error("socket io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid socket address '{0}'")]
    InvalidAddr(String),
}

impl From<TcpError> for CoreError {
    fn from(err: TcpError) -> Self {
        let code = match &err {
            TcpError::Bind { .. } => codes::TRANSPORT_BIND_FAILED,
            TcpError::Connect { source, .. } if source.kind() == io::ErrorKind::TimedOut => {
                codes::CHANNEL_CONNECT_TIMEOUT
            }
            TcpError::Connect { .. } => codes::CHANNEL_CONNECT_REFUSED,
            TcpError::Io(_) => codes::TRANSPORT_IO,
            TcpError::InvalidAddr(_) => codes::TRANSPORT_BIND_FAILED,
        };
        let message = err.to_string();
        CoreError::new(code, message).with_cause(err)
    }
}
