//! Crate-wide error type.
//!
//! # Why
//! Every layer — buffer pool, pipeline, executor, transport — needs to hand a caller a stable,
//! machine-greppable reason alongside a human message, without forcing one giant enum that grows
//! a variant per failure site. `CoreError` borrows the shape used throughout this codebase's
//! lineage: a `&'static str` code plus builder-style context accumulation.
//!
//! # How
//! Construction starts from [`CoreError::new`]; callers chain `with_cause`/`with_channel_id` to
//! attach context as the error crosses module boundaries. The code is the only part meant to be
//! matched on; the message and cause exist for logs and `Display`.
use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

#[cfg(feature = "std")]
type CauseBox = Box<dyn std::error::Error + Send + Sync + 'static>;
#[cfg(not(feature = "std"))]
type CauseBox = Box<dyn core::fmt::Debug + Send + Sync + 'static>;

/// The crate's single error type.
///
/// `code` is namespaced `domain.reason` (see [`codes`]) and is the part stable across releases;
/// `message` is free text for logs; `cause` and `channel_id` are optional context accumulated as
/// the error propagates.
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: String,
    cause: Option<CauseBox>,
    channel_id: Option<String>,
}

impl CoreError {
    /// Builds a new error with a stable code and a human message.
    ///
    /// `code` should be one of the [`codes`] constants or follow the same `domain.reason` shape.
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            channel_id: None,
        }
    }

    /// Stable, machine-matchable error code.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attaches an underlying cause, forming an error chain.
    #[cfg(feature = "std")]
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attaches the identity of the channel the error originated on.
    pub fn with_channel_id(mut self, id: impl Into<String>) -> Self {
        self.channel_id = Some(id.into());
        self
    }

    /// The channel identity attached to this error, if any.
    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience alias used throughout the crate's public API.
pub type Result<T> = core::result::Result<T, CoreError>;

/// Stable error-code constants, one per taxonomy member named by the component design.
pub mod codes {
    // buffer
    pub const BUFFER_RELEASED: &str = "buffer.released";
    pub const BUFFER_INDEX_OUT_OF_BOUNDS: &str = "buffer.index_out_of_bounds";
    pub const BUFFER_CAPACITY_EXCEEDED: &str = "buffer.capacity_exceeded";

    // pipeline
    pub const PIPELINE_DUPLICATE_HANDLER: &str = "pipeline.duplicate_handler";
    pub const PIPELINE_HANDLER_NOT_FOUND: &str = "pipeline.handler_not_found";

    // channel
    pub const CHANNEL_ALREADY_BOUND: &str = "channel.already_bound";
    pub const CHANNEL_NOT_REGISTERED: &str = "channel.not_registered";
    pub const CHANNEL_CLOSED: &str = "channel.closed";
    pub const CHANNEL_CONNECT_TIMEOUT: &str = "channel.connect_timeout";
    pub const CHANNEL_CONNECT_REFUSED: &str = "channel.connect_refused";
    pub const CHANNEL_WRITE_REJECTED: &str = "channel.write_rejected";
    pub const CHANNEL_UNKNOWN_OPTION: &str = "channel.unknown_option";

    // codec
    pub const CODEC_DECODER_EXCEPTION: &str = "codec.decoder_exception";
    pub const CODEC_ENCODER_EXCEPTION: &str = "codec.encoder_exception";

    // executor
    pub const EXECUTOR_REJECTED: &str = "executor.rejected";

    // transport
    pub const TRANSPORT_IO: &str = "transport.io";
    pub const TRANSPORT_BIND_FAILED: &str = "transport.bind_failed";
    pub const TRANSPORT_ADDRESS_IN_USE: &str = "transport.address_in_use";

    // bootstrap
    pub const BOOTSTRAP_INCOMPLETE: &str = "bootstrap.incomplete";
}
