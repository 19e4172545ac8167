//! Error types for Oscar

use thiserror::Error;

/// Result type alias for Oscar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Oscar error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Address or address pattern syntax violation
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Structural decode failure
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Unrecognized argument type tag
    #[error("invalid type tag: {0:?}")]
    InvalidTypeTag(char),

    /// Serve invoked without a method table
    #[error("nil dispatcher")]
    NilDispatcher,

    /// Serve invoked with a method table that registers nothing
    #[error("empty dispatcher")]
    EmptyDispatcher,

    /// Value that cannot be represented on the wire
    #[error("encode error: {0}")]
    EncodeError(String),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedPacket(msg.into())
    }

    /// Shorthand for a buffer underflow while decoding
    pub(crate) fn short(what: &str, needed: usize, have: usize) -> Self {
        Error::MalformedPacket(format!("{what}: need {needed} bytes, have {have}"))
    }
}
