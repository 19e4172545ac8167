//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid network: {0:?} (expected udp, udp4 or udp6)")]
    InvalidNetwork(String),

    #[error("address resolution failed: {0}")]
    AddressResolution(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Core(#[from] oscar_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
