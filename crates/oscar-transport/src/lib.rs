//! Oscar Transport Layer
//!
//! This crate turns a UDP socket into an OSC endpoint:
//! - [`UdpConnection::listen`] binds for receiving
//! - [`UdpConnection::dial`] associates with a fixed remote for sending
//! - [`UdpConnection::serve`] reads, decodes and dispatches until closed

pub mod error;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use traits::DatagramSocket;
pub use udp::{Network, UdpConfig, UdpConnection};
