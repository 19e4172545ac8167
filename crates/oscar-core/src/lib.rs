//! Oscar Core
//!
//! Core types, encoding, and routing primitives for Open Sound Control.
//!
//! This crate provides:
//! - Argument values and their type tags ([`Argument`])
//! - Message and bundle encoding/decoding ([`Packet`], [`codec`])
//! - Address validation and pattern matching ([`Pattern`])
//! - Method tables and dispatch ([`Methods`], [`Dispatcher`])
//! - Time tags ([`TimeTag`])

pub mod address;
pub mod argument;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod time;
pub mod types;

pub use address::{validate_address, Pattern};
pub use argument::{decode_argument, encode_argument, Argument, Color, MidiMessage};
pub use codec::{decode, encode, Encodable};
pub use dispatch::{Dispatcher, Method, MethodResult, Methods};
pub use error::{Error, Result};
pub use time::TimeTag;
pub use types::{Bundle, Message, Packet};

/// First character of every typetag string
pub const TYPETAG_PREFIX: char = ',';

/// Marker that opens every bundle
pub const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// Conventional OSC port
pub const DEFAULT_PORT: u16 = 57120;
