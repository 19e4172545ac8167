//! OSC 1.0 packet codec
//!
//! Message layout:
//! ```text
//! <address>\0[pad]  ,<typetags>\0[pad]  <argument payloads...>
//! ```
//!
//! Bundle layout:
//! ```text
//! #bundle\0  <timetag: u64>  ( <size: u32> <packet bytes> )*
//! ```
//!
//! Every section is a multiple of 4 bytes, so every encoded packet is too.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::address::validate_address;
use crate::argument::{decode_argument, read_string, write_argument, write_string};
use crate::time::TimeTag;
use crate::types::{Bundle, Message, Packet};
use crate::{Error, Result, BUNDLE_TAG, TYPETAG_PREFIX};

/// Anything that can be serialized into one datagram
pub trait Encodable {
    fn to_bytes(&self) -> Result<Bytes>;
}

impl Encodable for Message {
    fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(estimate_message_size(self));
        encode_message_to_buf(&mut buf, self)?;
        Ok(buf.freeze())
    }
}

impl Encodable for Bundle {
    fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(16 + self.packets.len() * 32);
        encode_bundle_to_buf(&mut buf, self)?;
        Ok(buf.freeze())
    }
}

impl Encodable for Packet {
    fn to_bytes(&self) -> Result<Bytes> {
        encode(self)
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Encode a packet to its wire form
pub fn encode(packet: &Packet) -> Result<Bytes> {
    match packet {
        Packet::Message(m) => m.to_bytes(),
        Packet::Bundle(b) => b.to_bytes(),
    }
}

/// Decode one datagram into a packet
pub fn decode(bytes: &[u8]) -> Result<Packet> {
    if bytes.is_empty() {
        return Err(Error::malformed("empty packet"));
    }
    if bytes.starts_with(BUNDLE_TAG) {
        decode_bundle(bytes).map(Packet::Bundle)
    } else {
        decode_message(bytes).map(Packet::Message)
    }
}

/// Decode a single message (not a bundle)
pub fn decode_message(bytes: &[u8]) -> Result<Message> {
    if bytes.len() % 4 != 0 {
        return Err(Error::malformed(format!(
            "message size {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let mut buf = bytes;

    let address = read_string(&mut buf)?;
    validate_address(&address).map_err(|e| Error::malformed(e.to_string()))?;

    // Some older senders omit the typetag string entirely.
    if !buf.has_remaining() {
        return Ok(Message::new(address));
    }

    let typetags = read_string(&mut buf)?;
    let tags = typetags.strip_prefix(TYPETAG_PREFIX).ok_or_else(|| {
        Error::malformed(format!("typetag string {typetags:?} does not start with ','"))
    })?;

    let mut arguments = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        arguments.push(decode_argument(tag, &mut buf)?);
    }

    if buf.has_remaining() {
        return Err(Error::malformed(format!(
            "{} trailing bytes after arguments {typetags:?}",
            buf.remaining()
        )));
    }

    Ok(Message { address, arguments })
}

/// Decode a bundle and every bundle nested inside it
///
/// Nesting is walked with an explicit stack of open bundles, so the depth
/// of a datagram never grows the call stack.
pub fn decode_bundle(bytes: &[u8]) -> Result<Bundle> {
    let mut open: Vec<OpenBundle<'_>> = Vec::new();
    let mut current = OpenBundle::parse(bytes)?;

    loop {
        if current.rest.has_remaining() {
            let element = current.next_element()?;
            if element.is_empty() {
                return Err(Error::malformed("empty bundle element"));
            }
            if element.starts_with(BUNDLE_TAG) {
                let child = OpenBundle::parse(element)?;
                open.push(std::mem::replace(&mut current, child));
            } else {
                current.packets.push(Packet::Message(decode_message(element)?));
            }
            continue;
        }

        let finished = Bundle {
            timetag: current.timetag,
            packets: std::mem::take(&mut current.packets),
        };
        match open.pop() {
            Some(parent) => {
                current = parent;
                current.packets.push(Packet::Bundle(finished));
            }
            None => return Ok(finished),
        }
    }
}

/// A bundle whose elements are still being read
struct OpenBundle<'a> {
    timetag: TimeTag,
    packets: Vec<Packet>,
    rest: &'a [u8],
}

impl<'a> OpenBundle<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self> {
        let header = BUNDLE_TAG.len() + 8;
        if bytes.len() < header {
            return Err(Error::short("bundle header", header, bytes.len()));
        }
        if !bytes.starts_with(BUNDLE_TAG) {
            return Err(Error::malformed("missing #bundle marker"));
        }
        let mut rest = &bytes[BUNDLE_TAG.len()..];
        let timetag = TimeTag::from_bits(rest.get_u64());
        Ok(Self {
            timetag,
            packets: Vec::new(),
            rest,
        })
    }

    /// Split off the next size-prefixed element
    fn next_element(&mut self) -> Result<&'a [u8]> {
        if self.rest.remaining() < 4 {
            return Err(Error::short("bundle element size", 4, self.rest.remaining()));
        }
        let size = self.rest.get_u32() as usize;
        if size % 4 != 0 {
            return Err(Error::malformed(format!(
                "bundle element size {size} is not a multiple of 4"
            )));
        }
        if self.rest.remaining() < size {
            return Err(Error::short("bundle element", size, self.rest.remaining()));
        }
        let rest: &'a [u8] = self.rest;
        let (element, tail) = rest.split_at(size);
        self.rest = tail;
        Ok(element)
    }
}

// ============================================================================
// ENCODING
// ============================================================================

fn estimate_message_size(msg: &Message) -> usize {
    let strings = msg.address.len() + msg.arguments.len() + 8;
    strings + msg.arguments.len() * 8
}

fn encode_message_to_buf(buf: &mut BytesMut, msg: &Message) -> Result<()> {
    write_string(buf, &msg.address)?;
    write_string(buf, &msg.typetags())?;
    for arg in &msg.arguments {
        write_argument(buf, arg)?;
    }
    debug_assert_eq!(buf.len() % 4, 0);
    Ok(())
}

fn encode_bundle_to_buf(buf: &mut BytesMut, bundle: &Bundle) -> Result<()> {
    put_bundle_header(buf, bundle);

    // Each open bundle keeps its remaining children and the offset of its
    // size prefix, which is filled in once its last child is written.
    let mut open: Vec<(std::slice::Iter<'_, Packet>, Option<usize>)> =
        vec![(bundle.packets.iter(), None)];
    loop {
        let Some((children, size_at)) = open.last_mut() else {
            return Ok(());
        };
        let size_at = *size_at;
        match children.next() {
            Some(Packet::Message(msg)) => {
                let at = reserve_size(buf);
                encode_message_to_buf(buf, msg)?;
                patch_size(buf, at)?;
            }
            Some(Packet::Bundle(nested)) => {
                let at = reserve_size(buf);
                put_bundle_header(buf, nested);
                open.push((nested.packets.iter(), Some(at)));
            }
            None => {
                if let Some(at) = size_at {
                    patch_size(buf, at)?;
                }
                open.pop();
            }
        }
    }
}

fn put_bundle_header(buf: &mut BytesMut, bundle: &Bundle) {
    buf.put_slice(BUNDLE_TAG);
    buf.put_u64(bundle.timetag.to_bits());
}

fn reserve_size(buf: &mut BytesMut) -> usize {
    let at = buf.len();
    buf.put_u32(0);
    at
}

fn patch_size(buf: &mut BytesMut, at: usize) -> Result<()> {
    let len = buf.len() - at - 4;
    let size = u32::try_from(len)
        .map_err(|_| Error::EncodeError(format!("bundle element too large: {len}")))?;
    buf[at..at + 4].copy_from_slice(&size.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Argument;

    #[test]
    fn test_encode_empty_message() {
        let bytes = Message::new("/close").to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), b"/close\0\0,\0\0\0");
    }

    #[test]
    fn test_decode_address_only() {
        let msg = decode_message(b"/ping\0\0\0").unwrap();
        assert_eq!(msg, Message::new("/ping"));
    }

    #[test]
    fn test_decode_missing_typetag_prefix() {
        let err = decode_message(b"/foo\0\0\0\0ii\0\0").unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let err = decode_message(b"/foo\0\0\0\0,\0\0\0\0\0\0\x01").unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
    }

    #[test]
    fn test_decode_unaligned() {
        let err = decode(b"/foo\0").unwrap_err();
        assert!(matches!(err, Error::MalformedPacket(_)));
    }

    #[test]
    fn test_bundle_layout() {
        let bundle = Bundle::new(TimeTag::new(1, 2)).with_packet(Message::new("/a").with_arg(1i32));
        let bytes = bundle.to_bytes().unwrap();

        assert_eq!(&bytes[..8], b"#bundle\0");
        assert_eq!(&bytes[8..16], &[0, 0, 0, 1, 0, 0, 0, 2]);
        assert_eq!(&bytes[16..20], &[0, 0, 0, 12]);
        assert_eq!(&bytes[20..], b"/a\0\0,i\0\0\0\0\0\x01");
    }

    #[test]
    fn test_bundle_element_overrun() {
        let mut bytes = BytesMut::new();
        bytes.put_slice(BUNDLE_TAG);
        bytes.put_u64(1);
        bytes.put_u32(64);
        bytes.put_slice(b"/a\0\0,\0\0\0");
        assert!(matches!(decode(&bytes), Err(Error::MalformedPacket(_))));
    }

    #[test]
    fn test_arguments_roundtrip() {
        let msg = Message::new("/mix/1")
            .with_arg(Argument::Int(-3))
            .with_arg(Argument::String("abc".into()))
            .with_arg(Argument::Nil);
        let decoded = decode(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, Packet::Message(msg));
    }
}
