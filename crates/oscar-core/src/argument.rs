//! Argument values and their wire encoding
//!
//! Every argument is identified by a single type tag character. Numeric
//! payloads are fixed width and big-endian; strings and blobs are padded
//! with zeros to the next 4-byte boundary.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::time::TimeTag;
use crate::{Error, Result};

/// Type tag characters
pub mod tag {
    pub const INT: char = 'i';
    pub const FLOAT: char = 'f';
    pub const STRING: char = 's';
    pub const BLOB: char = 'b';
    pub const LONG: char = 'h';
    pub const DOUBLE: char = 'd';
    pub const TIME: char = 't';
    pub const SYMBOL: char = 'S';
    pub const CHAR: char = 'c';
    pub const COLOR: char = 'r';
    pub const MIDI: char = 'm';
    pub const TRUE: char = 'T';
    pub const FALSE: char = 'F';
    pub const NIL: char = 'N';
    pub const IMPULSE: char = 'I';
}

/// 32-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

/// 4-byte MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiMessage {
    pub port: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

/// A single OSC argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Int(i32),
    Float(f32),
    String(String),
    Blob(Vec<u8>),
    Long(i64),
    Double(f64),
    Time(TimeTag),
    Symbol(String),
    Char(char),
    Color(Color),
    Midi(MidiMessage),
    Bool(bool),
    Nil,
    Impulse,
}

impl Argument {
    /// The type tag character for this argument
    pub fn tag(&self) -> char {
        match self {
            Argument::Int(_) => tag::INT,
            Argument::Float(_) => tag::FLOAT,
            Argument::String(_) => tag::STRING,
            Argument::Blob(_) => tag::BLOB,
            Argument::Long(_) => tag::LONG,
            Argument::Double(_) => tag::DOUBLE,
            Argument::Time(_) => tag::TIME,
            Argument::Symbol(_) => tag::SYMBOL,
            Argument::Char(_) => tag::CHAR,
            Argument::Color(_) => tag::COLOR,
            Argument::Midi(_) => tag::MIDI,
            Argument::Bool(true) => tag::TRUE,
            Argument::Bool(false) => tag::FALSE,
            Argument::Nil => tag::NIL,
            Argument::Impulse => tag::IMPULSE,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Argument::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Argument::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(s) | Argument::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Argument::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<i32> for Argument {
    fn from(v: i32) -> Self {
        Argument::Int(v)
    }
}

impl From<f32> for Argument {
    fn from(v: f32) -> Self {
        Argument::Float(v)
    }
}

impl From<i64> for Argument {
    fn from(v: i64) -> Self {
        Argument::Long(v)
    }
}

impl From<f64> for Argument {
    fn from(v: f64) -> Self {
        Argument::Double(v)
    }
}

impl From<bool> for Argument {
    fn from(v: bool) -> Self {
        Argument::Bool(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Argument::String(v.to_string())
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Argument::String(v)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(v: Vec<u8>) -> Self {
        Argument::Blob(v)
    }
}

impl From<TimeTag> for Argument {
    fn from(v: TimeTag) -> Self {
        Argument::Time(v)
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Encode one argument, returning its type tag and padded payload
pub fn encode_argument(arg: &Argument) -> Result<(char, Bytes)> {
    let mut buf = BytesMut::with_capacity(8);
    write_argument(&mut buf, arg)?;
    Ok((arg.tag(), buf.freeze()))
}

/// Decode the payload for `type_tag` from the front of `buf`
///
/// Fails with [`Error::InvalidTypeTag`] for unknown tags; the caller must
/// abandon the whole message since the payload width is unknown.
pub fn decode_argument(type_tag: char, buf: &mut &[u8]) -> Result<Argument> {
    match type_tag {
        tag::INT => Ok(Argument::Int(take(buf, 4, "int")?.get_i32())),
        tag::FLOAT => Ok(Argument::Float(take(buf, 4, "float")?.get_f32())),
        tag::STRING => Ok(Argument::String(read_string(buf)?)),
        tag::BLOB => Ok(Argument::Blob(read_blob(buf)?)),
        tag::LONG => Ok(Argument::Long(take(buf, 8, "int64")?.get_i64())),
        tag::DOUBLE => Ok(Argument::Double(take(buf, 8, "double")?.get_f64())),
        tag::TIME => Ok(Argument::Time(TimeTag::from_bits(
            take(buf, 8, "time tag")?.get_u64(),
        ))),
        tag::SYMBOL => Ok(Argument::Symbol(read_string(buf)?)),
        tag::CHAR => {
            let code = take(buf, 4, "char")?.get_u32();
            char::from_u32(code)
                .map(Argument::Char)
                .ok_or_else(|| Error::malformed(format!("invalid char code 0x{code:08x}")))
        }
        tag::COLOR => {
            let mut b = take(buf, 4, "color")?;
            Ok(Argument::Color(Color {
                red: b.get_u8(),
                green: b.get_u8(),
                blue: b.get_u8(),
                alpha: b.get_u8(),
            }))
        }
        tag::MIDI => {
            let mut b = take(buf, 4, "midi")?;
            Ok(Argument::Midi(MidiMessage {
                port: b.get_u8(),
                status: b.get_u8(),
                data1: b.get_u8(),
                data2: b.get_u8(),
            }))
        }
        tag::TRUE => Ok(Argument::Bool(true)),
        tag::FALSE => Ok(Argument::Bool(false)),
        tag::NIL => Ok(Argument::Nil),
        tag::IMPULSE => Ok(Argument::Impulse),
        other => Err(Error::InvalidTypeTag(other)),
    }
}

// ============================================================================
// WIRE HELPERS
// ============================================================================

/// Bytes of zero padding needed after `len` bytes
#[inline]
pub(crate) fn pad_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

pub(crate) fn write_argument(buf: &mut BytesMut, arg: &Argument) -> Result<()> {
    match arg {
        Argument::Int(i) => buf.put_i32(*i),
        Argument::Float(f) => buf.put_f32(*f),
        Argument::String(s) | Argument::Symbol(s) => write_string(buf, s)?,
        Argument::Blob(b) => write_blob(buf, b)?,
        Argument::Long(i) => buf.put_i64(*i),
        Argument::Double(d) => buf.put_f64(*d),
        Argument::Time(t) => buf.put_u64(t.to_bits()),
        Argument::Char(c) => buf.put_u32(*c as u32),
        Argument::Color(c) => buf.put_slice(&[c.red, c.green, c.blue, c.alpha]),
        Argument::Midi(m) => buf.put_slice(&[m.port, m.status, m.data1, m.data2]),
        Argument::Bool(_) | Argument::Nil | Argument::Impulse => {}
    }
    Ok(())
}

/// Write a NUL-terminated, zero-padded string
pub(crate) fn write_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    if s.contains('\0') {
        return Err(Error::EncodeError(format!("string contains NUL: {s:?}")));
    }
    buf.put_slice(s.as_bytes());
    // Always at least one NUL terminator.
    buf.put_bytes(0, 1 + pad_len(s.len() + 1));
    Ok(())
}

fn write_blob(buf: &mut BytesMut, b: &[u8]) -> Result<()> {
    let len = u32::try_from(b.len())
        .map_err(|_| Error::EncodeError(format!("blob too large: {} bytes", b.len())))?;
    buf.put_u32(len);
    buf.put_slice(b);
    buf.put_bytes(0, pad_len(b.len()));
    Ok(())
}

/// Read a NUL-terminated, zero-padded string
pub(crate) fn read_string(buf: &mut &[u8]) -> Result<String> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::malformed("unterminated string"))?;
    let padded = nul + 1 + pad_len(nul + 1);
    if buf.remaining() < padded {
        return Err(Error::short("string padding", padded, buf.remaining()));
    }
    if buf[nul + 1..padded].iter().any(|&b| b != 0) {
        return Err(Error::malformed("non-zero string padding"));
    }
    let s = std::str::from_utf8(&buf[..nul])
        .map_err(|e| Error::malformed(format!("string is not utf-8: {e}")))?
        .to_string();
    buf.advance(padded);
    Ok(s)
}

fn read_blob(buf: &mut &[u8]) -> Result<Vec<u8>> {
    let len = take(buf, 4, "blob length")?.get_u32() as usize;
    let padded = len + pad_len(len);
    if buf.remaining() < padded {
        return Err(Error::short("blob", padded, buf.remaining()));
    }
    if buf[len..padded].iter().any(|&b| b != 0) {
        return Err(Error::malformed("non-zero blob padding"));
    }
    let data = buf[..len].to_vec();
    buf.advance(padded);
    Ok(data)
}

/// Split `n` bytes off the front of `buf`
#[inline]
fn take<'a>(buf: &mut &'a [u8], n: usize, what: &str) -> Result<&'a [u8]> {
    if buf.remaining() < n {
        return Err(Error::short(what, n, buf.remaining()));
    }
    let slice: &'a [u8] = *buf;
    let (head, tail) = slice.split_at(n);
    *buf = tail;
    Ok(head)
}
