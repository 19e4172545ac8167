//! Packet types: messages, bundles and the packet enum over both

use serde::{Deserialize, Serialize};

use crate::argument::Argument;
use crate::time::TimeTag;

/// An OSC message
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    pub address: String,
    pub arguments: Vec<Argument>,
}

impl Message {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            arguments: Vec::new(),
        }
    }

    /// Append an argument (builder style)
    pub fn with_arg(mut self, arg: impl Into<Argument>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// The type tag string, including the leading `,`
    pub fn typetags(&self) -> String {
        let mut tags = String::with_capacity(self.arguments.len() + 1);
        tags.push(crate::TYPETAG_PREFIX);
        tags.extend(self.arguments.iter().map(Argument::tag));
        tags
    }
}

/// A time-tagged collection of packets
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bundle {
    pub timetag: TimeTag,
    pub packets: Vec<Packet>,
}

impl Bundle {
    pub fn new(timetag: TimeTag) -> Self {
        Self {
            timetag,
            packets: Vec::new(),
        }
    }

    /// Append a nested packet (builder style)
    pub fn with_packet(mut self, packet: impl Into<Packet>) -> Self {
        self.packets.push(packet.into());
        self
    }
}

// Nested bundles are torn down iteratively.
impl Drop for Bundle {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.packets);
        while let Some(packet) = pending.pop() {
            if let Packet::Bundle(mut nested) = packet {
                pending.append(&mut nested.packets);
            }
        }
    }
}

/// Either a message or a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    Message(Message),
    Bundle(Bundle),
}

impl Packet {
    pub fn is_bundle(&self) -> bool {
        matches!(self, Packet::Bundle(_))
    }

    /// All contained messages, depth-first in wire order
    pub fn messages(&self) -> Vec<&Message> {
        let mut out = Vec::new();
        let mut pending = vec![std::slice::from_ref(self).iter()];
        while let Some(level) = pending.last_mut() {
            match level.next() {
                Some(Packet::Message(m)) => out.push(m),
                Some(Packet::Bundle(b)) => pending.push(b.packets.iter()),
                None => {
                    pending.pop();
                }
            }
        }
        out
    }
}

impl From<Message> for Packet {
    fn from(m: Message) -> Self {
        Packet::Message(m)
    }
}

impl From<Bundle> for Packet {
    fn from(b: Bundle) -> Self {
        Packet::Bundle(b)
    }
}
