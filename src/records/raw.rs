use serde::Serialize;

use crate::error::Error;
use crate::header::{self, HeaderLayer};
use crate::schema::{Field, MAXIMUM_HEADER_LENGTH, validate};
use crate::value::{Layout, Value, Values};

/// Raw packet header, the first bytes of the sampled frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RawPacket {
    /// Header protocol, 1 is ethernet, 11 and 12 are bare IPv4 and IPv6.
    pub protocol: u32,
    /// Original length of the packet before sampling.
    pub frame_length: u32,
    /// Bytes removed from the packet before the header was taken.
    pub stripped: u32,
    #[serde(skip)]
    pub header: Vec<u8>,

    pub layers: Vec<HeaderLayer>,
}

impl RawPacket {
    pub fn new(protocol: u32, frame_length: u32, stripped: u32, header: Vec<u8>) -> Self {
        let layers = header::decode(protocol, &header);

        RawPacket {
            protocol,
            frame_length,
            stripped,
            header,
            layers,
        }
    }
}

impl Layout for RawPacket {
    const NAME: &'static str = "RawPacket";
    const FIELDS: &'static [Field] = &[
        Field::u32("Protocol"),
        Field::u32("FrameLength"),
        Field::u32("Stripped"),
        Field::u32("HeaderSize"),
        Field::variable_bytes("Header", "HeaderSize")
            .max(MAXIMUM_HEADER_LENGTH)
            .padded(),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        let protocol = values.u32()?;
        let frame_length = values.u32()?;
        let stripped = values.u32()?;
        values.skip()?;
        let header = values.bytes()?;

        Ok(RawPacket::new(protocol, frame_length, stripped, header))
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.protocol),
            Value::from(self.frame_length),
            Value::from(self.stripped),
            Value::count(self.header.len()),
            Value::from(self.header.as_slice()),
        ]
    }
}

const _: () = assert!(validate(RawPacket::FIELDS).is_ok());
