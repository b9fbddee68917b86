use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::BytesMut;
use serde::Serializer;

use crate::codec;
use crate::error::{Error, SchemaError};
use crate::schema::Field;

/// One decoded field, shaped by the kind of the field it came from.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Uint(u64),
    Bytes(Vec<u8>),
    Address(IpAddr),
    Array(Vec<u64>),
    List(Vec<Vec<Value>>),
}

impl Value {
    /// A count field, always written from the length of the data it describes.
    #[inline]
    pub fn count(len: usize) -> Value {
        Value::Uint(len as u64)
    }

    pub fn array<T: Into<u64> + Copy>(items: &[T]) -> Value {
        Value::Array(items.iter().map(|item| (*item).into()).collect())
    }

    pub fn list<T: Layout>(items: &[T]) -> Value {
        Value::List(items.iter().map(Layout::to_values).collect())
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Uint(value.into())
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Uint(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Uint(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Uint(value)
    }
}

impl From<IpAddr> for Value {
    fn from(addr: IpAddr) -> Self {
        Value::Address(addr)
    }
}

impl From<Ipv4Addr> for Value {
    fn from(addr: Ipv4Addr) -> Self {
        Value::Address(IpAddr::V4(addr))
    }
}

impl From<Ipv6Addr> for Value {
    fn from(addr: Ipv6Addr) -> Self {
        Value::Address(IpAddr::V6(addr))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::Bytes(data.to_vec())
    }
}

/// Hands decoded values to a typed constructor one at a time, in schema order.
pub struct Values {
    fields: &'static [Field],
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl Values {
    pub fn new(fields: &'static [Field], values: Vec<Value>) -> Self {
        Values {
            fields,
            values: values.into_iter(),
            position: 0,
        }
    }

    fn next(&mut self) -> Result<(&'static str, Value), SchemaError> {
        let field = self
            .fields
            .get(self.position)
            .map(|field| field.name)
            .unwrap_or("<end of schema>");
        self.position += 1;

        match self.values.next() {
            Some(value) => Ok((field, value)),
            None => Err(SchemaError::MissingValue { field }),
        }
    }

    /// Consume a value without looking at it, used for counts and derived fields.
    pub fn skip(&mut self) -> Result<(), SchemaError> {
        self.next().map(|_| ())
    }

    pub fn uint(&mut self) -> Result<u64, SchemaError> {
        match self.next()? {
            (_, Value::Uint(value)) => Ok(value),
            (field, _) => Err(SchemaError::ValueMismatch { field }),
        }
    }

    fn narrow<T: TryFrom<u64>>(&mut self) -> Result<T, SchemaError> {
        let field = self.fields.get(self.position).map(|field| field.name);
        let value = self.uint()?;

        T::try_from(value).map_err(|_| SchemaError::ValueMismatch {
            field: field.unwrap_or("<end of schema>"),
        })
    }

    pub fn u8(&mut self) -> Result<u8, SchemaError> {
        self.narrow()
    }

    pub fn u16(&mut self) -> Result<u16, SchemaError> {
        self.narrow()
    }

    pub fn u32(&mut self) -> Result<u32, SchemaError> {
        self.narrow()
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, SchemaError> {
        match self.next()? {
            (_, Value::Bytes(data)) => Ok(data),
            (field, _) => Err(SchemaError::ValueMismatch { field }),
        }
    }

    pub fn mac(&mut self) -> Result<[u8; 6], SchemaError> {
        let field = self.fields.get(self.position).map(|field| field.name);

        self.bytes()?
            .try_into()
            .map_err(|_| SchemaError::ValueMismatch {
                field: field.unwrap_or("<end of schema>"),
            })
    }

    pub fn address(&mut self) -> Result<IpAddr, SchemaError> {
        match self.next()? {
            (_, Value::Address(addr)) => Ok(addr),
            (field, _) => Err(SchemaError::ValueMismatch { field }),
        }
    }

    pub fn ipv4(&mut self) -> Result<Ipv4Addr, SchemaError> {
        match self.next()? {
            (_, Value::Address(IpAddr::V4(addr))) => Ok(addr),
            (field, _) => Err(SchemaError::ValueMismatch { field }),
        }
    }

    pub fn ipv6(&mut self) -> Result<Ipv6Addr, SchemaError> {
        match self.next()? {
            (_, Value::Address(IpAddr::V6(addr))) => Ok(addr),
            (field, _) => Err(SchemaError::ValueMismatch { field }),
        }
    }

    pub fn array_u32(&mut self) -> Result<Vec<u32>, SchemaError> {
        match self.next()? {
            (field, Value::Array(items)) => items
                .into_iter()
                .map(|item| u32::try_from(item).map_err(|_| SchemaError::ValueMismatch { field }))
                .collect(),
            (field, _) => Err(SchemaError::ValueMismatch { field }),
        }
    }

    pub fn list<T: Layout>(&mut self) -> Result<Vec<T>, Error> {
        match self.next()? {
            (_, Value::List(elements)) => elements
                .into_iter()
                .map(|element| T::from_values(&mut Values::new(T::FIELDS, element)))
                .collect(),
            (field, _) => Err(SchemaError::ValueMismatch { field }.into()),
        }
    }
}

/// A typed structure with a field schema. Count fields are not stored, they are
/// produced from the length of the data they describe when converting back.
pub trait Layout: Sized {
    const NAME: &'static str;
    const FIELDS: &'static [Field];

    fn from_values(values: &mut Values) -> Result<Self, Error>;

    fn to_values(&self) -> Vec<Value>;

    fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        let values = codec::decode_fields(Self::FIELDS, buf)?;
        Self::from_values(&mut Values::new(Self::FIELDS, values))
    }

    fn encoded_len(&self) -> Result<usize, Error> {
        codec::encoded_len(Self::FIELDS, &self.to_values())
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), Error> {
        codec::encode_fields(Self::FIELDS, &self.to_values(), buf)
    }
}

pub fn serialize_mac<S: Serializer>(mac: &[u8; 6], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    ))
}
