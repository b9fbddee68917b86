//! Interprets a field schema against a byte cursor.
//!
//! Every count read off the wire is checked against its field's ceiling and
//! against the bytes that are actually left before anything is allocated for it.

use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BytesMut};
use xdr::{XDRReader, XDRWriter, padding};

use crate::error::{Error, SchemaError};
use crate::schema::{AddressWidth, Field, Kind, position};
use crate::value::Value;

const ADDRESS_TYPE_IPV4: u64 = 1;
const ADDRESS_TYPE_IPV6: u64 = 2;

fn read<T>(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
    need: usize,
    f: impl FnOnce(&mut Cursor<&[u8]>) -> std::io::Result<T>,
) -> Result<T, Error> {
    let remaining = buf.remaining();
    if remaining < need {
        return Err(Error::UnexpectedEof {
            field,
            need,
            remaining,
        });
    }

    f(buf).map_err(|_| Error::UnexpectedEof {
        field,
        need,
        remaining,
    })
}

/// Look up the value of an earlier sibling. Only fields before `index` are visible.
fn sibling(
    fields: &[Field],
    index: usize,
    values: &[Value],
    name: &'static str,
) -> Result<u64, Error> {
    let field = fields[index].name;
    let Some(target) = position(fields, index, name) else {
        return Err(SchemaError::UnresolvedReference {
            field,
            reference: name,
        }
        .into());
    };

    match values.get(target) {
        Some(Value::Uint(value)) if !fields[target].derived => Ok(*value),
        _ => Err(SchemaError::ReferenceNotUint {
            field,
            reference: name,
        }
        .into()),
    }
}

fn address_width(
    fields: &[Field],
    index: usize,
    values: &[Value],
    width: AddressWidth,
) -> Result<usize, Error> {
    match width {
        AddressWidth::Literal(width) => Ok(width),
        AddressWidth::Selector(selector) => match sibling(fields, index, values, selector)? {
            ADDRESS_TYPE_IPV4 => Ok(4),
            ADDRESS_TYPE_IPV6 => Ok(16),
            value => Err(Error::InvalidDiscriminant {
                field: selector,
                value,
            }),
        },
    }
}

/// Resolve a count from its sibling and hold it to the field's ceiling.
fn bounded_count(
    fields: &[Field],
    index: usize,
    values: &[Value],
    length: &'static str,
) -> Result<usize, Error> {
    let count = sibling(fields, index, values, length)?;
    let max = fields[index].max;
    if count > max as u64 {
        return Err(Error::LengthTooLarge {
            field: length,
            length: count,
            max,
        });
    }

    Ok(count as usize)
}

fn read_address(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
    width: usize,
) -> Result<IpAddr, Error> {
    read(buf, field, width, |buf| {
        if width == 4 {
            let mut octets = [0u8; 4];
            std::io::Read::read_exact(buf, &mut octets)?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        } else {
            let mut octets = [0u8; 16];
            std::io::Read::read_exact(buf, &mut octets)?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
    })
}

fn read_bytes(buf: &mut Cursor<&[u8]>, field: &Field, len: usize) -> Result<Vec<u8>, Error> {
    if field.padded {
        read(buf, field.name, len + padding(len), |buf| {
            buf.read_padded_opaque(len)
        })
    } else {
        read(buf, field.name, len, |buf| buf.read_opaque(len))
    }
}

fn decode_field(
    fields: &[Field],
    index: usize,
    values: &[Value],
    buf: &mut Cursor<&[u8]>,
) -> Result<Value, Error> {
    let field = &fields[index];

    let value = match field.kind {
        Kind::Uint(width) => Value::Uint(read(buf, field.name, width, |buf| buf.read_uint(width))?),
        Kind::Bytes(len) => Value::Bytes(read_bytes(buf, field, len)?),
        Kind::Address(width) => {
            let width = address_width(fields, index, values, width)?;
            Value::Address(read_address(buf, field.name, width)?)
        }
        Kind::VariableBytes { length } => {
            let count = bounded_count(fields, index, values, length)?;
            Value::Bytes(read_bytes(buf, field, count)?)
        }
        Kind::VariableArray { width, length } => {
            let count = bounded_count(fields, index, values, length)?;
            let need = count * width;
            let remaining = buf.remaining();
            if remaining < need {
                return Err(Error::UnexpectedEof {
                    field: field.name,
                    need,
                    remaining,
                });
            }

            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read(buf, field.name, width, |buf| buf.read_uint(width))?);
            }

            Value::Array(items)
        }
        Kind::NestedList { element, length } => {
            let count = bounded_count(fields, index, values, length)?;

            // every element takes at least one byte, so a bogus count cannot
            // reserve more than the data could hold
            let mut elements = Vec::with_capacity(count.min(buf.remaining()));
            for _ in 0..count {
                elements.push(decode_fields(element, buf)?);
            }

            Value::List(elements)
        }
    };

    Ok(value)
}

/// Decode every field of `fields` in declaration order. Derived fields are not
/// on the wire, they get a zero placeholder.
pub fn decode_fields(fields: &[Field], buf: &mut Cursor<&[u8]>) -> Result<Vec<Value>, Error> {
    let mut values = Vec::with_capacity(fields.len());

    for index in 0..fields.len() {
        let value = if fields[index].derived {
            Value::Uint(0)
        } else {
            decode_field(fields, index, &values, buf)?
        };

        values.push(value);
    }

    Ok(values)
}

fn check_count(field: &'static str, declared: u64, actual: usize) -> Result<(), Error> {
    if declared != actual as u64 {
        return Err(Error::LengthMismatch {
            field,
            declared,
            actual: actual as u64,
        });
    }

    Ok(())
}

fn field_len(fields: &[Field], index: usize, values: &[Value]) -> Result<usize, Error> {
    let field = &fields[index];
    let mismatch = || Error::from(SchemaError::ValueMismatch { field: field.name });

    let size = match (field.kind, &values[index]) {
        (Kind::Uint(width), Value::Uint(value)) => {
            if width < 8 && value >> (width * 8) != 0 {
                return Err(mismatch());
            }

            width
        }
        (Kind::Bytes(len), Value::Bytes(data)) => {
            check_count(field.name, len as u64, data.len())?;
            if field.padded { len + padding(len) } else { len }
        }
        (Kind::Address(width), Value::Address(addr)) => {
            let width = address_width(fields, index, values, width)?;
            let actual = if addr.is_ipv4() { 4 } else { 16 };
            check_count(field.name, width as u64, actual)?;

            width
        }
        (Kind::VariableBytes { length }, Value::Bytes(data)) => {
            let count = bounded_count(fields, index, values, length)?;
            check_count(length, count as u64, data.len())?;
            if field.padded {
                count + padding(count)
            } else {
                count
            }
        }
        (Kind::VariableArray { width, length }, Value::Array(items)) => {
            let count = bounded_count(fields, index, values, length)?;
            check_count(length, count as u64, items.len())?;
            if width < 8 && items.iter().any(|item| item >> (width * 8) != 0) {
                return Err(mismatch());
            }

            count * width
        }
        (Kind::NestedList { element, length }, Value::List(elements)) => {
            let count = bounded_count(fields, index, values, length)?;
            check_count(length, count as u64, elements.len())?;

            let mut size = 0;
            for element_values in elements {
                size += encoded_len(element, element_values)?;
            }

            size
        }
        _ => return Err(mismatch()),
    };

    Ok(size)
}

/// The size-only pass. Checks everything the write pass relies on, so a
/// successful result means the values can be written exactly as sized.
pub fn encoded_len(fields: &[Field], values: &[Value]) -> Result<usize, Error> {
    if values.len() != fields.len() {
        let field = fields
            .get(values.len())
            .map(|field| field.name)
            .unwrap_or("<end of schema>");
        return Err(SchemaError::MissingValue { field }.into());
    }

    let mut size = 0;
    for (index, field) in fields.iter().enumerate() {
        if field.derived {
            continue;
        }

        size += field_len(fields, index, values)?;
    }

    Ok(size)
}

/// Write pass only, `values` must have gone through [`encoded_len`] already.
pub(crate) fn write_fields(
    fields: &[Field],
    values: &[Value],
    buf: &mut BytesMut,
) -> Result<(), Error> {
    for (field, value) in fields.iter().zip(values) {
        if field.derived {
            continue;
        }

        match (field.kind, value) {
            (Kind::Uint(width), Value::Uint(value)) => buf.write_uint(width, *value),
            (Kind::Bytes(_) | Kind::VariableBytes { .. }, Value::Bytes(data)) => {
                if field.padded {
                    buf.write_padded_opaque(data);
                } else {
                    buf.write_opaque(data);
                }
            }
            (Kind::Address(_), Value::Address(IpAddr::V4(addr))) => {
                buf.write_opaque(&addr.octets())
            }
            (Kind::Address(_), Value::Address(IpAddr::V6(addr))) => {
                buf.write_opaque(&addr.octets())
            }
            (Kind::VariableArray { width, .. }, Value::Array(items)) => {
                for item in items {
                    buf.write_uint(width, *item);
                }
            }
            (Kind::NestedList { element, .. }, Value::List(elements)) => {
                for element_values in elements {
                    write_fields(element, element_values, buf)?;
                }
            }
            _ => return Err(SchemaError::ValueMismatch { field: field.name }.into()),
        }
    }

    Ok(())
}

/// Encode `values` in schema order, nothing is written unless the size pass succeeds.
pub fn encode_fields(fields: &[Field], values: &[Value], buf: &mut BytesMut) -> Result<(), Error> {
    let size = encoded_len(fields, values)?;
    buf.reserve(size);

    write_fields(fields, values, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MAXIMUM_RECORD_LENGTH, validate};

    const SEGMENT: &[Field] = &[
        Field::u32("SegType"),
        Field::u32("SegLen"),
        Field::variable_array("Seg", 4, "SegLen"),
    ];

    const FIELDS: &[Field] = &[
        Field::u32("AddressType"),
        Field::address("Address", AddressWidth::Selector("AddressType")),
        Field::u16("Port"),
        Field::u16("Flags"),
        Field::u32("Derived").derived(),
        Field::u32("DataLen"),
        Field::variable_bytes("Data", "DataLen").padded(),
        Field::u32("SegmentsLen"),
        Field::nested_list("Segments", SEGMENT, "SegmentsLen"),
    ];

    const _: () = assert!(validate(FIELDS).is_ok());

    fn sample() -> Vec<Value> {
        vec![
            Value::Uint(1),
            Value::Address(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            Value::Uint(443),
            Value::Uint(0x12),
            Value::Uint(0),
            Value::Uint(3),
            Value::Bytes(vec![0xaa, 0xbb, 0xcc]),
            Value::Uint(1),
            Value::List(vec![vec![
                Value::Uint(2),
                Value::Uint(2),
                Value::Array(vec![65001, 65002]),
            ]]),
        ]
    }

    #[test]
    fn encode_then_decode() {
        let values = sample();
        assert_eq!(encoded_len(FIELDS, &values).unwrap(), 4 + 4 + 2 + 2 + 4 + 4 + 4 + 16);

        let mut buf = BytesMut::new();
        encode_fields(FIELDS, &values, &mut buf).unwrap();
        assert_eq!(buf.len(), 40);
        assert_eq!(
            &buf[..16],
            [0, 0, 0, 1, 10, 0, 0, 1, 0x01, 0xbb, 0x00, 0x12, 0, 0, 0, 3]
        );
        assert_eq!(&buf[16..20], [0xaa, 0xbb, 0xcc, 0x00]);

        let mut cursor = Cursor::new(buf.as_ref());
        let decoded = decode_fields(FIELDS, &mut cursor).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn selector_widths() {
        let data = [
            0, 0, 0, 2, 0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        ];
        let fields = &FIELDS[..2];
        let values = decode_fields(fields, &mut Cursor::new(data.as_ref())).unwrap();
        assert_eq!(
            values[1],
            Value::Address("2001:db8::1".parse::<IpAddr>().unwrap())
        );

        let data = [0, 0, 0, 3, 1, 2, 3, 4];
        assert_eq!(
            decode_fields(fields, &mut Cursor::new(data.as_ref())),
            Err(Error::InvalidDiscriminant {
                field: "AddressType",
                value: 3
            })
        );
    }

    #[test]
    fn counts_are_bounded_before_allocation() {
        const BYTES: &[Field] = &[
            Field::u32("Len"),
            Field::variable_bytes("Data", "Len").max(1500),
        ];

        let data = [0x00, 0x00, 0x05, 0xdd];
        assert_eq!(
            decode_fields(BYTES, &mut Cursor::new(data.as_ref())),
            Err(Error::LengthTooLarge {
                field: "Len",
                length: 1501,
                max: 1500
            })
        );

        const ARRAY: &[Field] = &[
            Field::u32("Len"),
            Field::variable_array("Items", 4, "Len"),
        ];
        let data = [0xff, 0xff, 0xff, 0xff];
        assert_eq!(
            decode_fields(ARRAY, &mut Cursor::new(data.as_ref())),
            Err(Error::LengthTooLarge {
                field: "Len",
                length: u32::MAX as u64,
                max: MAXIMUM_RECORD_LENGTH
            })
        );

        // within the ceiling but more than the data holds
        let data = [0x00, 0x00, 0x01, 0x00, 0, 0, 0, 1];
        assert_eq!(
            decode_fields(ARRAY, &mut Cursor::new(data.as_ref())),
            Err(Error::UnexpectedEof {
                field: "Items",
                need: 1024,
                remaining: 4
            })
        );
    }

    #[test]
    fn truncated() {
        let data = [0, 0, 0, 1, 10, 0];
        assert_eq!(
            decode_fields(FIELDS, &mut Cursor::new(data.as_ref())),
            Err(Error::UnexpectedEof {
                field: "Address",
                need: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn encode_rejects_inconsistent_values() {
        let mut values = sample();
        values[5] = Value::Uint(4);
        assert_eq!(
            encoded_len(FIELDS, &values),
            Err(Error::LengthMismatch {
                field: "DataLen",
                declared: 4,
                actual: 3
            })
        );

        let mut values = sample();
        values[1] = Value::Address("::1".parse().unwrap());
        assert_eq!(
            encoded_len(FIELDS, &values),
            Err(Error::LengthMismatch {
                field: "Address",
                declared: 4,
                actual: 16
            })
        );

        let mut values = sample();
        values[2] = Value::Uint(0x1_0000);
        assert_eq!(
            encoded_len(FIELDS, &values),
            Err(Error::Schema(SchemaError::ValueMismatch { field: "Port" }))
        );

        let mut buf = BytesMut::new();
        assert!(encode_fields(FIELDS, &values, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn derived_fields_are_not_on_the_wire() {
        const FIELDS: &[Field] = &[Field::u32("A"), Field::u32("B").derived(), Field::u32("C")];

        let data = [0, 0, 0, 1, 0, 0, 0, 2];
        let values = decode_fields(FIELDS, &mut Cursor::new(data.as_ref())).unwrap();
        assert_eq!(values, vec![Value::Uint(1), Value::Uint(0), Value::Uint(2)]);

        let mut buf = BytesMut::new();
        encode_fields(
            FIELDS,
            &[Value::Uint(1), Value::Uint(99), Value::Uint(2)],
            &mut buf,
        )
        .unwrap();
        assert_eq!(buf.as_ref(), data);
    }
}
