//! Record level framing, `[type_id: u32][length: u32][body]`.
//!
//! A record body is always decoded inside a window of exactly `length` bytes, so
//! a malformed body can never take bytes from the records that follow it. Once
//! the window is taken the stream is aligned on the next record whatever the
//! body turns out to hold.

use std::io::Cursor;

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};
use xdr::{XDRCursor, XDRReader, XDRWriter};

use crate::codec::{decode_fields, encoded_len, write_fields};
use crate::error::Error;
use crate::records::{Body, Record};
use crate::registry::{Entry, Registry};
use crate::schema::MAXIMUM_RECORD_LENGTH;
use crate::value::Values;

/// The maximum number of records a single sample may declare.
pub const MAXIMUM_RECORDS_PER_SAMPLE: usize = 1000;

const RECORD_HEADER_LENGTH: usize = 8;

pub(crate) fn read_u32(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u32, Error> {
    let remaining = buf.remaining();
    buf.read_u32().map_err(|_| Error::UnexpectedEof {
        field,
        need: 4,
        remaining,
    })
}

/// Split off the next `length` bytes, failing without moving when they are not there.
pub(crate) fn read_window<'a>(
    buf: &mut Cursor<&'a [u8]>,
    field: &'static str,
    length: usize,
) -> Result<Cursor<&'a [u8]>, Error> {
    let remaining = buf.remaining();
    buf.window(length).map_err(|_| Error::UnexpectedEof {
        field,
        need: length,
        remaining,
    })
}

fn decode_body(entry: &Entry, body: &mut Cursor<&[u8]>) -> Result<Record, Error> {
    let length = body.remaining();
    if length > MAXIMUM_RECORD_LENGTH {
        return Err(Error::LengthTooLarge {
            field: "length",
            length: length as u64,
            max: MAXIMUM_RECORD_LENGTH,
        });
    }

    let values = decode_fields(entry.fields, body)?;
    if body.has_remaining() {
        return Err(Error::LengthMismatch {
            field: "length",
            declared: length as u64,
            actual: (length - body.remaining()) as u64,
        });
    }

    let mut record = (entry.construct)(&mut Values::new(entry.fields, values))?;
    if let Some(post_decode) = entry.post_decode {
        post_decode(&mut record);
    }

    Ok(record)
}

/// Decode one record.
///
/// Types missing from `registry` come back as [`Record::Unknown`]. A malformed
/// body yields [`Error::Record`] with the cursor already past the record, any
/// other error means the stream itself ran out and cannot be resynchronised.
pub fn decode_record(buf: &mut Cursor<&[u8]>, registry: &Registry) -> Result<Record, Error> {
    let type_id = read_u32(buf, "type_id")?;
    let length = read_u32(buf, "length")? as usize;
    let mut body = read_window(buf, "length", length)?;

    let Some(entry) = registry.get(type_id) else {
        debug!(message = "Skip unknown record type", type_id, length);

        return Ok(Record::Unknown {
            type_id,
            data: body.get_ref().to_vec(),
        });
    };

    decode_body(entry, &mut body).map_err(|err| Error::Record {
        type_id,
        name: entry.name,
        source: Box::new(err),
    })
}

/// Decode `count` consecutive records. Malformed records are logged and left out.
///
/// Decoding stops at the first error the stream cannot recover from, that error
/// comes back together with every record decoded before it.
pub fn decode_records(
    buf: &mut Cursor<&[u8]>,
    registry: &Registry,
    count: u32,
) -> (Vec<Record>, Option<Error>) {
    let count = count as usize;
    if count > MAXIMUM_RECORDS_PER_SAMPLE {
        let err = Error::LengthTooLarge {
            field: "records",
            length: count as u64,
            max: MAXIMUM_RECORDS_PER_SAMPLE,
        };

        return (Vec::new(), Some(err));
    }

    let mut records = Vec::with_capacity(count.min(buf.remaining() / RECORD_HEADER_LENGTH));
    for _ in 0..count {
        match decode_record(buf, registry) {
            Ok(record) => records.push(record),
            Err(err) if err.is_recoverable() => {
                warn!(message = "Skip malformed record", %err);
            }
            Err(err) => return (records, Some(err)),
        }
    }

    (records, None)
}

/// Encode one record. The body is sized before anything is written, so on error
/// `buf` is left as it was.
pub fn encode_record(buf: &mut BytesMut, record: &Record) -> Result<(), Error> {
    let type_id = record.type_id();

    match record.body() {
        Body::Layout(fields, values) => {
            let length = encoded_len(fields, &values)?;
            if length > MAXIMUM_RECORD_LENGTH {
                return Err(Error::LengthTooLarge {
                    field: "length",
                    length: length as u64,
                    max: MAXIMUM_RECORD_LENGTH,
                });
            }

            buf.reserve(RECORD_HEADER_LENGTH + length);
            buf.write_uint(4, type_id as u64);
            buf.write_uint(4, length as u64);
            write_fields(fields, &values, buf)
        }
        Body::Verbatim(data) => {
            if data.len() > MAXIMUM_RECORD_LENGTH {
                return Err(Error::LengthTooLarge {
                    field: "length",
                    length: data.len() as u64,
                    max: MAXIMUM_RECORD_LENGTH,
                });
            }

            buf.reserve(RECORD_HEADER_LENGTH + data.len());
            buf.write_uint(4, type_id as u64);
            buf.write_uint(4, data.len() as u64);
            buf.write_opaque(data);

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::records::{ExtendedSwitch, FLOW_TYPE_EXT_ROUTER, FLOW_TYPE_EXT_SWITCH};

    fn switch_record(vlan: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_record(
            &mut buf,
            &Record::ExtendedSwitch(ExtendedSwitch {
                src_vlan: vlan,
                src_priority: 0,
                dst_vlan: vlan,
                dst_priority: 0,
            }),
        )
        .unwrap();
        buf.to_vec()
    }

    #[test]
    fn unknown_type_is_skipped() {
        let mut data = vec![0x00, 0x00, 0x27, 0x0f, 0x00, 0x00, 0x00, 0x08];
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data.extend_from_slice(&switch_record(30));

        let mut buf = Cursor::new(data.as_slice());
        let record = decode_record(&mut buf, Registry::flows()).unwrap();
        assert_eq!(
            record,
            Record::Unknown {
                type_id: 9999,
                data: vec![1, 2, 3, 4, 5, 6, 7, 8]
            }
        );
        assert_eq!(buf.position(), 16);

        let record = decode_record(&mut buf, Registry::flows()).unwrap();
        assert_eq!(record.type_id(), FLOW_TYPE_EXT_SWITCH);
        assert!(!buf.has_remaining());

        // and back to the same bytes
        let mut out = BytesMut::new();
        encode_record(
            &mut out,
            &Record::Unknown {
                type_id: 9999,
                data: vec![1, 2, 3, 4, 5, 6, 7, 8],
            },
        )
        .unwrap();
        assert_eq!(out.as_ref(), &data[..16]);
    }

    #[test]
    fn malformed_body_resyncs() {
        // a router record whose next hop type is 3
        let mut data = vec![0x00, 0x00, 0x03, 0xea, 0x00, 0x00, 0x00, 0x10];
        data.extend_from_slice(&[0, 0, 0, 3, 10, 0, 0, 1, 0, 0, 0, 24, 0, 0, 0, 16]);
        data.extend_from_slice(&switch_record(7));

        let mut buf = Cursor::new(data.as_slice());
        let err = decode_record(&mut buf, Registry::flows()).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            err,
            Error::Record {
                type_id: FLOW_TYPE_EXT_ROUTER,
                name: "ExtendedRouter",
                source: Box::new(Error::InvalidDiscriminant {
                    field: "NextHopType",
                    value: 3
                })
            }
        );
        assert_eq!(buf.position(), 24);

        let mut buf = Cursor::new(data.as_slice());
        let (records, err) = decode_records(&mut buf, Registry::flows(), 2);
        assert_eq!(err, None);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0],
            Record::ExtendedSwitch(ExtendedSwitch {
                src_vlan: 7,
                src_priority: 0,
                dst_vlan: 7,
                dst_priority: 0,
            })
        );
    }

    #[test]
    fn body_shorter_than_length() {
        // switch records are 16 bytes, declare 20
        let mut data = switch_record(1);
        data[7] = 20;
        data.extend_from_slice(&[0, 0, 0, 0]);

        let mut buf = Cursor::new(data.as_slice());
        let err = decode_record(&mut buf, Registry::flows()).unwrap_err();
        assert_eq!(
            err.cause(),
            &Error::LengthMismatch {
                field: "length",
                declared: 20,
                actual: 16
            }
        );
        assert!(!buf.has_remaining());
    }

    #[test]
    fn body_longer_than_length() {
        // declare 12 of the 16 bytes, the last field runs out of the window
        let mut data = switch_record(1);
        data[7] = 12;
        data.extend_from_slice(&switch_record(2));

        let mut buf = Cursor::new(data.as_slice());
        let err = decode_record(&mut buf, Registry::flows()).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            err.cause(),
            &Error::UnexpectedEof {
                field: "DestinationPriority",
                need: 4,
                remaining: 0
            }
        );
        assert_eq!(buf.position(), 20);
    }

    #[test]
    fn length_past_end_is_fatal() {
        let mut data = switch_record(1);
        data[6] = 0x01;

        let mut buf = Cursor::new(data.as_slice());
        let (records, err) = decode_records(&mut buf, Registry::flows(), 1);
        assert!(records.is_empty());
        let err = err.unwrap();
        assert!(!err.is_recoverable());
        assert_eq!(
            err,
            Error::UnexpectedEof {
                field: "length",
                need: 0x0110,
                remaining: 16
            }
        );

        let err = decode_record(&mut Cursor::new([0u8, 0, 3].as_ref()), Registry::flows())
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { field: "type_id", .. }));
    }

    #[test]
    fn fatal_error_keeps_earlier_records() {
        let unknown = Record::Unknown {
            type_id: 9999,
            data: vec![0; 8],
        };
        let mut out = BytesMut::new();
        encode_record(&mut out, &unknown).unwrap();

        // type 1, 256 bytes long, nothing after it
        let mut data = out.to_vec();
        data.extend_from_slice(&[0, 0, 0, 1, 0, 0, 1, 0]);

        let mut buf = Cursor::new(data.as_slice());
        let (records, err) = decode_records(&mut buf, Registry::flows(), 2);
        assert_eq!(records, vec![unknown]);
        assert_eq!(
            err,
            Some(Error::UnexpectedEof {
                field: "length",
                need: 256,
                remaining: 0
            })
        );
        assert_eq!(buf.position(), 24);
    }

    #[test]
    fn too_many_records() {
        let (records, err) = decode_records(&mut Cursor::new(&[][..]), Registry::flows(), 1001);

        assert!(records.is_empty());
        assert_eq!(
            err,
            Some(Error::LengthTooLarge {
                field: "records",
                length: 1001,
                max: MAXIMUM_RECORDS_PER_SAMPLE
            })
        );
    }
}
