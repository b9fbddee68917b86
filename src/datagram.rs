//! sFlow v5 datagram and the samples it carries, see
//! https://sflow.org/SFLOW-DATAGRAM5.txt

use std::io::Cursor;
use std::net::IpAddr;

use bytes::Buf;
use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::decode_fields;
use crate::dispatch::{decode_records, read_u32, read_window};
use crate::error::Error;
use crate::records::Record;
use crate::registry::Registry;
use crate::schema::{AddressWidth, Field, validate};
use crate::value::Values;

pub const VERSION: u32 = 5;

/// The maximum number of samples a single datagram may declare.
pub const MAXIMUM_SAMPLES_PER_DATAGRAM: usize = 1000;

// Opaque sample_data types according to https://sflow.org/SFLOW-DATAGRAM5.txt
pub const SAMPLE_FORMAT_FLOW: u32 = 1;
pub const SAMPLE_FORMAT_COUNTER: u32 = 2;
pub const SAMPLE_FORMAT_EXPANDED_FLOW: u32 = 3;
pub const SAMPLE_FORMAT_EXPANDED_COUNTER: u32 = 4;
pub const SAMPLE_FORMAT_DROP: u32 = 5;

const SAMPLE_HEADER_LENGTH: usize = 8;

const DATAGRAM_HEADER: &[Field] = &[
    Field::u32("AgentAddressType"),
    Field::address("AgentAddress", AddressWidth::Selector("AgentAddressType")),
    Field::u32("SubAgentId"),
    Field::u32("SequenceNumber"),
    Field::u32("Uptime"),
    Field::u32("Samples"),
];

const FLOW_SAMPLE_HEADER: &[Field] = &[
    Field::u32("SequenceNumber"),
    Field::u32("SourceId"),
    Field::u32("SamplingRate"),
    Field::u32("SamplePool"),
    Field::u32("Drops"),
    Field::u32("Input"),
    Field::u32("Output"),
    Field::u32("Records"),
];

const EXPANDED_FLOW_SAMPLE_HEADER: &[Field] = &[
    Field::u32("SequenceNumber"),
    Field::u32("SourceIdType"),
    Field::u32("SourceIdIndex"),
    Field::u32("SamplingRate"),
    Field::u32("SamplePool"),
    Field::u32("Drops"),
    Field::u32("InputFormat"),
    Field::u32("InputValue"),
    Field::u32("OutputFormat"),
    Field::u32("OutputValue"),
    Field::u32("Records"),
];

const COUNTER_SAMPLE_HEADER: &[Field] = &[
    Field::u32("SequenceNumber"),
    Field::u32("SourceId"),
    Field::u32("Records"),
];

const EXPANDED_COUNTER_SAMPLE_HEADER: &[Field] = &[
    Field::u32("SequenceNumber"),
    Field::u32("SourceIdType"),
    Field::u32("SourceIdIndex"),
    Field::u32("Records"),
];

const DROP_SAMPLE_HEADER: &[Field] = &[
    Field::u32("SequenceNumber"),
    Field::u32("SourceIdType"),
    Field::u32("SourceIdIndex"),
    Field::u32("Drops"),
    Field::u32("Input"),
    Field::u32("Output"),
    Field::u32("Reason"),
    Field::u32("Records"),
];

const _: () = assert!(validate(DATAGRAM_HEADER).is_ok());
const _: () = assert!(validate(FLOW_SAMPLE_HEADER).is_ok());
const _: () = assert!(validate(EXPANDED_FLOW_SAMPLE_HEADER).is_ok());
const _: () = assert!(validate(COUNTER_SAMPLE_HEADER).is_ok());
const _: () = assert!(validate(EXPANDED_COUNTER_SAMPLE_HEADER).is_ok());
const _: () = assert!(validate(DROP_SAMPLE_HEADER).is_ok());

/// The interface, VLAN or entity a sample was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DataSource {
    pub source_type: u32,
    pub index: u32,
}

impl DataSource {
    /// Compact form, the type in the top byte and the index in the rest.
    #[inline]
    fn compact(id: u32) -> Self {
        DataSource {
            source_type: id >> 24,
            index: id & 0x00FF_FFFF,
        }
    }
}

/// An input or output interface. Format 0 is an ifIndex, 1 a discard reason
/// and 2 a packet count for multiple interfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub format: u32,
    pub value: u32,
}

impl Interface {
    /// Compact form, the format in the top two bits.
    #[inline]
    fn compact(v: u32) -> Self {
        Interface {
            format: v >> 30,
            value: v & 0x3FFF_FFFF,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowSample {
    pub sequence_number: u32,
    pub source: DataSource,
    pub sampling_rate: u32,
    pub sample_pool: u32,
    pub drops: u32,
    pub input: Interface,
    pub output: Interface,
    pub records: Vec<Record>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CounterSample {
    pub sequence_number: u32,
    pub source: DataSource,
    pub records: Vec<Record>,
}

/// Packets dropped by the agent, see https://sflow.org/sflow_drops.txt
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DropSample {
    pub sequence_number: u32,
    pub source: DataSource,
    pub drops: u32,
    pub input: u32,
    pub output: u32,
    pub reason: u32,
    pub records: Vec<Record>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "sample", rename_all = "snake_case")]
pub enum Sample {
    Flow(FlowSample),
    Counter(CounterSample),
    Drop(DropSample),

    /// A sample format this crate does not know, kept verbatim.
    Unknown { format: u32, data: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Datagram {
    pub version: u32,
    pub agent: IpAddr,
    pub sub_agent_id: u32,
    pub sequence_number: u32,
    pub uptime: u32,
    pub samples: Vec<Sample>,
}

fn header(fields: &'static [Field], buf: &mut Cursor<&[u8]>) -> Result<Values, Error> {
    let values = decode_fields(fields, buf)?;
    Ok(Values::new(fields, values))
}

/// The records of one sample. `buf` is the sample window, so a broken record
/// stream ends this sample only and the datagram goes on with the next one.
fn sample_records(buf: &mut Cursor<&[u8]>, registry: &Registry, count: u32) -> Vec<Record> {
    let (records, err) = decode_records(buf, registry, count);
    if let Some(err) = err {
        warn!(
            message = "Sample records cut short",
            %err,
            declared = count,
            decoded = records.len(),
        );
    }

    records
}

fn decode_flow_sample(buf: &mut Cursor<&[u8]>, expanded: bool) -> Result<FlowSample, Error> {
    let (mut sample, count) = if expanded {
        let mut values = header(EXPANDED_FLOW_SAMPLE_HEADER, buf)?;
        let sample = FlowSample {
            sequence_number: values.u32()?,
            source: DataSource {
                source_type: values.u32()?,
                index: values.u32()?,
            },
            sampling_rate: values.u32()?,
            sample_pool: values.u32()?,
            drops: values.u32()?,
            input: Interface {
                format: values.u32()?,
                value: values.u32()?,
            },
            output: Interface {
                format: values.u32()?,
                value: values.u32()?,
            },
            records: Vec::new(),
        };

        (sample, values.u32()?)
    } else {
        let mut values = header(FLOW_SAMPLE_HEADER, buf)?;
        let sample = FlowSample {
            sequence_number: values.u32()?,
            source: DataSource::compact(values.u32()?),
            sampling_rate: values.u32()?,
            sample_pool: values.u32()?,
            drops: values.u32()?,
            input: Interface::compact(values.u32()?),
            output: Interface::compact(values.u32()?),
            records: Vec::new(),
        };

        (sample, values.u32()?)
    };

    sample.records = sample_records(buf, Registry::flows(), count);

    Ok(sample)
}

fn decode_counter_sample(buf: &mut Cursor<&[u8]>, expanded: bool) -> Result<CounterSample, Error> {
    let (sequence_number, source, count) = if expanded {
        let mut values = header(EXPANDED_COUNTER_SAMPLE_HEADER, buf)?;
        (
            values.u32()?,
            DataSource {
                source_type: values.u32()?,
                index: values.u32()?,
            },
            values.u32()?,
        )
    } else {
        let mut values = header(COUNTER_SAMPLE_HEADER, buf)?;
        (
            values.u32()?,
            DataSource::compact(values.u32()?),
            values.u32()?,
        )
    };

    Ok(CounterSample {
        sequence_number,
        source,
        records: sample_records(buf, Registry::counters(), count),
    })
}

fn decode_drop_sample(buf: &mut Cursor<&[u8]>) -> Result<DropSample, Error> {
    let mut values = header(DROP_SAMPLE_HEADER, buf)?;

    let sequence_number = values.u32()?;
    let source = DataSource {
        source_type: values.u32()?,
        index: values.u32()?,
    };
    let drops = values.u32()?;
    let input = values.u32()?;
    let output = values.u32()?;
    let reason = values.u32()?;
    let count = values.u32()?;

    Ok(DropSample {
        sequence_number,
        source,
        drops,
        input,
        output,
        reason,
        records: sample_records(buf, Registry::flows(), count),
    })
}

/// Decode one sample. The body is read from a window of exactly the declared
/// length, bytes left in it after the last record are ignored.
pub fn decode_sample(buf: &mut Cursor<&[u8]>) -> Result<Sample, Error> {
    let format = read_u32(buf, "format")?;
    let length = read_u32(buf, "length")? as usize;
    let mut body = read_window(buf, "length", length)?;

    let sample = match format {
        SAMPLE_FORMAT_FLOW => Sample::Flow(decode_flow_sample(&mut body, false)?),
        SAMPLE_FORMAT_EXPANDED_FLOW => Sample::Flow(decode_flow_sample(&mut body, true)?),
        SAMPLE_FORMAT_COUNTER => Sample::Counter(decode_counter_sample(&mut body, false)?),
        SAMPLE_FORMAT_EXPANDED_COUNTER => Sample::Counter(decode_counter_sample(&mut body, true)?),
        SAMPLE_FORMAT_DROP => Sample::Drop(decode_drop_sample(&mut body)?),
        _ => {
            debug!(message = "Skip unknown sample format", format, length);

            Sample::Unknown {
                format,
                data: body.get_ref().to_vec(),
            }
        }
    };

    Ok(sample)
}

impl Datagram {
    /// Decode a whole datagram. Bytes after the last sample are ignored.
    pub fn decode(data: impl AsRef<[u8]>) -> Result<Datagram, Error> {
        let mut buf = Cursor::new(data.as_ref());

        let version = read_u32(&mut buf, "version")?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut values = header(DATAGRAM_HEADER, &mut buf)?;
        values.skip()?;
        let agent = values.address()?;
        let sub_agent_id = values.u32()?;
        let sequence_number = values.u32()?;
        let uptime = values.u32()?;
        let count = values.u32()? as usize;

        // protection against ddos
        if count > MAXIMUM_SAMPLES_PER_DATAGRAM {
            return Err(Error::LengthTooLarge {
                field: "samples",
                length: count as u64,
                max: MAXIMUM_SAMPLES_PER_DATAGRAM,
            });
        }

        let mut samples = Vec::with_capacity(count.min(buf.remaining() / SAMPLE_HEADER_LENGTH));
        for _ in 0..count {
            samples.push(decode_sample(&mut buf)?);
        }

        Ok(Datagram {
            version,
            agent,
            sub_agent_id,
            sequence_number,
            uptime,
            samples,
        })
    }
}
