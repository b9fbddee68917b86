use std::net::IpAddr;

use serde::Serialize;

use super::{Record, address_type};
use crate::error::Error;
use crate::schema::{AddressWidth, Field, validate};
use crate::value::{Layout, Value, Values};

const SEGMENT_TYPE_UNORDERED: u32 = 1;
const SEGMENT_TYPE_ORDERED: u32 = 2;

/// BGP AS path segment type, `AS_SET` or `AS_SEQUENCE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AsPathSegmentType {
    Unordered,
    Ordered,
    Other(u32),
}

impl From<u32> for AsPathSegmentType {
    fn from(value: u32) -> Self {
        match value {
            SEGMENT_TYPE_UNORDERED => AsPathSegmentType::Unordered,
            SEGMENT_TYPE_ORDERED => AsPathSegmentType::Ordered,
            other => AsPathSegmentType::Other(other),
        }
    }
}

impl From<AsPathSegmentType> for u32 {
    fn from(value: AsPathSegmentType) -> Self {
        match value {
            AsPathSegmentType::Unordered => SEGMENT_TYPE_UNORDERED,
            AsPathSegmentType::Ordered => SEGMENT_TYPE_ORDERED,
            AsPathSegmentType::Other(other) => other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AsPathSegment {
    pub seg_type: AsPathSegmentType,
    pub seg: Vec<u32>,
}

impl Layout for AsPathSegment {
    const NAME: &'static str = "AsPathSegment";
    const FIELDS: &'static [Field] = &[
        Field::u32("SegType"),
        Field::u32("SegLen"),
        Field::variable_array("Seg", 4, "SegLen"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        let seg_type = AsPathSegmentType::from(values.u32()?);
        values.skip()?;

        Ok(AsPathSegment {
            seg_type,
            seg: values.array_u32()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(u32::from(self.seg_type)),
            Value::count(self.seg.len()),
            Value::array(&self.seg),
        ]
    }
}

/// Extended gateway data, the BGP view of the sampled packet.
///
/// `dst_peer_as` and `dst_as` are not on the wire, they are derived from the
/// first ordered segment of `dst_as_path` once the record is decoded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExtendedGateway {
    pub next_hop: IpAddr,
    pub as_number: u32,
    pub src_as: u32,
    pub src_peer_as: u32,
    pub dst_as: u32,
    pub dst_peer_as: u32,
    pub dst_as_path: Vec<AsPathSegment>,
    pub communities: Vec<u32>,
    pub local_pref: u32,
}

impl ExtendedGateway {
    pub fn new(
        next_hop: IpAddr,
        as_number: u32,
        src_as: u32,
        src_peer_as: u32,
        dst_as_path: Vec<AsPathSegment>,
        communities: Vec<u32>,
        local_pref: u32,
    ) -> Self {
        let (dst_peer_as, dst_as) = destination_as(&dst_as_path);

        ExtendedGateway {
            next_hop,
            as_number,
            src_as,
            src_peer_as,
            dst_as,
            dst_peer_as,
            dst_as_path,
            communities,
            local_pref,
        }
    }
}

/// Peer and destination AS, the first and last element of the first ordered
/// segment. Zero when there is no such segment or it is empty.
fn destination_as(segments: &[AsPathSegment]) -> (u32, u32) {
    segments
        .iter()
        .find(|segment| segment.seg_type == AsPathSegmentType::Ordered)
        .and_then(|segment| Some((*segment.seg.first()?, *segment.seg.last()?)))
        .unwrap_or_default()
}

/// Post-decode step for [`ExtendedGateway`], fills in the derived AS numbers.
pub fn derive_destination_as(record: &mut Record) {
    if let Record::ExtendedGateway(gateway) = record {
        (gateway.dst_peer_as, gateway.dst_as) = destination_as(&gateway.dst_as_path);
    }
}

impl Layout for ExtendedGateway {
    const NAME: &'static str = "ExtendedGateway";
    const FIELDS: &'static [Field] = &[
        Field::u32("NextHopType"),
        Field::address("NextHop", AddressWidth::Selector("NextHopType")),
        Field::u32("As"),
        Field::u32("SrcAs"),
        Field::u32("SrcPeerAs"),
        Field::u32("DstAs").derived(),
        Field::u32("DstPeerAs").derived(),
        Field::u32("DstAsPathSegmentsLen"),
        Field::nested_list(
            "DstAsPathSegments",
            AsPathSegment::FIELDS,
            "DstAsPathSegmentsLen",
        ),
        Field::u32("CommunitiesLen"),
        Field::variable_array("Communities", 4, "CommunitiesLen"),
        Field::u32("LocalPref"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        values.skip()?;
        let next_hop = values.address()?;
        let as_number = values.u32()?;
        let src_as = values.u32()?;
        let src_peer_as = values.u32()?;
        let dst_as = values.u32()?;
        let dst_peer_as = values.u32()?;
        values.skip()?;
        let dst_as_path = values.list()?;
        values.skip()?;
        let communities = values.array_u32()?;
        let local_pref = values.u32()?;

        Ok(ExtendedGateway {
            next_hop,
            as_number,
            src_as,
            src_peer_as,
            dst_as,
            dst_peer_as,
            dst_as_path,
            communities,
            local_pref,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(address_type(&self.next_hop)),
            Value::from(self.next_hop),
            Value::from(self.as_number),
            Value::from(self.src_as),
            Value::from(self.src_peer_as),
            Value::from(self.dst_as),
            Value::from(self.dst_peer_as),
            Value::count(self.dst_as_path.len()),
            Value::list(&self.dst_as_path),
            Value::count(self.communities.len()),
            Value::array(&self.communities),
            Value::from(self.local_pref),
        ]
    }
}

const _: () = assert!(validate(AsPathSegment::FIELDS).is_ok());
const _: () = assert!(validate(ExtendedGateway::FIELDS).is_ok());
