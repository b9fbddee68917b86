mod counters;
mod gateway;
mod raw;
mod router;
mod sampled;
mod switch;

use std::net::IpAddr;

use serde::Serialize;

pub use counters::EthernetFrameCounters;
pub use gateway::{AsPathSegment, AsPathSegmentType, ExtendedGateway, derive_destination_as};
pub use raw::RawPacket;
pub use router::ExtendedRouter;
pub use sampled::{EthernetFrame, Ipv4Flow, Ipv6Flow};
pub use switch::ExtendedSwitch;

use crate::schema::Field;
use crate::value::{Layout, Value};

// Opaque flow_data types according to https://sflow.org/SFLOW-STRUCTS5.txt
pub const FLOW_TYPE_RAW: u32 = 1;
pub const FLOW_TYPE_ETH: u32 = 2;
pub const FLOW_TYPE_IPV4: u32 = 3;
pub const FLOW_TYPE_IPV6: u32 = 4;
pub const FLOW_TYPE_EXT_SWITCH: u32 = 1001;
pub const FLOW_TYPE_EXT_ROUTER: u32 = 1002;
pub const FLOW_TYPE_EXT_GATEWAY: u32 = 1003;
pub const FLOW_TYPE_EXT_USER: u32 = 1004;
pub const FLOW_TYPE_EXT_URL: u32 = 1005;
pub const FLOW_TYPE_EXT_MPLS: u32 = 1006;
pub const FLOW_TYPE_EXT_NAT: u32 = 1007;
pub const FLOW_TYPE_EXT_MPLS_TUNNEL: u32 = 1008;
pub const FLOW_TYPE_EXT_MPLS_VC: u32 = 1009;
pub const FLOW_TYPE_EXT_MPLS_FEC: u32 = 1010;
pub const FLOW_TYPE_EXT_MPLS_LVP_FEC: u32 = 1011;
pub const FLOW_TYPE_EXT_VLAN_TUNNEL: u32 = 1012;

// Opaque counter_data types, a separate namespace from flow_data
pub const COUNTER_TYPE_ETH: u32 = 2;

/// Address type on the wire, `1` for IPv4 and `2` for IPv6.
pub(crate) fn address_type(addr: &IpAddr) -> u32 {
    match addr {
        IpAddr::V4(_) => 1,
        IpAddr::V6(_) => 2,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    RawPacket(RawPacket),
    EthernetFrame(EthernetFrame),
    Ipv4Flow(Ipv4Flow),
    Ipv6Flow(Ipv6Flow),
    ExtendedSwitch(ExtendedSwitch),
    ExtendedRouter(ExtendedRouter),
    ExtendedGateway(ExtendedGateway),
    EthernetFrameCounters(EthernetFrameCounters),

    /// A record type nobody registered, kept verbatim.
    Unknown { type_id: u32, data: Vec<u8> },
}

pub enum Body<'a> {
    Layout(&'static [Field], Vec<Value>),
    Verbatim(&'a [u8]),
}

macro_rules! impl_from_layout {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Record {
                fn from(record: $variant) -> Self {
                    Record::$variant(record)
                }
            }
        )+
    };
}

impl_from_layout!(
    RawPacket,
    EthernetFrame,
    Ipv4Flow,
    Ipv6Flow,
    ExtendedSwitch,
    ExtendedRouter,
    ExtendedGateway,
    EthernetFrameCounters,
);

impl Record {
    pub fn type_id(&self) -> u32 {
        match self {
            Record::RawPacket(_) => FLOW_TYPE_RAW,
            Record::EthernetFrame(_) => FLOW_TYPE_ETH,
            Record::Ipv4Flow(_) => FLOW_TYPE_IPV4,
            Record::Ipv6Flow(_) => FLOW_TYPE_IPV6,
            Record::ExtendedSwitch(_) => FLOW_TYPE_EXT_SWITCH,
            Record::ExtendedRouter(_) => FLOW_TYPE_EXT_ROUTER,
            Record::ExtendedGateway(_) => FLOW_TYPE_EXT_GATEWAY,
            Record::EthernetFrameCounters(_) => COUNTER_TYPE_ETH,
            Record::Unknown { type_id, .. } => *type_id,
        }
    }

    /// What goes on the wire after the record header.
    pub fn body(&self) -> Body<'_> {
        fn layout<T: Layout>(record: &T) -> Body<'_> {
            Body::Layout(T::FIELDS, record.to_values())
        }

        match self {
            Record::RawPacket(record) => layout(record),
            Record::EthernetFrame(record) => layout(record),
            Record::Ipv4Flow(record) => layout(record),
            Record::Ipv6Flow(record) => layout(record),
            Record::ExtendedSwitch(record) => layout(record),
            Record::ExtendedRouter(record) => layout(record),
            Record::ExtendedGateway(record) => layout(record),
            Record::EthernetFrameCounters(record) => layout(record),
            Record::Unknown { data, .. } => Body::Verbatim(data),
        }
    }
}
