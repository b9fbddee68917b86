//! Decodes the protocol layers of a sampled packet header.
//!
//! The chain is driven by the type field of each layer, and stops at the first
//! layer it does not understand or cannot fully read. Whatever was decoded up to
//! that point is kept, a short or odd header is never an error.

use std::io::Cursor;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;
use tracing::trace;
use xdr::XDRCursor;

use crate::error::Error;
use crate::schema::{AddressWidth, Field, validate};
use crate::value::{Layout, Value, Values, serialize_mac};

// Header protocol numbers according to https://sflow.org/SFLOW-STRUCTS5.txt
pub const HEADER_PROTOCOL_ETHERNET: u32 = 1;
pub const HEADER_PROTOCOL_IPV4: u32 = 11;
pub const HEADER_PROTOCOL_IPV6: u32 = 12;

const ETHER_TYPE_IPV4: u16 = 0x0800;
const ETHER_TYPE_IPV6: u16 = 0x86DD;
const ETHER_TYPE_VLAN: u16 = 0x8100;

const IP_PROTOCOL_ICMP: u8 = 1;
const IP_PROTOCOL_TCP: u8 = 6;
const IP_PROTOCOL_UDP: u8 = 17;
const IP_PROTOCOL_ICMPV6: u8 = 58;

const IPV4_MINIMUM_HEADER_LENGTH: usize = 20;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ethernet {
    #[serde(serialize_with = "serialize_mac")]
    pub dst_mac: [u8; 6],
    #[serde(serialize_with = "serialize_mac")]
    pub src_mac: [u8; 6],
    pub ether_type: u16,
}

impl Layout for Ethernet {
    const NAME: &'static str = "Ethernet";
    const FIELDS: &'static [Field] = &[
        Field::bytes("DstMac", 6),
        Field::bytes("SrcMac", 6),
        Field::u16("EtherType"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Ethernet {
            dst_mac: values.mac()?,
            src_mac: values.mac()?,
            ether_type: values.u16()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.dst_mac.as_slice()),
            Value::from(self.src_mac.as_slice()),
            Value::from(self.ether_type),
        ]
    }
}

/// 802.1Q tag, `ether_type` is the type of the encapsulated frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Vlan {
    pub tci: u16,
    pub ether_type: u16,
}

impl Vlan {
    #[inline]
    pub fn id(&self) -> u16 {
        self.tci & 0x0fff
    }

    #[inline]
    pub fn priority(&self) -> u8 {
        (self.tci >> 13) as u8
    }
}

impl Layout for Vlan {
    const NAME: &'static str = "Vlan";
    const FIELDS: &'static [Field] = &[Field::u16("Tci"), Field::u16("EtherType")];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Vlan {
            tci: values.u16()?,
            ether_type: values.u16()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::from(self.tci), Value::from(self.ether_type)]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ipv4 {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4 {
    /// Length of the header including options, in bytes.
    #[inline]
    pub fn header_length(&self) -> usize {
        (self.version_ihl & 0x0f) as usize * 4
    }
}

impl Layout for Ipv4 {
    const NAME: &'static str = "IPv4";
    const FIELDS: &'static [Field] = &[
        Field::u8("VersionIhl"),
        Field::u8("Tos"),
        Field::u16("TotalLength"),
        Field::u16("Identification"),
        Field::u16("Fragment"),
        Field::u8("Ttl"),
        Field::u8("Protocol"),
        Field::u16("Checksum"),
        Field::address("Src", AddressWidth::Literal(4)),
        Field::address("Dst", AddressWidth::Literal(4)),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Ipv4 {
            version_ihl: values.u8()?,
            tos: values.u8()?,
            total_length: values.u16()?,
            identification: values.u16()?,
            fragment: values.u16()?,
            ttl: values.u8()?,
            protocol: values.u8()?,
            checksum: values.u16()?,
            src: values.ipv4()?,
            dst: values.ipv4()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.version_ihl),
            Value::from(self.tos),
            Value::from(self.total_length),
            Value::from(self.identification),
            Value::from(self.fragment),
            Value::from(self.ttl),
            Value::from(self.protocol),
            Value::from(self.checksum),
            Value::from(self.src),
            Value::from(self.dst),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ipv6 {
    pub version_class_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
}

impl Layout for Ipv6 {
    const NAME: &'static str = "IPv6";
    const FIELDS: &'static [Field] = &[
        Field::u32("VersionClassLabel"),
        Field::u16("PayloadLength"),
        Field::u8("NextHeader"),
        Field::u8("HopLimit"),
        Field::address("Src", AddressWidth::Literal(16)),
        Field::address("Dst", AddressWidth::Literal(16)),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Ipv6 {
            version_class_label: values.u32()?,
            payload_length: values.u16()?,
            next_header: values.u8()?,
            hop_limit: values.u8()?,
            src: values.ipv6()?,
            dst: values.ipv6()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.version_class_label),
            Value::from(self.payload_length),
            Value::from(self.next_header),
            Value::from(self.hop_limit),
            Value::from(self.src),
            Value::from(self.dst),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tcp {
    pub src_port: u16,
    pub dst_port: u16,
    pub sequence: u32,
    pub acknowledgement: u32,
    pub data_offset: u8,
    pub flags: u8,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
}

impl Layout for Tcp {
    const NAME: &'static str = "TCP";
    const FIELDS: &'static [Field] = &[
        Field::u16("SrcPort"),
        Field::u16("DstPort"),
        Field::u32("Sequence"),
        Field::u32("Acknowledgement"),
        Field::u8("DataOffset"),
        Field::u8("Flags"),
        Field::u16("Window"),
        Field::u16("Checksum"),
        Field::u16("UrgentPointer"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Tcp {
            src_port: values.u16()?,
            dst_port: values.u16()?,
            sequence: values.u32()?,
            acknowledgement: values.u32()?,
            data_offset: values.u8()?,
            flags: values.u8()?,
            window: values.u16()?,
            checksum: values.u16()?,
            urgent_pointer: values.u16()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.src_port),
            Value::from(self.dst_port),
            Value::from(self.sequence),
            Value::from(self.acknowledgement),
            Value::from(self.data_offset),
            Value::from(self.flags),
            Value::from(self.window),
            Value::from(self.checksum),
            Value::from(self.urgent_pointer),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Udp {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl Layout for Udp {
    const NAME: &'static str = "UDP";
    const FIELDS: &'static [Field] = &[
        Field::u16("SrcPort"),
        Field::u16("DstPort"),
        Field::u16("Length"),
        Field::u16("Checksum"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Udp {
            src_port: values.u16()?,
            dst_port: values.u16()?,
            length: values.u16()?,
            checksum: values.u16()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.src_port),
            Value::from(self.dst_port),
            Value::from(self.length),
            Value::from(self.checksum),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Icmp {
    pub icmp_type: u8,
    pub code: u8,
}

impl Layout for Icmp {
    const NAME: &'static str = "ICMP";
    const FIELDS: &'static [Field] = &[Field::u8("Type"), Field::u8("Code")];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Icmp {
            icmp_type: values.u8()?,
            code: values.u8()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::from(self.icmp_type), Value::from(self.code)]
    }
}

const _: () = assert!(validate(Ethernet::FIELDS).is_ok());
const _: () = assert!(validate(Vlan::FIELDS).is_ok());
const _: () = assert!(validate(Ipv4::FIELDS).is_ok());
const _: () = assert!(validate(Ipv6::FIELDS).is_ok());
const _: () = assert!(validate(Tcp::FIELDS).is_ok());
const _: () = assert!(validate(Udp::FIELDS).is_ok());
const _: () = assert!(validate(Icmp::FIELDS).is_ok());

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum HeaderLayer {
    Ethernet(Ethernet),
    Vlan(Vlan),
    Ipv4(Ipv4),
    Ipv6(Ipv6),
    Tcp(Tcp),
    Udp(Udp),
    Icmp(Icmp),
    /// The header protocol is not one the chain starts from.
    Unknown { protocol: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    Ethernet,
    Vlan,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Icmp,
    Stop,
}

impl State {
    fn from_ether_type(ether_type: u16) -> State {
        match ether_type {
            ETHER_TYPE_IPV4 => State::Ipv4,
            ETHER_TYPE_IPV6 => State::Ipv6,
            ETHER_TYPE_VLAN => State::Vlan,
            _ => State::Stop,
        }
    }

    fn from_ip_protocol(protocol: u8, ipv6: bool) -> State {
        match protocol {
            IP_PROTOCOL_TCP => State::Tcp,
            IP_PROTOCOL_UDP => State::Udp,
            IP_PROTOCOL_ICMP => State::Icmp,
            IP_PROTOCOL_ICMPV6 if ipv6 => State::Icmp,
            _ => State::Stop,
        }
    }
}

fn step(
    state: State,
    buf: &mut Cursor<&[u8]>,
    layers: &mut Vec<HeaderLayer>,
) -> Result<State, Error> {
    let next = match state {
        State::Ethernet => {
            let ethernet = Ethernet::decode(buf)?;
            let next = State::from_ether_type(ethernet.ether_type);
            layers.push(HeaderLayer::Ethernet(ethernet));
            next
        }
        State::Vlan => {
            let vlan = Vlan::decode(buf)?;
            let next = State::from_ether_type(vlan.ether_type);
            layers.push(HeaderLayer::Vlan(vlan));
            next
        }
        State::Ipv4 => {
            let ipv4 = Ipv4::decode(buf)?;
            let options = ipv4
                .header_length()
                .saturating_sub(IPV4_MINIMUM_HEADER_LENGTH);
            let next = State::from_ip_protocol(ipv4.protocol, false);
            layers.push(HeaderLayer::Ipv4(ipv4));

            // options are not decoded, but the transport header starts after them
            if buf.skip(options).is_err() {
                State::Stop
            } else {
                next
            }
        }
        State::Ipv6 => {
            let ipv6 = Ipv6::decode(buf)?;
            let next = State::from_ip_protocol(ipv6.next_header, true);
            layers.push(HeaderLayer::Ipv6(ipv6));
            next
        }
        State::Tcp => {
            layers.push(HeaderLayer::Tcp(Tcp::decode(buf)?));
            State::Stop
        }
        State::Udp => {
            layers.push(HeaderLayer::Udp(Udp::decode(buf)?));
            State::Stop
        }
        State::Icmp => {
            layers.push(HeaderLayer::Icmp(Icmp::decode(buf)?));
            State::Stop
        }
        State::Stop => State::Stop,
    };

    Ok(next)
}

/// Walk the layers of `header`, starting from the layer `protocol` names.
pub fn decode(protocol: u32, header: &[u8]) -> Vec<HeaderLayer> {
    let mut state = match protocol {
        HEADER_PROTOCOL_ETHERNET => State::Ethernet,
        HEADER_PROTOCOL_IPV4 => State::Ipv4,
        HEADER_PROTOCOL_IPV6 => State::Ipv6,
        _ => return vec![HeaderLayer::Unknown { protocol }],
    };

    let mut buf = Cursor::new(header);
    let mut layers = Vec::new();
    while state != State::Stop {
        state = match step(state, &mut buf, &mut layers) {
            Ok(next) => next,
            Err(err) => {
                trace!(message = "Header chain stopped", ?state, %err);
                State::Stop
            }
        };
    }

    layers
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    // Ethernet, 802.1Q, IPv4 and ICMP echo request, captured from a switch
    const VLAN_ICMP: [u8; 78] = [
        0x00, 0xff, 0x12, 0x34, 0x35, 0x1b, 0xff, 0xab, 0xcd, 0xef, 0xab, 0x64, 0x81, 0x00, 0x00,
        0x20, 0x08, 0x00, 0x45, 0x00, 0x00, 0x3c, 0x5c, 0x07, 0x00, 0x00, 0x7c, 0x01, 0x48, 0xa0,
        0xac, 0x10, 0x20, 0xfe, 0xac, 0x10, 0x20, 0xf1, 0x08, 0x00, 0x97, 0x61, 0xa9, 0x48, 0x0c,
        0xb2, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x6b, 0x6c, 0x6d, 0x6e,
        0x6f, 0x70, 0x71, 0x72, 0x73, 0x74, 0x75, 0x76, 0x77, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66,
        0x67, 0x68, 0x69,
    ];

    #[test]
    fn ethernet_vlan_ipv4_icmp() {
        let layers = decode(HEADER_PROTOCOL_ETHERNET, &VLAN_ICMP);

        assert_eq!(
            layers,
            vec![
                HeaderLayer::Ethernet(Ethernet {
                    dst_mac: [0x00, 0xff, 0x12, 0x34, 0x35, 0x1b],
                    src_mac: [0xff, 0xab, 0xcd, 0xef, 0xab, 0x64],
                    ether_type: ETHER_TYPE_VLAN,
                }),
                HeaderLayer::Vlan(Vlan {
                    tci: 32,
                    ether_type: ETHER_TYPE_IPV4,
                }),
                HeaderLayer::Ipv4(Ipv4 {
                    version_ihl: 0x45,
                    tos: 0,
                    total_length: 60,
                    identification: 23559,
                    fragment: 0,
                    ttl: 124,
                    protocol: IP_PROTOCOL_ICMP,
                    checksum: 0x48a0,
                    src: Ipv4Addr::new(172, 16, 32, 254),
                    dst: Ipv4Addr::new(172, 16, 32, 241),
                }),
                HeaderLayer::Icmp(Icmp {
                    icmp_type: 8,
                    code: 0
                }),
            ]
        );

        match &layers[1] {
            HeaderLayer::Vlan(vlan) => {
                assert_eq!(vlan.id(), 32);
                assert_eq!(vlan.priority(), 0);
            }
            layer => panic!("unexpected layer {layer:?}"),
        }
    }

    #[test]
    fn truncated_layer_keeps_what_was_decoded() {
        // cut inside the IPv4 source address
        let layers = decode(HEADER_PROTOCOL_ETHERNET, &VLAN_ICMP[..32]);
        assert_eq!(layers.len(), 2);
        assert!(matches!(layers[0], HeaderLayer::Ethernet(_)));
        assert!(matches!(layers[1], HeaderLayer::Vlan(_)));

        // one byte short of the ICMP code
        let layers = decode(HEADER_PROTOCOL_ETHERNET, &VLAN_ICMP[..39]);
        assert_eq!(layers.len(), 3);

        assert!(decode(HEADER_PROTOCOL_ETHERNET, &[]).is_empty());
    }

    #[test]
    fn unknown_protocol() {
        assert_eq!(
            decode(7, &VLAN_ICMP),
            vec![HeaderLayer::Unknown { protocol: 7 }]
        );
    }

    #[test]
    fn unknown_ether_type_stops() {
        let mut header = VLAN_ICMP;
        // ARP
        header[16] = 0x08;
        header[17] = 0x06;

        let layers = decode(HEADER_PROTOCOL_ETHERNET, &header);
        assert_eq!(layers.len(), 2);
    }

    #[test]
    fn ipv4_options_are_skipped() {
        let mut header = vec![
            0x46, 0x00, 0x00, 0x20, 0x00, 0x01, 0x00, 0x00, 0x40, 0x11, 0x00, 0x00, 10, 0, 0, 1, 10,
            0, 0, 2,
        ];
        // one word of options
        header.extend_from_slice(&[0x01, 0x01, 0x01, 0x00]);
        // udp
        header.extend_from_slice(&[0x00, 0x35, 0xc3, 0x50, 0x00, 0x0c, 0x00, 0x00]);

        let layers = decode(HEADER_PROTOCOL_IPV4, &header);
        assert_eq!(layers.len(), 2);
        assert_eq!(
            layers[1],
            HeaderLayer::Udp(Udp {
                src_port: 53,
                dst_port: 50000,
                length: 12,
                checksum: 0,
            })
        );

        // options run past the end of the header
        let layers = decode(HEADER_PROTOCOL_IPV4, &header[..22]);
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn ipv6_icmp() {
        let mut header = vec![0x60, 0x00, 0x00, 0x00, 0x00, 0x08, 58, 64];
        header.extend_from_slice(&"fe80::1".parse::<Ipv6Addr>().unwrap().octets());
        header.extend_from_slice(&"fe80::2".parse::<Ipv6Addr>().unwrap().octets());
        header.extend_from_slice(&[135, 0, 0, 0]);

        let layers = decode(HEADER_PROTOCOL_IPV6, &header);
        assert_eq!(layers.len(), 2);
        match &layers[0] {
            HeaderLayer::Ipv6(ipv6) => {
                assert_eq!(ipv6.next_header, IP_PROTOCOL_ICMPV6);
                assert_eq!(ipv6.src, "fe80::1".parse::<Ipv6Addr>().unwrap());
            }
            layer => panic!("unexpected layer {layer:?}"),
        }
        assert_eq!(
            layers[1],
            HeaderLayer::Icmp(Icmp {
                icmp_type: 135,
                code: 0
            })
        );
    }
}
