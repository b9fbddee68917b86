//! Flow records describing the sampled packet instead of carrying its header.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;

use crate::error::Error;
use crate::schema::{AddressWidth, Field, validate};
use crate::value::{Layout, Value, Values, serialize_mac};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EthernetFrame {
    pub length: u32,
    #[serde(serialize_with = "serialize_mac")]
    pub src_mac: [u8; 6],
    #[serde(serialize_with = "serialize_mac")]
    pub dst_mac: [u8; 6],
    pub eth_type: u32,
}

impl Layout for EthernetFrame {
    const NAME: &'static str = "EthernetFrame";
    const FIELDS: &'static [Field] = &[
        Field::u32("Length"),
        Field::bytes("SrcMac", 6).padded(),
        Field::bytes("DstMac", 6).padded(),
        Field::u32("EthernetType"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(EthernetFrame {
            length: values.u32()?,
            src_mac: values.mac()?,
            dst_mac: values.mac()?,
            eth_type: values.u32()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.length),
            Value::from(self.src_mac.as_slice()),
            Value::from(self.dst_mac.as_slice()),
            Value::from(self.eth_type),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ipv4Flow {
    pub length: u32,
    pub protocol: u32,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u32,
    pub dst_port: u32,
    pub tcp_flags: u32,
    pub tos: u32,
}

impl Layout for Ipv4Flow {
    const NAME: &'static str = "Ipv4Flow";
    const FIELDS: &'static [Field] = &[
        Field::u32("Length"),
        Field::u32("Protocol"),
        Field::address("SrcIp", AddressWidth::Literal(4)),
        Field::address("DstIp", AddressWidth::Literal(4)),
        Field::u32("SrcPort"),
        Field::u32("DstPort"),
        Field::u32("TcpFlags"),
        Field::u32("Tos"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Ipv4Flow {
            length: values.u32()?,
            protocol: values.u32()?,
            src_ip: values.ipv4()?,
            dst_ip: values.ipv4()?,
            src_port: values.u32()?,
            dst_port: values.u32()?,
            tcp_flags: values.u32()?,
            tos: values.u32()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.length),
            Value::from(self.protocol),
            Value::from(self.src_ip),
            Value::from(self.dst_ip),
            Value::from(self.src_port),
            Value::from(self.dst_port),
            Value::from(self.tcp_flags),
            Value::from(self.tos),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ipv6Flow {
    pub length: u32,
    pub protocol: u32,
    pub src_ip: Ipv6Addr,
    pub dst_ip: Ipv6Addr,
    pub src_port: u32,
    pub dst_port: u32,
    pub tcp_flags: u32,
    pub priority: u32,
}

impl Layout for Ipv6Flow {
    const NAME: &'static str = "Ipv6Flow";
    const FIELDS: &'static [Field] = &[
        Field::u32("Length"),
        Field::u32("Protocol"),
        Field::address("SrcIp", AddressWidth::Literal(16)),
        Field::address("DstIp", AddressWidth::Literal(16)),
        Field::u32("SrcPort"),
        Field::u32("DstPort"),
        Field::u32("TcpFlags"),
        Field::u32("Priority"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(Ipv6Flow {
            length: values.u32()?,
            protocol: values.u32()?,
            src_ip: values.ipv6()?,
            dst_ip: values.ipv6()?,
            src_port: values.u32()?,
            dst_port: values.u32()?,
            tcp_flags: values.u32()?,
            priority: values.u32()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.length),
            Value::from(self.protocol),
            Value::from(self.src_ip),
            Value::from(self.dst_ip),
            Value::from(self.src_port),
            Value::from(self.dst_port),
            Value::from(self.tcp_flags),
            Value::from(self.priority),
        ]
    }
}

const _: () = assert!(validate(EthernetFrame::FIELDS).is_ok());
const _: () = assert!(validate(Ipv4Flow::FIELDS).is_ok());
const _: () = assert!(validate(Ipv6Flow::FIELDS).is_ok());
