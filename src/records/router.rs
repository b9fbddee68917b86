use std::net::IpAddr;

use serde::Serialize;

use super::address_type;
use crate::error::Error;
use crate::schema::{AddressWidth, Field, validate};
use crate::value::{Layout, Value, Values};

/// Extended router data.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExtendedRouter {
    pub next_hop: IpAddr,
    pub src_mask_len: u32,
    pub dst_mask_len: u32,
}

impl Layout for ExtendedRouter {
    const NAME: &'static str = "ExtendedRouter";
    const FIELDS: &'static [Field] = &[
        Field::u32("NextHopType"),
        Field::address("NextHop", AddressWidth::Selector("NextHopType")),
        Field::u32("SrcMaskLen"),
        Field::u32("DstMaskLen"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        values.skip()?;

        Ok(ExtendedRouter {
            next_hop: values.address()?,
            src_mask_len: values.u32()?,
            dst_mask_len: values.u32()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(address_type(&self.next_hop)),
            Value::from(self.next_hop),
            Value::from(self.src_mask_len),
            Value::from(self.dst_mask_len),
        ]
    }
}

const _: () = assert!(validate(ExtendedRouter::FIELDS).is_ok());
