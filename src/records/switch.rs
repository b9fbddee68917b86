use serde::Serialize;

use crate::error::Error;
use crate::schema::{Field, validate};
use crate::value::{Layout, Value, Values};

/// Extended switch data, the 802.1Q VLAN and priority on both sides of the switch.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExtendedSwitch {
    pub src_vlan: u32,
    pub src_priority: u32,
    pub dst_vlan: u32,
    pub dst_priority: u32,
}

impl Layout for ExtendedSwitch {
    const NAME: &'static str = "ExtendedSwitch";
    const FIELDS: &'static [Field] = &[
        Field::u32("SourceVlan"),
        Field::u32("SourcePriority"),
        Field::u32("DestinationVlan"),
        Field::u32("DestinationPriority"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(ExtendedSwitch {
            src_vlan: values.u32()?,
            src_priority: values.u32()?,
            dst_vlan: values.u32()?,
            dst_priority: values.u32()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.src_vlan),
            Value::from(self.src_priority),
            Value::from(self.dst_vlan),
            Value::from(self.dst_priority),
        ]
    }
}

const _: () = assert!(validate(ExtendedSwitch::FIELDS).is_ok());
