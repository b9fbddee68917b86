use serde::Serialize;

use crate::error::Error;
use crate::schema::{Field, validate};
use crate::value::{Layout, Value, Values};

/// Ethernet interface counters, dot3StatsTable from RFC 2358.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EthernetFrameCounters {
    pub alignment_errors: u32,
    pub fcs_errors: u32,
    pub single_collision_frames: u32,
    pub multiple_collision_frames: u32,
    pub sqe_test_errors: u32,
    pub deferred_transmissions: u32,
    pub late_collisions: u32,
    pub excessive_collisions: u32,
    pub internal_mac_transmit_errors: u32,
    pub carrier_sense_errors: u32,
    pub frame_too_longs: u32,
    pub internal_mac_receive_errors: u32,
    pub symbol_errors: u32,
}

impl Layout for EthernetFrameCounters {
    const NAME: &'static str = "EthernetFrameCounters";
    const FIELDS: &'static [Field] = &[
        Field::u32("Dot3StatsAlignmentErrors"),
        Field::u32("Dot3StatsFCSErrors"),
        Field::u32("Dot3StatsSingleCollisionFrames"),
        Field::u32("Dot3StatsMultipleCollisionFrames"),
        Field::u32("Dot3StatsSQETestErrors"),
        Field::u32("Dot3StatsDeferredTransmissions"),
        Field::u32("Dot3StatsLateCollisions"),
        Field::u32("Dot3StatsExcessiveCollisions"),
        Field::u32("Dot3StatsInternalMacTransmitErrors"),
        Field::u32("Dot3StatsCarrierSenseErrors"),
        Field::u32("Dot3StatsFrameTooLongs"),
        Field::u32("Dot3StatsInternalMacReceiveErrors"),
        Field::u32("Dot3StatsSymbolErrors"),
    ];

    fn from_values(values: &mut Values) -> Result<Self, Error> {
        Ok(EthernetFrameCounters {
            alignment_errors: values.u32()?,
            fcs_errors: values.u32()?,
            single_collision_frames: values.u32()?,
            multiple_collision_frames: values.u32()?,
            sqe_test_errors: values.u32()?,
            deferred_transmissions: values.u32()?,
            late_collisions: values.u32()?,
            excessive_collisions: values.u32()?,
            internal_mac_transmit_errors: values.u32()?,
            carrier_sense_errors: values.u32()?,
            frame_too_longs: values.u32()?,
            internal_mac_receive_errors: values.u32()?,
            symbol_errors: values.u32()?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        [
            self.alignment_errors,
            self.fcs_errors,
            self.single_collision_frames,
            self.multiple_collision_frames,
            self.sqe_test_errors,
            self.deferred_transmissions,
            self.late_collisions,
            self.excessive_collisions,
            self.internal_mac_transmit_errors,
            self.carrier_sense_errors,
            self.frame_too_longs,
            self.internal_mac_receive_errors,
            self.symbol_errors,
        ]
        .into_iter()
        .map(Value::from)
        .collect()
    }
}

const _: () = assert!(validate(EthernetFrameCounters::FIELDS).is_ok());
