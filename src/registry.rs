use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{Error, SchemaError};
use crate::records::{
    COUNTER_TYPE_ETH, EthernetFrame, EthernetFrameCounters, ExtendedGateway, ExtendedRouter,
    ExtendedSwitch, FLOW_TYPE_ETH, FLOW_TYPE_EXT_GATEWAY, FLOW_TYPE_EXT_ROUTER,
    FLOW_TYPE_EXT_SWITCH, FLOW_TYPE_IPV4, FLOW_TYPE_IPV6, FLOW_TYPE_RAW, Ipv4Flow, Ipv6Flow,
    RawPacket, Record, derive_destination_as,
};
use crate::schema::{Field, validate};
use crate::value::{Layout, Values};

/// Builds the typed record from its decoded field values.
pub type Construct = fn(&mut Values) -> Result<Record, Error>;

/// Runs once on a freshly decoded record, before anyone else sees it.
pub type PostDecode = fn(&mut Record);

#[derive(Clone, Copy, Debug)]
pub struct Entry {
    pub name: &'static str,
    pub fields: &'static [Field],
    pub construct: Construct,
    pub post_decode: Option<PostDecode>,
}

fn construct<T: Layout + Into<Record>>(values: &mut Values) -> Result<Record, Error> {
    T::from_values(values).map(Into::into)
}

/// Maps record type ids to the way their bodies are decoded.
///
/// A registry is filled once and then only read, the built-in ones are shared
/// process wide.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<u32, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema that was not checked when the crate was compiled.
    pub fn register(&mut self, type_id: u32, entry: Entry) -> Result<(), SchemaError> {
        validate(entry.fields)?;
        self.entries.insert(type_id, entry);

        Ok(())
    }

    /// Built-in layouts carry a compile time check of their schema already.
    fn builtin<T: Layout + Into<Record>>(&mut self, type_id: u32, post_decode: Option<PostDecode>) {
        self.entries.insert(
            type_id,
            Entry {
                name: T::NAME,
                fields: T::FIELDS,
                construct: construct::<T>,
                post_decode,
            },
        );
    }

    #[inline]
    pub fn get(&self, type_id: u32) -> Option<&Entry> {
        self.entries.get(&type_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records carried by flow samples.
    pub fn flows() -> &'static Registry {
        static FLOWS: LazyLock<Registry> = LazyLock::new(|| {
            let mut registry = Registry::new();
            registry.builtin::<RawPacket>(FLOW_TYPE_RAW, None);
            registry.builtin::<EthernetFrame>(FLOW_TYPE_ETH, None);
            registry.builtin::<Ipv4Flow>(FLOW_TYPE_IPV4, None);
            registry.builtin::<Ipv6Flow>(FLOW_TYPE_IPV6, None);
            registry.builtin::<ExtendedSwitch>(FLOW_TYPE_EXT_SWITCH, None);
            registry.builtin::<ExtendedRouter>(FLOW_TYPE_EXT_ROUTER, None);
            registry.builtin::<ExtendedGateway>(
                FLOW_TYPE_EXT_GATEWAY,
                Some(derive_destination_as),
            );
            registry
        });

        &FLOWS
    }

    /// Records carried by counter samples.
    pub fn counters() -> &'static Registry {
        static COUNTERS: LazyLock<Registry> = LazyLock::new(|| {
            let mut registry = Registry::new();
            registry.builtin::<EthernetFrameCounters>(COUNTER_TYPE_ETH, None);
            registry
        });

        &COUNTERS
    }
}
