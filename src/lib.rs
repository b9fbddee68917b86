//! Decoding and encoding of sFlow v5 records.
//!
//! Every record layout is a static table of [`schema::Field`]s, walked by the
//! generic [`codec`]. The [`dispatch`] module frames records on the wire and
//! [`datagram`] wraps them into samples and datagrams.

pub mod codec;
pub mod config;
pub mod datagram;
pub mod dispatch;
pub mod error;
pub mod header;
pub mod listen;
pub mod records;
pub mod registry;
pub mod schema;
pub mod trace;
pub mod value;

pub use datagram::{Datagram, Sample};
pub use error::{Error, SchemaError};
pub use records::Record;
pub use registry::Registry;
