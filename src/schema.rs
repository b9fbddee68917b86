//! Declarative description of a record's wire layout.
//!
//! A schema is an ordered `&'static [Field]` table. Fields are decoded and encoded
//! strictly in declaration order, so any field that carries a length or selects a
//! width must be declared before the fields that depend on it. [`validate`] checks
//! that property, it is a `const fn` so every built-in table is verified when the
//! crate compiles.

use crate::error::SchemaError;

/// The maximum length acceptable for any count or length read off the wire, derived
/// from `MAX_PKT_SIZ` in the reference sFlow implementation (sflowtool).
pub const MAXIMUM_RECORD_LENGTH: usize = 65536;

/// The maximum sampled header length, a packet header can never exceed the MTU.
pub const MAXIMUM_HEADER_LENGTH: usize = 1500;

/// Width of an address field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressWidth {
    /// Always 4 or always 16 bytes.
    Literal(usize),
    /// Chosen by an earlier sibling field, `1` selects IPv4 and `2` IPv6.
    Selector(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub enum Kind {
    /// Big-endian unsigned integer of 1, 2, 4 or 8 bytes.
    Uint(usize),
    /// Exactly `n` opaque bytes.
    Bytes(usize),
    /// An IPv4 or IPv6 address.
    Address(AddressWidth),
    /// Opaque bytes, the count lives in the named sibling.
    VariableBytes { length: &'static str },
    /// Unsigned integers of `width` bytes each, the count lives in the named sibling.
    VariableArray { width: usize, length: &'static str },
    /// A sequence of nested structures, each decoded with `element`.
    NestedList {
        element: &'static [Field],
        length: &'static str,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,

    /// Ceiling applied to the count of variable length fields.
    pub max: usize,

    /// Opaque data is followed by zero padding up to a multiple of 4.
    pub padded: bool,

    /// Filled in after decode, never read from or written to the wire.
    pub derived: bool,
}

impl Field {
    const fn new(name: &'static str, kind: Kind) -> Self {
        Field {
            name,
            kind,
            max: MAXIMUM_RECORD_LENGTH,
            padded: false,
            derived: false,
        }
    }

    pub const fn uint(name: &'static str, width: usize) -> Self {
        Field::new(name, Kind::Uint(width))
    }

    pub const fn u8(name: &'static str) -> Self {
        Field::uint(name, 1)
    }

    pub const fn u16(name: &'static str) -> Self {
        Field::uint(name, 2)
    }

    pub const fn u32(name: &'static str) -> Self {
        Field::uint(name, 4)
    }

    pub const fn bytes(name: &'static str, len: usize) -> Self {
        Field::new(name, Kind::Bytes(len))
    }

    pub const fn address(name: &'static str, width: AddressWidth) -> Self {
        Field::new(name, Kind::Address(width))
    }

    pub const fn variable_bytes(name: &'static str, length: &'static str) -> Self {
        Field::new(name, Kind::VariableBytes { length })
    }

    pub const fn variable_array(name: &'static str, width: usize, length: &'static str) -> Self {
        Field::new(name, Kind::VariableArray { width, length })
    }

    pub const fn nested_list(
        name: &'static str,
        element: &'static [Field],
        length: &'static str,
    ) -> Self {
        Field::new(name, Kind::NestedList { element, length })
    }

    pub const fn max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    pub const fn padded(mut self) -> Self {
        self.padded = true;
        self
    }

    pub const fn derived(mut self) -> Self {
        self.derived = true;
        self
    }

    /// The sibling this field depends on, if any.
    pub const fn reference(&self) -> Option<&'static str> {
        match self.kind {
            Kind::Address(AddressWidth::Selector(name))
            | Kind::VariableBytes { length: name }
            | Kind::VariableArray { length: name, .. }
            | Kind::NestedList { length: name, .. } => Some(name),
            _ => None,
        }
    }
}

const fn same(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }

    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }

    true
}

const fn valid_width(width: usize) -> bool {
    matches!(width, 1 | 2 | 4 | 8)
}

/// Index of the field called `name`, searching only the fields before `end`.
pub const fn position(fields: &[Field], end: usize, name: &str) -> Option<usize> {
    let mut i = 0;
    while i < end && i < fields.len() {
        if same(fields[i].name, name) {
            return Some(i);
        }
        i += 1;
    }

    None
}

/// Check that every reference resolves to an earlier, wire-decoded unsigned
/// integer and that every width is one the codec can handle.
pub const fn validate(fields: &[Field]) -> Result<(), SchemaError> {
    let mut i = 0;
    while i < fields.len() {
        let field = &fields[i];

        match field.kind {
            Kind::Uint(width) => {
                if !valid_width(width) {
                    return Err(SchemaError::InvalidWidth {
                        field: field.name,
                        width,
                    });
                }
            }
            Kind::Address(AddressWidth::Literal(width)) => {
                if width != 4 && width != 16 {
                    return Err(SchemaError::InvalidWidth {
                        field: field.name,
                        width,
                    });
                }
            }
            Kind::VariableArray { width, .. } => {
                if !valid_width(width) {
                    return Err(SchemaError::InvalidWidth {
                        field: field.name,
                        width,
                    });
                }
            }
            Kind::NestedList { element, .. } => {
                if let Err(err) = validate(element) {
                    return Err(err);
                }
            }
            Kind::Bytes(_)
            | Kind::Address(AddressWidth::Selector(_))
            | Kind::VariableBytes { .. } => {}
        }

        if field.derived && !matches!(field.kind, Kind::Uint(_)) {
            return Err(SchemaError::DerivedNotUint { field: field.name });
        }

        if let Some(reference) = field.reference() {
            match position(fields, i, reference) {
                Some(index) => {
                    let target = &fields[index];
                    if target.derived || !matches!(target.kind, Kind::Uint(_)) {
                        return Err(SchemaError::ReferenceNotUint {
                            field: field.name,
                            reference,
                        });
                    }
                }
                None => {
                    if position(fields, fields.len(), reference).is_some() {
                        return Err(SchemaError::ForwardReference {
                            field: field.name,
                            reference,
                        });
                    }

                    return Err(SchemaError::UnresolvedReference {
                        field: field.name,
                        reference,
                    });
                }
            }
        }

        i += 1;
    }

    Ok(())
}

/// Encoded size of a schema made only of fixed width fields, `None` if any field
/// depends on decoded data.
#[cfg(test)]
pub(crate) const fn fixed_size(fields: &[Field]) -> Option<usize> {
    let mut size = 0;
    let mut i = 0;
    while i < fields.len() {
        let field = &fields[i];
        if !field.derived {
            size += match field.kind {
                Kind::Uint(width) => width,
                Kind::Bytes(len) => {
                    if field.padded {
                        len + xdr::padding(len)
                    } else {
                        len
                    }
                }
                Kind::Address(AddressWidth::Literal(width)) => width,
                _ => return None,
            };
        }
        i += 1;
    }

    Some(size)
}
