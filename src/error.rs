/// Defects in a field schema table. They are never caused by input data, the
/// static tables are checked at compile time and dynamic ones at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("field {field} references {reference} which is not declared")]
    UnresolvedReference {
        field: &'static str,
        reference: &'static str,
    },

    #[error("field {field} references {reference} which is declared after it")]
    ForwardReference {
        field: &'static str,
        reference: &'static str,
    },

    #[error("field {field} references {reference} which is not a decoded unsigned integer")]
    ReferenceNotUint {
        field: &'static str,
        reference: &'static str,
    },

    #[error("field {field} has unsupported width {width}")]
    InvalidWidth { field: &'static str, width: usize },

    #[error("derived field {field} must be an unsigned integer")]
    DerivedNotUint { field: &'static str },

    #[error("value of field {field} does not match its schema")]
    ValueMismatch { field: &'static str },

    #[error("value of field {field} is missing")]
    MissingValue { field: &'static str },
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of data reading {field}, need {need} bytes but {remaining} remaining")]
    UnexpectedEof {
        field: &'static str,
        need: usize,
        remaining: usize,
    },

    #[error("{field} declares {declared} but {actual} found")]
    LengthMismatch {
        field: &'static str,
        declared: u64,
        actual: u64,
    },

    #[error("length {length} of {field} exceeds the maximum {max}")]
    LengthTooLarge {
        field: &'static str,
        length: u64,
        max: usize,
    },

    #[error("invalid discriminant {value} in {field}")]
    InvalidDiscriminant { field: &'static str, value: u64 },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("unsupported datagram version {0}")]
    UnsupportedVersion(u32),

    /// A record body failed to decode. The cursor has already been moved past
    /// the declared length of the record, so the stream is still usable.
    #[error("malformed {name} record (type {type_id}), {source}")]
    Record {
        type_id: u32,
        name: &'static str,
        source: Box<Error>,
    },
}

impl Error {
    /// Whether decoding can continue with the next record of the same stream.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Record { .. })
    }

    /// The error underneath any record context.
    pub fn cause(&self) -> &Error {
        match self {
            Error::Record { source, .. } => source.cause(),
            err => err,
        }
    }
}
