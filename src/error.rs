use crate::value::Exception;

/// Error type for this crate, returned by the serializer.
#[derive(Debug, ::thiserror::Error)]
pub enum Error {
    /// The shape of the input cannot be encoded: empty values, cycles the
    /// reference table cannot see, or nesting beyond the depth limit.
    #[error("{0}")]
    Input(String),

    /// A valid host value this format has no representation for.
    #[error("data clone error: {0}")]
    DataClone(String),

    /// The host raised an exception while a property was read.
    #[error("uncaught exception: {0}")]
    Script(Exception),

    /// A stream read back through [`from_bytes`](crate::from_bytes) did not
    /// decode.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Errors that don't fit into any other category.
    #[error("{0}")]
    Generic(String),
}

/// Result type for this crate.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Terminal status of a serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    InputError,
    DataCloneError,
    ScriptException,
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::Input(_) | Self::Decode(_) | Self::Generic(_) => Status::InputError,
            Self::DataClone(_) => Status::DataCloneError,
            Self::Script(_) => Status::ScriptException,
        }
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }
}

impl ::serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self::Generic(msg.to_string())
    }
}

impl ::serde::de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self::Generic(msg.to_string())
    }
}

/// Why a stream failed to decode. Only used for diagnostics; callers of
/// [`Deserializer::deserialize`](crate::de::Deserializer::deserialize) see a
/// null value instead.
#[derive(Debug, Clone, PartialEq, Eq, ::thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("invalid variable integer encoding")]
    InvalidVarint,

    #[error("invalid string payload")]
    InvalidString,

    #[error("unknown tag {0:#04x}")]
    UnknownTag(u8),

    #[error("invalid tag")]
    InvalidTag,

    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),

    #[error("tag {0:#04x} is not valid in version 0 streams")]
    RequiresVersion(u8),

    #[error("reference count mismatch: expected {expected}, have {actual}")]
    ReferenceCountMismatch { expected: u32, actual: usize },

    #[error("reference {0} is out of range")]
    BadReference(u32),

    #[error("transfer index {0} is out of range")]
    BadTransferIndex(u32),

    #[error("malformed {0}")]
    Malformed(&'static str),

    #[error("composites nested deeper than {0}")]
    TooDeep(usize),

    #[error("value stack underflow")]
    StackUnderflow,

    #[error("stream did not end with exactly one value")]
    Unterminated,
}
