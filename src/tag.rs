//! The closed set of single byte wire discriminants.
//!
//! [`Tag::Hole`] (`-`) extends the classic tag table. It marks a missing index
//! inside a dense array and is only valid in version 1 streams and later.
//! Decoders that predate it reject it as an unknown tag.

/// Wire format version written by the serializer.
///
/// Version 0 streams carry no version marker and use eagerly constructed
/// composites with no reference support.
pub const LATEST_VERSION: u32 = 1;

/// Tag preceding every value in the stream (and the version marker).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Never valid; decoding fails when it is read.
    Invalid = b'!',
    /// Skipped by the decoder. Used to align UTF-16 payloads.
    Padding = b'\0',
    Undefined = b'_',
    Null = b'0',
    True = b'T',
    False = b'F',
    /// varuint32 byte length, UTF-8 bytes.
    String = b'S',
    /// varuint32 byte length, UTF-16LE code units starting at an even offset.
    StringUChar = b'c',
    /// zig-zag varuint32.
    Int32 = b'I',
    Uint32 = b'U',
    /// fixed 8 byte double.
    Date = b'D',
    Number = b'N',
    /// varuint32 width, height, pixel length, then raw pixels.
    ImageData = b'#',
    /// varuint32 number of properties.
    Object = b'{',
    /// varuint32 number of properties, length.
    SparseArray = b'@',
    /// varuint32 number of properties, length.
    DenseArray = b'$',
    /// pattern as a string payload, varuint32 flags.
    RegExp = b'R',
    /// varuint32 byte length, raw bytes.
    ArrayBuffer = b'B',
    /// varuint32 transfer index.
    ArrayBufferTransfer = b't',
    /// sub-tag, varuint32 byte offset, byte length. The buffer precedes it.
    ArrayBufferView = b'V',
    /// varuint32 reference id.
    ObjectReference = b'^',
    GenerateFreshObject = b'o',
    /// varuint32 length.
    GenerateFreshSparseArray = b'a',
    /// varuint32 length.
    GenerateFreshDenseArray = b'A',
    /// varuint32 size of the reference table at this point.
    ReferenceCount = b'?',
    StringObject = b's',
    NumberObject = b'n',
    TrueObject = b'y',
    FalseObject = b'x',
    /// An index with no element inside a dense array.
    Hole = b'-',
    /// varuint32 format version. Only valid as the first byte.
    Version = 0xff,
}

impl Tag {
    /// Parses a tag byte. Unknown bytes yield `None`.
    pub fn from_u8(byte: u8) -> Option<Self> {
        let tag = match byte {
            b'!' => Self::Invalid,
            b'\0' => Self::Padding,
            b'_' => Self::Undefined,
            b'0' => Self::Null,
            b'T' => Self::True,
            b'F' => Self::False,
            b'S' => Self::String,
            b'c' => Self::StringUChar,
            b'I' => Self::Int32,
            b'U' => Self::Uint32,
            b'D' => Self::Date,
            b'N' => Self::Number,
            b'#' => Self::ImageData,
            b'{' => Self::Object,
            b'@' => Self::SparseArray,
            b'$' => Self::DenseArray,
            b'R' => Self::RegExp,
            b'B' => Self::ArrayBuffer,
            b't' => Self::ArrayBufferTransfer,
            b'V' => Self::ArrayBufferView,
            b'^' => Self::ObjectReference,
            b'o' => Self::GenerateFreshObject,
            b'a' => Self::GenerateFreshSparseArray,
            b'A' => Self::GenerateFreshDenseArray,
            b'?' => Self::ReferenceCount,
            b's' => Self::StringObject,
            b'n' => Self::NumberObject,
            b'y' => Self::TrueObject,
            b'x' => Self::FalseObject,
            b'-' => Self::Hole,
            0xff => Self::Version,
            _ => return None,
        };
        Some(tag)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Tags that only exist from version 1 onwards.
    pub fn requires_references(self) -> bool {
        matches!(
            self,
            Self::ObjectReference
                | Self::GenerateFreshObject
                | Self::GenerateFreshSparseArray
                | Self::GenerateFreshDenseArray
                | Self::ArrayBuffer
                | Self::ArrayBufferView
                | Self::ArrayBufferTransfer
                | Self::Hole
        )
    }
}

/// Element kind of an `ArrayBufferView`, written as one byte after the view tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Int8 = b'b',
    Uint8 = b'B',
    Uint8Clamped = b'C',
    Int16 = b'w',
    Uint16 = b'W',
    Int32 = b'd',
    Uint32 = b'D',
    Float32 = b'f',
    Float64 = b'F',
    DataView = b'?',
}

impl ViewKind {
    pub fn from_u8(byte: u8) -> Option<Self> {
        let kind = match byte {
            b'b' => Self::Int8,
            b'B' => Self::Uint8,
            b'C' => Self::Uint8Clamped,
            b'w' => Self::Int16,
            b'W' => Self::Uint16,
            b'd' => Self::Int32,
            b'D' => Self::Uint32,
            b'f' => Self::Float32,
            b'F' => Self::Float64,
            b'?' => Self::DataView,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Size of one element in bytes. A `DataView` addresses single bytes.
    pub fn element_size(self) -> u32 {
        match self {
            Self::Int8 | Self::Uint8 | Self::Uint8Clamped | Self::DataView => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}
