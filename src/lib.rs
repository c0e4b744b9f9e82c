#![forbid(unsafe_code)]
//! # Structured clone for cyclic value graphs.
//!
//! Converts a graph of host values into a compact tagged byte stream and back,
//! preserving object identity: two properties that point at one object before
//! encoding point at one object after decoding, and cycles survive intact.
//!
//! - Every value is a tag byte followed by a payload fixed by the tag.
//! - Unsigned integers use base-128 varints; signed 32-bit integers are
//!   zig-zag mapped first. Doubles are eight little endian bytes.
//! - Objects and arrays are opened with one tag, their properties follow as
//!   name/value pairs, and a closing tag carries the property count.
//! - Objects get a reference id the first time they are seen. Later
//!   occurrences, including cycles, are written as references to that id.
//! - Array buffers named in a transfer list are not copied. Their contents
//!   move into a side array and the originals are neutered.
//! - Decoding failures never surface as errors. A stream that does not decode
//!   cleanly yields null.
//!
//! Neither direction recurses on the native stack, so arbitrarily deep input
//! fails with a regular error instead of a stack overflow.

/// Buffer writer and reader.
pub mod buffer;
/// Serializer and deserializer tunables.
pub mod config;
/// Conversion between `serde` types and host values.
pub mod convert;
/// Deserialization types and functions.
pub mod de;
/// Error types and functions.
pub mod error;
/// Classification of host values.
pub mod host;
/// Identity keyed reference tables.
pub mod reference;
/// Serialization types and functions.
pub mod ser;
/// Wire tags.
pub mod tag;
/// The host object model.
pub mod value;
/// Variable length integers.
pub mod varint;

/// Tests for the crate.
#[cfg(test)]
mod tests;

pub use crate::config::{Checkpoints, Options};
pub use crate::de::Deserializer;
pub use crate::error::{Error, Result, Status};
pub use crate::ser::{ArrayBufferContents, SerializedValue, Serializer};
pub use crate::value::{Exception, ObjectRef, Value};

/// Encode a value, moving the buffers in `transfer_list` into the result.
pub fn serialize(value: &Value, transfer_list: &[ObjectRef]) -> Result<SerializedValue> {
    Serializer::new(transfer_list).serialize(value)
}

/// Decode a value; returns [`Value::Null`] when the stream is malformed.
pub fn deserialize(bytes: &[u8], transferred: Vec<ArrayBufferContents>) -> Value {
    Deserializer::new(bytes, transferred).deserialize()
}

/// Encode any `serde` value into a byte vector.
pub fn to_bytes<V>(v: &V) -> Result<Vec<u8>>
where
    V: ?Sized + ::serde::Serialize,
{
    let value = crate::convert::to_value(v)?;
    Ok(serialize(&value, &[])?.bytes)
}

/// Decode bytes produced by [`to_bytes`] into any `serde` type.
pub fn from_bytes<T>(bytes: &[u8]) -> Result<T>
where
    T: ::serde::de::DeserializeOwned,
{
    let value = Deserializer::new(bytes, Vec::new()).try_deserialize()?;
    crate::convert::from_value(&value)
}

/// Get the number of bytes required to encode a value.
pub fn encoded_size(value: &Value) -> Result<usize> {
    Ok(serialize(value, &[])?.bytes.len())
}
