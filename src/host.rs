//! Classification of host values into the wire format's kinds, and the
//! constructors the decoder uses to build host values back.
//!
//! Probes run in a fixed order: primitives, then binary views before binary
//! buffers, both before the generic object kinds. Views are list-like and
//! would otherwise be taken for arrays.

use std::rc::Rc;

use crate::error::DecodeError;
use crate::tag::ViewKind;
use crate::value::{ObjectKind, ObjectRef, RegExpFlags, Value};

/// What a host value is, as far as the encoder is concerned.
#[derive(Debug)]
pub enum Class {
    Empty,
    Undefined,
    Null,
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Number(f64),
    String(Rc<str>),
    ArrayBufferView(ViewInfo),
    ArrayBuffer(ObjectRef),
    /// Any other object; see [`ObjectClass`].
    Object(ObjectRef, ObjectClass),
}

#[derive(Debug, Clone)]
pub struct ViewInfo {
    pub view: ObjectRef,
    pub kind: ViewKind,
    pub buffer: ObjectRef,
    pub byte_offset: u32,
    pub byte_length: u32,
}

#[derive(Debug, Clone)]
pub enum ObjectClass {
    Date(f64),
    BoxedString(Rc<str>),
    BoxedNumber(f64),
    BoxedBoolean(bool),
    Array { length: u32 },
    ImageData { width: u32, height: u32, data: Vec<u8> },
    RegExp { pattern: Rc<str>, flags: RegExpFlags },
    Plain,
    /// Callables, opaque host objects and native errors.
    Uncloneable(String),
}

pub fn classify(value: &Value) -> Class {
    let object = match value {
        Value::Empty => return Class::Empty,
        Value::Undefined => return Class::Undefined,
        Value::Null => return Class::Null,
        Value::Bool(v) => return Class::Bool(*v),
        Value::Int32(v) => return Class::Int32(*v),
        Value::Uint32(v) => return Class::Uint32(*v),
        Value::Number(v) => return Class::Number(*v),
        Value::String(s) => return Class::String(s.clone()),
        Value::Object(o) => o,
    };
    let obj = object.borrow();
    let class = match &obj.kind {
        ObjectKind::ArrayBufferView(v) => {
            return Class::ArrayBufferView(ViewInfo {
                view: object.clone(),
                kind: v.kind,
                buffer: v.buffer.clone(),
                byte_offset: v.byte_offset,
                byte_length: v.byte_length,
            })
        }
        ObjectKind::ArrayBuffer(_) => return Class::ArrayBuffer(object.clone()),
        ObjectKind::Date(t) => ObjectClass::Date(*t),
        ObjectKind::BoxedString(s) => ObjectClass::BoxedString(s.clone()),
        ObjectKind::BoxedNumber(n) => ObjectClass::BoxedNumber(*n),
        ObjectKind::BoxedBoolean(b) => ObjectClass::BoxedBoolean(*b),
        ObjectKind::Array(a) => ObjectClass::Array { length: a.length },
        ObjectKind::ImageData(img) => ObjectClass::ImageData {
            width: img.width,
            height: img.height,
            data: img.data.clone(),
        },
        ObjectKind::RegExp(r) => ObjectClass::RegExp {
            pattern: r.pattern.clone(),
            flags: r.flags,
        },
        ObjectKind::Plain => ObjectClass::Plain,
        ObjectKind::Function(name) => ObjectClass::Uncloneable(format!("function {name}")),
        ObjectKind::Host(class) => ObjectClass::Uncloneable(format!("{class} object")),
        ObjectKind::Error(_) => ObjectClass::Uncloneable("Error object".into()),
    };
    Class::Object(object.clone(), class)
}

/// Whether `s` fits the one byte per character string encoding.
pub fn is_one_byte(s: &str) -> bool {
    s.chars().all(|c| (c as u32) < 0x100)
}

pub fn make_date(time: f64) -> Value {
    Value::Object(ObjectRef::date(time))
}

pub fn make_regexp(pattern: &str, flags: u32) -> Result<Value, DecodeError> {
    let flags = RegExpFlags::from_bits(flags).ok_or(DecodeError::Malformed("regexp flags"))?;
    Ok(Value::Object(ObjectRef::regexp(pattern, flags)))
}

pub fn make_image_data(width: u32, height: u32, pixels: &[u8]) -> Result<Value, DecodeError> {
    ObjectRef::image_data(width, height, pixels.to_vec())
        .map(Value::Object)
        .ok_or(DecodeError::Malformed("image data"))
}

pub fn make_array_buffer(bytes: Vec<u8>) -> Value {
    Value::Object(ObjectRef::array_buffer(bytes))
}

pub fn make_view(
    kind: ViewKind,
    buffer: &Value,
    byte_offset: u32,
    byte_length: u32,
) -> Result<Value, DecodeError> {
    let buffer = buffer
        .as_object()
        .ok_or(DecodeError::Malformed("array buffer view"))?;
    ObjectRef::view(kind, buffer, byte_offset, byte_length)
        .map(Value::Object)
        .ok_or(DecodeError::Malformed("array buffer view"))
}

/// Assigns a decoded property onto a container. Names must be strings.
pub fn set_property(target: &ObjectRef, name: &Value, value: Value) -> Result<(), DecodeError> {
    let name = name.as_str().ok_or(DecodeError::Malformed("property name"))?;
    target.set(name, value);
    Ok(())
}
