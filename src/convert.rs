//! Conversion between `serde` types and host values.
//!
//! Structs and maps become plain objects, sequences and tuples become arrays,
//! byte strings become array buffers, and `None` or unit become null. Enums are
//! externally tagged: a unit variant is its name, any other variant is an
//! object with the variant name as its single key. [`from_value`] reads the
//! same shapes back.

use std::rc::Rc;

use serde::de::{DeserializeSeed, Visitor};

use crate::error::{Error, Result};
use crate::value::{ObjectKind, ObjectRef, Value};

/// Converts `v` into a fresh value graph. The result never shares objects.
pub fn to_value<T>(v: &T) -> Result<Value>
where
    T: ?Sized + ::serde::Serialize,
{
    v.serialize(ValueSerializer)
}

pub struct ValueSerializer;

pub struct ArrayBuilder {
    array: ObjectRef,
    index: u32,
}

impl ArrayBuilder {
    fn new(len: usize) -> Self {
        Self {
            array: ObjectRef::array(u32::try_from(len).unwrap_or(0)),
            index: 0,
        }
    }

    fn push<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        let value = value.serialize(ValueSerializer)?;
        self.array.set_index(self.index, value);
        self.index = self
            .index
            .checked_add(1)
            .ok_or_else(|| Error::Generic("sequence too long".into()))?;
        Ok(())
    }
}

impl ::serde::ser::SerializeSeq for ArrayBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Object(self.array))
    }
}

impl ::serde::ser::SerializeTuple for ArrayBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Object(self.array))
    }
}

impl ::serde::ser::SerializeTupleStruct for ArrayBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Object(self.array))
    }
}

pub struct ObjectBuilder {
    object: ObjectRef,
    pending_key: Option<String>,
}

impl ObjectBuilder {
    fn new() -> Self {
        Self {
            object: ObjectRef::plain(),
            pending_key: None,
        }
    }
}

impl ::serde::ser::SerializeMap for ObjectBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        self.pending_key = Some(property_key(key.serialize(ValueSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Error::Generic("map value without a key".into()))?;
        self.object.set(&key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Object(self.object))
    }
}

impl ::serde::ser::SerializeStruct for ObjectBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        self.object.set(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Object(self.object))
    }
}

/// Wraps the payload of a tuple or struct variant in `{ variant: payload }`.
pub struct VariantBuilder<B> {
    variant: &'static str,
    inner: B,
}

fn wrap_variant(variant: &'static str, payload: Value) -> Value {
    let outer = ObjectRef::plain();
    outer.set(variant, payload);
    Value::Object(outer)
}

impl ::serde::ser::SerializeTupleVariant for VariantBuilder<ArrayBuilder> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        self.inner.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(wrap_variant(self.variant, Value::Object(self.inner.array)))
    }
}

impl ::serde::ser::SerializeStructVariant for VariantBuilder<ObjectBuilder> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ::serde::Serialize,
    {
        ::serde::ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Value> {
        Ok(wrap_variant(self.variant, Value::Object(self.inner.object)))
    }
}

fn property_key(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.to_string()),
        Value::Int32(v) => Ok(v.to_string()),
        Value::Uint32(v) => Ok(v.to_string()),
        Value::Number(v) => Ok(v.to_string()),
        Value::Bool(v) => Ok(v.to_string()),
        other => Err(Error::Generic(format!(
            "map key must be a string or number, got {other:?}"
        ))),
    }
}

fn integer(v: i64) -> Value {
    match i32::try_from(v) {
        Ok(small) => Value::Int32(small),
        Err(_) => Value::Number(v as f64),
    }
}

fn unsigned(v: u64) -> Value {
    match u32::try_from(v) {
        Ok(small) => Value::Uint32(small),
        Err(_) => Value::Number(v as f64),
    }
}

impl ::serde::ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = ArrayBuilder;

    type SerializeTuple = ArrayBuilder;

    type SerializeTupleStruct = ArrayBuilder;

    type SerializeTupleVariant = VariantBuilder<ArrayBuilder>;

    type SerializeMap = ObjectBuilder;

    type SerializeStruct = ObjectBuilder;

    type SerializeStructVariant = VariantBuilder<ObjectBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Int32(i32::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Int32(i32::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Int32(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(integer(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Uint32(u32::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Uint32(u32::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::Uint32(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(unsigned(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::Number(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Number(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::from(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::string(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Object(ObjectRef::array_buffer(v.to_vec())))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Value>
    where
        T: ::serde::Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::string(variant))
    }

    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, value: &T) -> Result<Value>
    where
        T: ::serde::Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value>
    where
        T: ::serde::Serialize,
    {
        let payload = value.serialize(self)?;
        Ok(wrap_variant(variant, payload))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(ArrayBuilder::new(len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        Ok(ArrayBuilder::new(len))
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(ArrayBuilder::new(len))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Ok(VariantBuilder {
            variant,
            inner: ArrayBuilder::new(len),
        })
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(ObjectBuilder::new())
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self::SerializeStruct> {
        Ok(ObjectBuilder::new())
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Ok(VariantBuilder {
            variant,
            inner: ObjectBuilder::new(),
        })
    }
}

/// Nesting allowed while reading a value graph into a Rust type. Cyclic
/// graphs run into it instead of recursing forever.
pub const RECURSION_LIMIT: usize = 128;

/// Reads a Rust value back out of a value graph.
pub fn from_value<T>(value: &Value) -> Result<T>
where
    T: ::serde::de::DeserializeOwned,
{
    T::deserialize(ValueDeserializer::new(value.clone()))
}

pub struct ValueDeserializer {
    value: Value,
    remaining_depth: usize,
}

impl ValueDeserializer {
    pub fn new(value: Value) -> Self {
        Self::with_depth(value, RECURSION_LIMIT)
    }

    fn with_depth(value: Value, remaining_depth: usize) -> Self {
        Self {
            value,
            remaining_depth,
        }
    }
}

fn nested(depth: usize) -> Result<usize> {
    depth
        .checked_sub(1)
        .ok_or_else(|| Error::Generic("recursion limit exceeded".into()))
}

/// Integral numbers are offered as integers so integer fields accept them;
/// float visitors take integers too.
fn visit_number<'de, V>(v: f64, visitor: V) -> Result<V::Value>
where
    V: Visitor<'de>,
{
    if v.fract() == 0.0 {
        if v >= i64::MIN as f64 && v < i64::MAX as f64 {
            return visitor.visit_i64(v as i64);
        }
        if v >= 0.0 && v <= u64::MAX as f64 {
            return visitor.visit_u64(v as u64);
        }
    }
    visitor.visit_f64(v)
}

/// What an object looks like to a `serde` visitor.
enum Shape {
    Seq(u32),
    Map,
    Bytes(Vec<u8>),
    Number(f64),
    Str(Rc<str>),
    Bool(bool),
    Unsupported(&'static str),
}

fn shape_of(object: &ObjectRef) -> Shape {
    match &object.borrow().kind {
        ObjectKind::Array(array) => Shape::Seq(array.length),
        ObjectKind::Plain => Shape::Map,
        ObjectKind::ArrayBuffer(buffer) => {
            Shape::Bytes(buffer.contents.clone().unwrap_or_default())
        }
        ObjectKind::Date(t) | ObjectKind::BoxedNumber(t) => Shape::Number(*t),
        ObjectKind::BoxedString(s) => Shape::Str(s.clone()),
        ObjectKind::BoxedBoolean(b) => Shape::Bool(*b),
        other => Shape::Unsupported(other.name()),
    }
}

fn visit_object<'de, V>(object: ObjectRef, depth: usize, visitor: V) -> Result<V::Value>
where
    V: Visitor<'de>,
{
    match shape_of(&object) {
        Shape::Seq(length) => visitor.visit_seq(DeserializeArray {
            array: object,
            index: 0,
            length,
            depth: nested(depth)?,
        }),
        Shape::Map => visitor.visit_map(DeserializeObject {
            keys: object.own_named_keys().into_iter(),
            object,
            pending: None,
            depth: nested(depth)?,
        }),
        Shape::Bytes(bytes) => visitor.visit_byte_buf(bytes),
        Shape::Number(v) => visit_number(v, visitor),
        Shape::Str(s) => visitor.visit_str(&s),
        Shape::Bool(b) => visitor.visit_bool(b),
        Shape::Unsupported(name) => Err(Error::Generic(format!(
            "{name} cannot be read into a Rust value"
        ))),
    }
}

impl<'de> ::serde::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Empty | Value::Undefined | Value::Null => visitor.visit_unit(),
            Value::Bool(v) => visitor.visit_bool(v),
            Value::Int32(v) => visitor.visit_i32(v),
            Value::Uint32(v) => visitor.visit_u32(v),
            Value::Number(v) => visit_number(v, visitor),
            Value::String(s) => visitor.visit_str(&s),
            Value::Object(object) => visit_object(object, self.remaining_depth, visitor),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if matches!(self.value, Value::Empty | Value::Undefined | Value::Null) {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V>(self, _: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _: &'static str,
        _: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::String(variant) => visitor.visit_enum(DeserializeEnum {
                variant,
                payload: None,
                depth: self.remaining_depth,
            }),
            Value::Object(object) => {
                let mut keys = object.own_property_names();
                if keys.len() != 1 {
                    return Err(Error::Generic(format!(
                        "expected an object with a single key for an enum, got {} keys",
                        keys.len()
                    )));
                }
                let variant = keys.remove(0);
                let payload = object
                    .get(&variant)
                    .map_err(Error::Script)?
                    .unwrap_or(Value::Undefined);
                visitor.visit_enum(DeserializeEnum {
                    variant,
                    payload: Some(payload),
                    depth: nested(self.remaining_depth)?,
                })
            }
            other => Err(Error::Generic(format!(
                "expected a string or an object for an enum, got {other:?}"
            ))),
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    ::serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier
    }
}

/// Elements `0..length`; missing indices read as undefined.
struct DeserializeArray {
    array: ObjectRef,
    index: u32,
    length: u32,
    depth: usize,
}

impl<'de> ::serde::de::SeqAccess<'de> for DeserializeArray {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.index >= self.length {
            return Ok(None);
        }
        let element = self.array.get_index(self.index).unwrap_or(Value::Undefined);
        self.index += 1;
        seed.deserialize(ValueDeserializer::with_depth(element, self.depth))
            .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some((self.length - self.index) as usize)
    }
}

/// Enumerable named properties in insertion order.
struct DeserializeObject {
    object: ObjectRef,
    keys: std::vec::IntoIter<Rc<str>>,
    pending: Option<Value>,
    depth: usize,
}

impl<'de> ::serde::de::MapAccess<'de> for DeserializeObject {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        let Some(key) = self.keys.next() else {
            return Ok(None);
        };
        let value = self
            .object
            .get(&key)
            .map_err(Error::Script)?
            .unwrap_or(Value::Undefined);
        self.pending = Some(value);
        seed.deserialize(KeyDeserializer(key)).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let value = self
            .pending
            .take()
            .ok_or_else(|| Error::Generic("map value without a key".into()))?;
        seed.deserialize(ValueDeserializer::with_depth(value, self.depth))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.keys.len())
    }
}

struct DeserializeEnum {
    variant: Rc<str>,
    payload: Option<Value>,
    depth: usize,
}

impl<'de> ::serde::de::EnumAccess<'de> for DeserializeEnum {
    type Error = Error;

    type Variant = DeserializeEnumVariant;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(KeyDeserializer(self.variant))?;
        Ok((
            variant,
            DeserializeEnumVariant {
                payload: self.payload,
                depth: self.depth,
            },
        ))
    }
}

struct DeserializeEnumVariant {
    payload: Option<Value>,
    depth: usize,
}

impl DeserializeEnumVariant {
    fn into_payload(self) -> Result<ValueDeserializer> {
        let value = self
            .payload
            .ok_or_else(|| Error::Generic("enum variant is missing its payload".into()))?;
        Ok(ValueDeserializer::with_depth(value, self.depth))
    }
}

impl<'de> ::serde::de::VariantAccess<'de> for DeserializeEnumVariant {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.payload {
            None | Some(Value::Null) | Some(Value::Undefined) => Ok(()),
            Some(other) => Err(Error::Generic(format!(
                "unit variant has a payload: {other:?}"
            ))),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self.into_payload()?)
    }

    fn tuple_variant<V>(self, _: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        ::serde::Deserializer::deserialize_seq(self.into_payload()?, visitor)
    }

    fn struct_variant<V>(self, _: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        ::serde::Deserializer::deserialize_map(self.into_payload()?, visitor)
    }
}

/// Property names. They are strings on the wire, so numeric and boolean keys
/// are parsed back when the target type asks for them.
struct KeyDeserializer(Rc<str>);

macro_rules! parse_key {
    ($($method:ident => $visit:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: Visitor<'de>,
            {
                match self.0.parse::<$ty>() {
                    Ok(v) => visitor.$visit(v),
                    Err(_) => visitor.visit_str(&self.0),
                }
            }
        )*
    };
}

impl<'de> ::serde::Deserializer<'de> for KeyDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_str(&self.0)
    }

    parse_key! {
        deserialize_bool => visit_bool(bool),
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_f32 => visit_f32(f32),
        deserialize_f64 => visit_f64(f64),
    }

    fn deserialize_newtype_struct<V>(self, _: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    ::serde::forward_to_deserialize_any! {
        i128 u128 char str string bytes byte_buf option unit unit_struct seq
        tuple tuple_struct map struct enum identifier ignored_any
    }
}
