//! The host object model the engine reads from and writes into.
//!
//! Composites live behind [`ObjectRef`], a shared handle whose identity (not
//! contents) is what the reference tables key on. Graphs may be cyclic; a
//! cyclic graph keeps itself alive until one of its edges is cleared.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::tag::ViewKind;

/// An exception raised by host code, such as a throwing getter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception(pub String);

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Getter backing an accessor property.
pub type Getter = Rc<dyn Fn() -> Result<Value, Exception>>;

/// A host value.
#[derive(Clone)]
pub enum Value {
    /// No value at all. Cannot be cloned.
    Empty,
    Undefined,
    Null,
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Self::String(Rc::from(s))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric value of any number variant.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int32(v) => Some(f64::from(v)),
            Self::Uint32(v) => Some(f64::from(v)),
            Self::Number(v) => Some(v),
            _ => None,
        }
    }

    /// Structural equality that also requires both graphs to share and cycle
    /// in the same places.
    ///
    /// Walks both graphs with an explicit work list, pairing objects on first
    /// sight; a later pairing that contradicts an earlier one is a mismatch.
    pub fn deep_equals(&self, other: &Value) -> bool {
        let mut pairs: HashMap<ObjectId, ObjectId> = HashMap::new();
        let mut seen_right: HashSet<ObjectId> = HashSet::new();
        let mut work = vec![(self.clone(), other.clone())];
        while let Some((a, b)) = work.pop() {
            let (a, b) = match (a, b) {
                (Value::Object(a), Value::Object(b)) => (a, b),
                (a, b) => {
                    if !primitive_equals(&a, &b) {
                        return false;
                    }
                    continue;
                }
            };
            match pairs.get(&a.id()) {
                Some(&mapped) if mapped == b.id() => continue,
                Some(_) => return false,
                None => {
                    if !seen_right.insert(b.id()) {
                        return false;
                    }
                    pairs.insert(a.id(), b.id());
                }
            }
            if !shallow_equals(&a, &b, &mut work) {
                return false;
            }
        }
        true
    }
}

fn primitive_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Empty, Value::Empty)
        | (Value::Undefined, Value::Undefined)
        | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int32(x), Value::Int32(y)) => x == y,
        (Value::Uint32(x), Value::Uint32(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => number_equals(*x, *y),
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

fn number_equals(x: f64, y: f64) -> bool {
    x == y || (x.is_nan() && y.is_nan())
}

fn shallow_equals(a: &ObjectRef, b: &ObjectRef, work: &mut Vec<(Value, Value)>) -> bool {
    let same_kind = {
        let (x, y) = (a.borrow(), b.borrow());
        let same = match (&x.kind, &y.kind) {
            (ObjectKind::Plain, ObjectKind::Plain) => true,
            (ObjectKind::Array(p), ObjectKind::Array(q)) => {
                if p.length != q.length || !p.elements.keys().eq(q.elements.keys()) {
                    return false;
                }
                for (l, r) in p.elements.values().zip(q.elements.values()) {
                    work.push((l.clone(), r.clone()));
                }
                true
            }
            (ObjectKind::Date(p), ObjectKind::Date(q)) => number_equals(*p, *q),
            (ObjectKind::RegExp(p), ObjectKind::RegExp(q)) => p == q,
            (ObjectKind::BoxedString(p), ObjectKind::BoxedString(q)) => p == q,
            (ObjectKind::BoxedNumber(p), ObjectKind::BoxedNumber(q)) => number_equals(*p, *q),
            (ObjectKind::BoxedBoolean(p), ObjectKind::BoxedBoolean(q)) => p == q,
            (ObjectKind::ArrayBuffer(p), ObjectKind::ArrayBuffer(q)) => p == q,
            (ObjectKind::ArrayBufferView(p), ObjectKind::ArrayBufferView(q)) => {
                if p.kind != q.kind || p.byte_offset != q.byte_offset {
                    return false;
                }
                work.push((
                    Value::Object(p.buffer.clone()),
                    Value::Object(q.buffer.clone()),
                ));
                true
            }
            (ObjectKind::ImageData(p), ObjectKind::ImageData(q)) => p == q,
            (ObjectKind::Function(p), ObjectKind::Function(q)) => p == q,
            (ObjectKind::Host(p), ObjectKind::Host(q)) => p == q,
            (ObjectKind::Error(p), ObjectKind::Error(q)) => p == q,
            _ => false,
        };
        same
    };
    if !same_kind {
        return false;
    }
    if a.view_byte_length() != b.view_byte_length() {
        return false;
    }
    let names_a = a.own_named_keys();
    if names_a != b.own_named_keys() {
        return false;
    }
    for name in names_a {
        match (a.get(&name), b.get(&name)) {
            (Ok(Some(l)), Ok(Some(r))) => work.push((l, r)),
            _ => return false,
        }
    }
    true
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::Int32(v) => write!(f, "Int32({v})"),
            Self::Uint32(v) => write!(f, "Uint32({v})"),
            Self::Number(v) => write!(f, "Number({v})"),
            Self::String(v) => write!(f, "String({v:?})"),
            Self::Object(o) => o.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Uint32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(Rc::from(v))
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Self::Object(v)
    }
}

/// Identity of an object for as long as it is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

/// Shared handle to a heap object.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    pub fn new(kind: ObjectKind) -> Self {
        Self(Rc::new(RefCell::new(Object {
            kind,
            properties: PropertyMap::default(),
        })))
    }

    pub fn plain() -> Self {
        Self::new(ObjectKind::Plain)
    }

    pub fn array(length: u32) -> Self {
        Self::new(ObjectKind::Array(ArrayStorage {
            length,
            elements: BTreeMap::new(),
        }))
    }

    pub fn date(time: f64) -> Self {
        Self::new(ObjectKind::Date(time))
    }

    pub fn regexp(pattern: &str, flags: RegExpFlags) -> Self {
        Self::new(ObjectKind::RegExp(RegExp {
            pattern: Rc::from(pattern),
            flags,
        }))
    }

    pub fn array_buffer(bytes: Vec<u8>) -> Self {
        Self::new(ObjectKind::ArrayBuffer(ArrayBuffer {
            contents: Some(bytes),
        }))
    }

    /// A view over `buffer`. Returns `None` when the range is out of bounds
    /// or misaligned for `kind`.
    pub fn view(kind: ViewKind, buffer: &ObjectRef, byte_offset: u32, byte_length: u32) -> Option<Self> {
        let buffer_len = buffer.buffer_byte_length()?;
        let size = kind.element_size();
        let end = byte_offset.checked_add(byte_length)?;
        if end as usize > buffer_len || byte_offset % size != 0 || byte_length % size != 0 {
            return None;
        }
        Some(Self::new(ObjectKind::ArrayBufferView(ArrayBufferView {
            kind,
            buffer: buffer.clone(),
            byte_offset,
            byte_length,
        })))
    }

    /// Image pixels; `data` must hold `width * height * 4` bytes.
    pub fn image_data(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if data.len() != expected {
            return None;
        }
        Some(Self::new(ObjectKind::ImageData(ImageData {
            width,
            height,
            data,
        })))
    }

    pub fn boxed_string(v: &str) -> Self {
        Self::new(ObjectKind::BoxedString(Rc::from(v)))
    }

    pub fn boxed_number(v: f64) -> Self {
        Self::new(ObjectKind::BoxedNumber(v))
    }

    pub fn boxed_boolean(v: bool) -> Self {
        Self::new(ObjectKind::BoxedBoolean(v))
    }

    pub fn error(message: &str) -> Self {
        Self::new(ObjectKind::Error(Rc::from(message)))
    }

    pub fn function(name: &str) -> Self {
        Self::new(ObjectKind::Function(Rc::from(name)))
    }

    /// An opaque host object such as a DOM node or window.
    pub fn host(class: &str) -> Self {
        Self::new(ObjectKind::Host(Rc::from(class)))
    }

    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    pub fn array_length(&self) -> Option<u32> {
        match &self.borrow().kind {
            ObjectKind::Array(a) => Some(a.length),
            _ => None,
        }
    }

    /// Byte length of an array buffer; zero once neutered.
    pub fn buffer_byte_length(&self) -> Option<usize> {
        match &self.borrow().kind {
            ObjectKind::ArrayBuffer(b) => Some(b.contents.as_ref().map_or(0, Vec::len)),
            _ => None,
        }
    }

    pub fn is_neutered(&self) -> bool {
        matches!(&self.borrow().kind, ObjectKind::ArrayBuffer(b) if b.contents.is_none())
    }

    /// Copy of an array buffer's bytes, `None` for other objects or a
    /// neutered buffer.
    pub fn buffer_bytes(&self) -> Option<Vec<u8>> {
        match &self.borrow().kind {
            ObjectKind::ArrayBuffer(b) => b.contents.clone(),
            _ => None,
        }
    }

    /// Takes the contents out of an array buffer, leaving it neutered. Every
    /// view over it observes a zero byte length from then on.
    pub fn neuter(&self) -> Option<Vec<u8>> {
        match &mut self.borrow_mut().kind {
            ObjectKind::ArrayBuffer(b) => b.contents.take(),
            _ => None,
        }
    }

    /// Byte length of a view, zero when its buffer has been neutered.
    pub fn view_byte_length(&self) -> Option<u32> {
        let view = match &self.borrow().kind {
            ObjectKind::ArrayBufferView(v) => v.clone(),
            _ => return None,
        };
        if view.buffer.is_neutered() {
            Some(0)
        } else {
            Some(view.byte_length)
        }
    }

    /// Bytes a view currently covers.
    pub fn view_bytes(&self) -> Option<Vec<u8>> {
        let view = match &self.borrow().kind {
            ObjectKind::ArrayBufferView(v) => v.clone(),
            _ => return None,
        };
        let bytes = view.buffer.buffer_bytes().unwrap_or_default();
        let start = view.byte_offset as usize;
        let end = start + view.byte_length as usize;
        Some(bytes.get(start..end).map(<[u8]>::to_vec).unwrap_or_default())
    }

    /// Defines an enumerable data property, or an element for array indices.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut obj = self.borrow_mut();
        if let ObjectKind::Array(array) = &mut obj.kind {
            if let Some(index) = parse_index(name) {
                array.set(index, value);
                return;
            }
        }
        obj.properties.insert(name, Property::data(value, true));
    }

    /// Defines a property with explicit attributes.
    pub fn define(&self, name: &str, property: Property) {
        self.borrow_mut().properties.insert(name, property);
    }

    /// Sets an array element, growing the length as needed.
    pub fn set_index(&self, index: u32, value: impl Into<Value>) {
        if let ObjectKind::Array(array) = &mut self.borrow_mut().kind {
            array.set(index, value.into());
        }
    }

    /// Reads an own property, running its getter if it is an accessor.
    /// Returns `Ok(None)` when the property does not exist.
    pub fn get(&self, name: &str) -> Result<Option<Value>, Exception> {
        let slot = {
            let obj = self.borrow();
            if let ObjectKind::Array(array) = &obj.kind {
                if let Some(index) = parse_index(name) {
                    return Ok(array.elements.get(&index).cloned());
                }
            }
            match obj.properties.get(name) {
                Some(p) => p.slot.clone(),
                None => return Ok(None),
            }
        };
        match slot {
            Slot::Data(v) => Ok(Some(v)),
            Slot::Accessor(getter) => getter().map(Some),
        }
    }

    /// Whether an own property exists, without running getters.
    pub fn has_own(&self, name: &str) -> bool {
        let obj = self.borrow();
        if let ObjectKind::Array(array) = &obj.kind {
            if let Some(index) = parse_index(name) {
                return array.elements.contains_key(&index);
            }
        }
        obj.properties.get(name).is_some()
    }

    pub fn get_index(&self, index: u32) -> Option<Value> {
        match &self.borrow().kind {
            ObjectKind::Array(array) => array.elements.get(&index).cloned(),
            _ => None,
        }
    }

    /// Own enumerable property names: array indices ascending, then named
    /// properties in insertion order.
    pub fn own_property_names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = match &self.borrow().kind {
            ObjectKind::Array(array) => array
                .elements
                .keys()
                .map(|i| Rc::from(i.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        names.extend(self.own_named_keys());
        names
    }

    /// Enumerable non-index property names in insertion order.
    pub fn own_named_keys(&self) -> Vec<Rc<str>> {
        self.borrow().properties.enumerable_keys()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.0.try_borrow() {
            Ok(obj) => obj.kind.name(),
            Err(_) => "<borrowed>",
        };
        write!(f, "{kind}@{:#x}", self.id().0)
    }
}

/// Returns the index for canonical array index names (`"0"`, `"17"`, not
/// `"017"`), excluding `2^32 - 1`.
pub fn parse_index(name: &str) -> Option<u32> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<u32>().ok().filter(|&i| i != u32::MAX)
}

pub struct Object {
    pub kind: ObjectKind,
    pub properties: PropertyMap,
}

pub enum ObjectKind {
    Plain,
    Array(ArrayStorage),
    Date(f64),
    RegExp(RegExp),
    BoxedString(Rc<str>),
    BoxedNumber(f64),
    BoxedBoolean(bool),
    ArrayBuffer(ArrayBuffer),
    ArrayBufferView(ArrayBufferView),
    ImageData(ImageData),
    Function(Rc<str>),
    Host(Rc<str>),
    Error(Rc<str>),
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "Object",
            Self::Array(_) => "Array",
            Self::Date(_) => "Date",
            Self::RegExp(_) => "RegExp",
            Self::BoxedString(_) => "String",
            Self::BoxedNumber(_) => "Number",
            Self::BoxedBoolean(_) => "Boolean",
            Self::ArrayBuffer(_) => "ArrayBuffer",
            Self::ArrayBufferView(_) => "ArrayBufferView",
            Self::ImageData(_) => "ImageData",
            Self::Function(_) => "Function",
            Self::Host(_) => "HostObject",
            Self::Error(_) => "Error",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArrayStorage {
    pub length: u32,
    pub elements: BTreeMap<u32, Value>,
}

impl ArrayStorage {
    pub fn set(&mut self, index: u32, value: Value) {
        self.elements.insert(index, value);
        if index >= self.length {
            self.length = index + 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegExpFlags(u32);

impl RegExpFlags {
    pub const NONE: Self = Self(0);
    pub const GLOBAL: Self = Self(1);
    pub const IGNORE_CASE: Self = Self(2);
    pub const MULTILINE: Self = Self(4);
    const ALL: u32 = 7;

    pub fn from_bits(bits: u32) -> Option<Self> {
        (bits & !Self::ALL == 0).then_some(Self(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for RegExpFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegExp {
    pub pattern: Rc<str>,
    pub flags: RegExpFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayBuffer {
    /// `None` once the buffer has been neutered.
    pub contents: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ArrayBufferView {
    pub kind: ViewKind,
    pub buffer: ObjectRef,
    pub byte_offset: u32,
    pub byte_length: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub enum Slot {
    Data(Value),
    Accessor(Getter),
}

#[derive(Clone)]
pub struct Property {
    pub slot: Slot,
    pub enumerable: bool,
}

impl Property {
    pub fn data(value: impl Into<Value>, enumerable: bool) -> Self {
        Self {
            slot: Slot::Data(value.into()),
            enumerable,
        }
    }

    pub fn accessor(getter: impl Fn() -> Result<Value, Exception> + 'static) -> Self {
        Self {
            slot: Slot::Accessor(Rc::new(getter)),
            enumerable: true,
        }
    }
}

/// Named properties in insertion order.
#[derive(Clone, Default)]
pub struct PropertyMap(IndexMap<Rc<str>, Property>);

impl PropertyMap {
    /// Replacing an existing property keeps its position.
    pub fn insert(&mut self, name: &str, property: Property) {
        match self.0.get_mut(name) {
            Some(existing) => *existing = property,
            None => {
                self.0.insert(Rc::from(name), property);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn enumerable_keys(&self) -> Vec<Rc<str>> {
        self.0
            .iter()
            .filter(|(_, p)| p.enumerable)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl Drop for Object {
    /// Unlinks children onto a work list before they are released, so a long
    /// chain of objects is freed in a loop instead of one nested drop per
    /// link.
    fn drop(&mut self) {
        let mut work = Vec::new();
        self.take_children(&mut work);
        while let Some(child) = work.pop() {
            if let Ok(cell) = Rc::try_unwrap(child.0) {
                let mut object = cell.into_inner();
                object.take_children(&mut work);
            }
        }
    }
}

impl Object {
    fn take_children(&mut self, work: &mut Vec<ObjectRef>) {
        if let ObjectKind::Array(array) = &mut self.kind {
            for (_, value) in std::mem::take(&mut array.elements) {
                if let Value::Object(child) = value {
                    work.push(child);
                }
            }
        }
        for (_, property) in std::mem::take(&mut self.properties.0) {
            if let Slot::Data(Value::Object(child)) = property.slot {
                work.push(child);
            }
        }
    }
}
