use tracing::debug;

use crate::buffer::Reader;
use crate::config::Options;
use crate::error::DecodeError;
use crate::host;
use crate::ser::ArrayBufferContents;
use crate::tag::{Tag, ViewKind};
use crate::value::{ObjectKind, ObjectRef, Value};
use crate::varint;

type Result<T> = ::std::result::Result<T, DecodeError>;

/// Rebuilds a value graph from its encoding.
///
/// Decoding is a flat loop over tags. Containers are created when their
/// opening tag is read and registered right away, so descendants can refer
/// back to them; they are filled in when the matching closing tag pops their
/// properties off the value stack.
#[derive(Debug)]
pub struct Deserializer<'a> {
    reader: Reader<'a>,
    options: Options,
    version: u32,
    stack: Vec<Value>,
    /// Reference ids of containers that are created but not yet filled.
    open: Vec<u32>,
    objects: Vec<Value>,
    transferred: Vec<Option<ArrayBufferContents>>,
    transferred_buffers: Vec<Option<ObjectRef>>,
}

impl<'a> Deserializer<'a> {
    pub fn new(bytes: &'a [u8], transferred: Vec<ArrayBufferContents>) -> Self {
        Self::with_options(Options::default(), bytes, transferred)
    }

    pub fn with_options(
        options: Options,
        bytes: &'a [u8],
        transferred: Vec<ArrayBufferContents>,
    ) -> Self {
        let transferred_buffers = vec![None; transferred.len()];
        Self {
            reader: Reader::new(bytes),
            options,
            version: 0,
            stack: Vec::new(),
            open: Vec::new(),
            objects: Vec::new(),
            transferred: transferred.into_iter().map(Some).collect(),
            transferred_buffers,
        }
    }

    /// Decodes the stream. Any failure yields [`Value::Null`]; the reason is
    /// only logged.
    pub fn deserialize(self) -> Value {
        match self.try_deserialize() {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "deserialization failed");
                Value::Null
            }
        }
    }

    /// Same as [`deserialize`](Self::deserialize) but reports why a stream
    /// was rejected.
    pub fn try_deserialize(mut self) -> Result<Value> {
        self.read_version()?;
        while !self.reader.at_end() {
            self.read_one()?;
        }
        if self.stack.len() != 1 || !self.open.is_empty() {
            return Err(DecodeError::Unterminated);
        }
        match self.stack.pop() {
            Some(Value::Empty) | None => Err(DecodeError::Malformed("hole outside a dense array")),
            Some(value) => Ok(value),
        }
    }

    fn read_version(&mut self) -> Result<()> {
        if self.reader.peek_u8() != Some(Tag::Version.as_u8()) {
            self.version = 0;
            return Ok(());
        }
        self.reader.read_u8()?;
        let version = self.reader.read_u32()?;
        if version > self.options.max_version {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        self.version = version;
        Ok(())
    }

    fn read_one(&mut self) -> Result<()> {
        let tag = self.reader.read_tag()?;
        if self.version == 0 && tag.requires_references() {
            return Err(DecodeError::RequiresVersion(tag.as_u8()));
        }
        match tag {
            Tag::Invalid => return Err(DecodeError::InvalidTag),
            Tag::Version => return Err(DecodeError::Malformed("version marker")),
            Tag::Padding => {}
            Tag::ReferenceCount => {
                let expected = self.reader.read_u32()?;
                if expected as usize != self.objects.len() {
                    return Err(DecodeError::ReferenceCountMismatch {
                        expected,
                        actual: self.objects.len(),
                    });
                }
            }
            Tag::Undefined => self.stack.push(Value::Undefined),
            Tag::Null => self.stack.push(Value::Null),
            Tag::True => self.stack.push(Value::Bool(true)),
            Tag::False => self.stack.push(Value::Bool(false)),
            Tag::TrueObject => self.push_referenceable(ObjectRef::boxed_boolean(true).into()),
            Tag::FalseObject => self.push_referenceable(ObjectRef::boxed_boolean(false).into()),
            Tag::String => {
                let s = self.reader.read_string()?;
                self.stack.push(Value::from(s));
            }
            Tag::StringUChar => {
                let s = self.reader.read_uchar_string()?;
                self.stack.push(Value::from(s));
            }
            Tag::StringObject => {
                let s = self.reader.read_string()?;
                self.push_referenceable(ObjectRef::boxed_string(&s).into());
            }
            Tag::Int32 => {
                let v = self.reader.read_u32()?;
                self.stack.push(Value::Int32(varint::zigzag_decode(v)));
            }
            Tag::Uint32 => {
                let v = self.reader.read_u32()?;
                self.stack.push(Value::Uint32(v));
            }
            Tag::Number => {
                let v = self.reader.read_double()?;
                self.stack.push(Value::Number(v));
            }
            Tag::NumberObject => {
                let v = self.reader.read_double()?;
                self.push_referenceable(ObjectRef::boxed_number(v).into());
            }
            Tag::Date => {
                let t = self.reader.read_double()?;
                self.push_referenceable(host::make_date(t));
            }
            Tag::ImageData => {
                let width = self.reader.read_u32()?;
                let height = self.reader.read_u32()?;
                let pixels = self.reader.read_bytes()?;
                let image = host::make_image_data(width, height, pixels)?;
                self.push_referenceable(image);
            }
            Tag::RegExp => {
                let pattern = self.reader.read_string()?;
                let flags = self.reader.read_u32()?;
                let regexp = host::make_regexp(&pattern, flags)?;
                self.push_referenceable(regexp);
            }
            Tag::ArrayBuffer => {
                let bytes = self.reader.read_bytes()?.to_vec();
                self.push_referenceable(host::make_array_buffer(bytes));
            }
            Tag::ArrayBufferTransfer => {
                let index = self.reader.read_u32()?;
                let buffer = self.transferred_buffer(index)?;
                self.stack.push(Value::Object(buffer));
            }
            Tag::ArrayBufferView => {
                let sub_tag = self.reader.read_u8()?;
                let kind =
                    ViewKind::from_u8(sub_tag).ok_or(DecodeError::Malformed("view sub-tag"))?;
                let byte_offset = self.reader.read_u32()?;
                let byte_length = self.reader.read_u32()?;
                let buffer = self.pop()?;
                let view = host::make_view(kind, &buffer, byte_offset, byte_length)?;
                self.push_referenceable(view);
            }
            Tag::ObjectReference => {
                let id = self.reader.read_u32()?;
                let value = self
                    .objects
                    .get(id as usize)
                    .cloned()
                    .ok_or(DecodeError::BadReference(id))?;
                self.stack.push(value);
            }
            Tag::GenerateFreshObject => self.open_composite(ObjectRef::plain())?,
            Tag::GenerateFreshSparseArray | Tag::GenerateFreshDenseArray => {
                let length = self.reader.read_u32()?;
                self.open_composite(ObjectRef::array(length))?;
            }
            Tag::Object => {
                let count = self.reader.read_u32()?;
                self.complete_object(count)?;
            }
            Tag::SparseArray => {
                let count = self.reader.read_u32()?;
                let length = self.reader.read_u32()?;
                self.complete_sparse_array(count, length)?;
            }
            Tag::DenseArray => {
                let count = self.reader.read_u32()?;
                let length = self.reader.read_u32()?;
                self.complete_dense_array(count, length)?;
            }
            Tag::Hole => self.stack.push(Value::Empty),
        }
        Ok(())
    }

    fn push_referenceable(&mut self, value: Value) {
        self.objects.push(value.clone());
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(DecodeError::StackUnderflow)
    }

    /// Pops the top `n` stack entries, oldest first.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let start = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or(DecodeError::StackUnderflow)?;
        Ok(self.stack.split_off(start))
    }

    fn transferred_buffer(&mut self, index: u32) -> Result<ObjectRef> {
        let slot = index as usize;
        if let Some(Some(buffer)) = self.transferred_buffers.get(slot) {
            return Ok(buffer.clone());
        }
        let contents = self
            .transferred
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(DecodeError::BadTransferIndex(index))?;
        let buffer = ObjectRef::array_buffer(contents);
        self.transferred_buffers[slot] = Some(buffer.clone());
        Ok(buffer)
    }

    /// Nesting is capped at the same depth the encoder accepts.
    fn open_composite(&mut self, container: ObjectRef) -> Result<()> {
        if self.open.len() >= self.options.max_depth {
            return Err(DecodeError::TooDeep(self.options.max_depth));
        }
        let id = self.objects.len() as u32;
        self.objects.push(Value::Object(container));
        self.open.push(id);
        Ok(())
    }

    /// The container a closing tag refers to: the innermost open composite,
    /// or a fresh one in version 0 streams.
    fn close_composite(&mut self, fresh: impl FnOnce() -> ObjectRef) -> Result<ObjectRef> {
        if self.version == 0 {
            return Ok(fresh());
        }
        let id = self
            .open
            .pop()
            .ok_or(DecodeError::Malformed("closing tag without an open composite"))?;
        self.objects
            .get(id as usize)
            .and_then(Value::as_object)
            .cloned()
            .ok_or(DecodeError::BadReference(id))
    }

    fn pop_properties(&mut self, count: u32) -> Result<Vec<Value>> {
        let n = (count as usize)
            .checked_mul(2)
            .ok_or(DecodeError::StackUnderflow)?;
        let properties = self.pop_n(n)?;
        if properties.iter().any(|v| matches!(v, Value::Empty)) {
            return Err(DecodeError::Malformed("hole outside a dense array"));
        }
        Ok(properties)
    }

    fn apply_properties(container: &ObjectRef, properties: Vec<Value>) -> Result<()> {
        let mut iter = properties.into_iter();
        while let (Some(name), Some(value)) = (iter.next(), iter.next()) {
            host::set_property(container, &name, value)?;
        }
        Ok(())
    }

    fn complete_object(&mut self, count: u32) -> Result<()> {
        let properties = self.pop_properties(count)?;
        let object = self.close_composite(ObjectRef::plain)?;
        if !matches!(object.borrow().kind, ObjectKind::Plain) {
            return Err(DecodeError::Malformed("object closed by a different tag"));
        }
        Self::apply_properties(&object, properties)?;
        self.stack.push(Value::Object(object));
        Ok(())
    }

    fn complete_sparse_array(&mut self, count: u32, length: u32) -> Result<()> {
        let properties = self.pop_properties(count)?;
        let array = self.close_composite(|| ObjectRef::array(length))?;
        Self::ensure_length(&array, length)?;
        Self::apply_properties(&array, properties)?;
        self.stack.push(Value::Object(array));
        Ok(())
    }

    fn complete_dense_array(&mut self, count: u32, length: u32) -> Result<()> {
        let properties = self.pop_properties(count)?;
        let elements = self.pop_n(length as usize)?;
        let array = self.close_composite(|| ObjectRef::array(length))?;
        Self::ensure_length(&array, length)?;
        for (index, element) in (0u32..).zip(elements) {
            if !matches!(element, Value::Empty) {
                array.set_index(index, element);
            }
        }
        Self::apply_properties(&array, properties)?;
        self.stack.push(Value::Object(array));
        Ok(())
    }

    fn ensure_length(array: &ObjectRef, length: u32) -> Result<()> {
        match &mut array.borrow_mut().kind {
            ObjectKind::Array(storage) => {
                storage.length = storage.length.max(length);
                Ok(())
            }
            _ => Err(DecodeError::Malformed("array closed by a different tag")),
        }
    }
}
