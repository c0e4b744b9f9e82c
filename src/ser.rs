use std::rc::Rc;

use tracing::{debug, trace};

use crate::buffer::Writer;
use crate::config::{Checkpoints, Options};
use crate::error::{Error, Result};
use crate::host::{self, Class, ObjectClass, ViewInfo};
use crate::reference::{ObjectPool, TransferTable};
use crate::tag::{Tag, LATEST_VERSION};
use crate::value::{parse_index, ObjectRef, Value};
use crate::varint;

/// Bytes moved out of a transferred array buffer.
pub type ArrayBufferContents = Vec<u8>;

/// Output of a successful serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedValue {
    pub bytes: Vec<u8>,
    /// Contents of the transfer list buffers, indexed like the transfer list.
    /// A buffer listed twice only fills the slot of its first occurrence.
    pub transferred: Vec<ArrayBufferContents>,
}

#[derive(Debug, Clone, Copy)]
enum FrameKind {
    Object,
    /// Walks indices `0..length` first, then the non-index properties.
    DenseArray { length: u32, index: u32 },
    SparseArray { length: u32 },
}

/// A composite whose encoding has started but not finished.
#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    composite: ObjectRef,
    /// Fetched on the first property step.
    names: Option<Vec<Rc<str>>>,
    cursor: usize,
    name_done: bool,
    /// Properties written so far. Skipped properties do not count.
    count: u32,
}

impl Frame {
    fn new(kind: FrameKind, composite: ObjectRef) -> Self {
        Self {
            kind,
            composite,
            names: None,
            cursor: 0,
            name_done: false,
            count: 0,
        }
    }
}

/// Encodes a value graph without recursing on the native stack.
///
/// Composites are walked with an explicit stack of [`Frame`]s. Every object is
/// registered in the reference table before its children are visited, so a
/// child pointing back at an ancestor is written as a reference.
#[derive(Debug)]
pub struct Serializer {
    writer: Writer,
    options: Options,
    frames: Vec<Frame>,
    pool: ObjectPool,
    transfers: TransferTable,
}

impl Serializer {
    pub fn new(transfer_list: &[ObjectRef]) -> Self {
        Self::with_options(Options::default(), transfer_list)
    }

    pub fn with_options(options: Options, transfer_list: &[ObjectRef]) -> Self {
        Self {
            writer: Writer::new(),
            options,
            frames: Vec::new(),
            pool: ObjectPool::new(),
            transfers: TransferTable::new(transfer_list),
        }
    }

    /// Encodes `root`.
    ///
    /// Buffers in the transfer list are neutered only once the whole graph has
    /// been written; on error nothing is neutered and the partial output is
    /// dropped.
    pub fn serialize(mut self, root: &Value) -> Result<SerializedValue> {
        if let Err(e) = self.run(root) {
            debug!(error = %e, depth = self.frames.len(), "serialization failed");
            return Err(e);
        }
        let transferred = self.neuter_transferred();
        Ok(SerializedValue {
            bytes: self.writer.take_bytes(),
            transferred,
        })
    }

    fn run(&mut self, root: &Value) -> Result<()> {
        self.check_transfer_list()?;
        self.writer.write_tag(Tag::Version);
        self.writer.write_u32(LATEST_VERSION);
        self.visit(root)?;
        while !self.frames.is_empty() {
            self.advance()?;
        }
        Ok(())
    }

    fn check_transfer_list(&self) -> Result<()> {
        for (i, buffer) in self.transfers.buffers().iter().enumerate() {
            if buffer.buffer_byte_length().is_none() {
                return Err(Error::DataClone(format!(
                    "transfer list entry {i} is not an ArrayBuffer"
                )));
            }
            if buffer.is_neutered() {
                return Err(Error::DataClone(format!(
                    "transfer list entry {i} is already neutered"
                )));
            }
        }
        Ok(())
    }

    fn neuter_transferred(&self) -> Vec<ArrayBufferContents> {
        let buffers = self.transfers.buffers();
        let mut out = Vec::with_capacity(buffers.len());
        for (i, buffer) in buffers.iter().enumerate() {
            let first = self.transfers.get(buffer) == Some(i as u32);
            let contents = if first { buffer.neuter() } else { None };
            trace!(index = i, bytes = contents.as_ref().map_or(0, Vec::len), "neutered transferred buffer");
            out.push(contents.unwrap_or_default());
        }
        out
    }

    fn write_checkpoint(&mut self, value: &Value) {
        let wanted = match self.options.checkpoints {
            Checkpoints::EveryValue => true,
            Checkpoints::CompositeBoundaries => matches!(value, Value::Object(_)),
        };
        if wanted {
            self.writer.write_tag(Tag::ReferenceCount);
            self.writer.write_u32(self.pool.len() as u32);
        }
    }

    /// Writes one value. Composites only get their opening tag written and a
    /// frame pushed; returns whether that happened.
    fn visit(&mut self, value: &Value) -> Result<bool> {
        self.write_checkpoint(value);
        if let Value::Object(object) = value {
            if let Some(id) = self.pool.get(object) {
                self.writer.write_tag(Tag::ObjectReference);
                self.writer.write_u32(id);
                return Ok(false);
            }
        }
        match host::classify(value) {
            Class::Empty => {
                return Err(Error::Input(
                    "empty property name / value cannot be cloned".into(),
                ))
            }
            Class::Undefined => self.writer.write_tag(Tag::Undefined),
            Class::Null => self.writer.write_tag(Tag::Null),
            Class::Bool(true) => self.writer.write_tag(Tag::True),
            Class::Bool(false) => self.writer.write_tag(Tag::False),
            Class::Int32(v) => {
                self.writer.write_tag(Tag::Int32);
                self.writer.write_u32(varint::zigzag_encode(v));
            }
            Class::Uint32(v) => {
                self.writer.write_tag(Tag::Uint32);
                self.writer.write_u32(v);
            }
            Class::Number(v) => {
                self.writer.write_tag(Tag::Number);
                self.writer.write_double(v);
            }
            Class::ArrayBufferView(info) => self.write_view(info)?,
            Class::ArrayBuffer(buffer) => self.write_buffer(&buffer)?,
            Class::String(s) => self.write_string_value(&s),
            Class::Object(_, ObjectClass::Uncloneable(what)) => {
                return Err(Error::DataClone(format!("{what} could not be cloned")));
            }
            Class::Object(object, class) => return self.write_object(object, class),
        }
        Ok(false)
    }

    fn write_string_value(&mut self, s: &str) {
        if host::is_one_byte(s) {
            self.writer.write_tag(Tag::String);
            self.writer.write_string(s);
        } else {
            let units: Vec<u16> = s.encode_utf16().collect();
            self.writer.write_uchar_string(&units);
        }
    }

    fn write_buffer(&mut self, buffer: &ObjectRef) -> Result<()> {
        if let Some(index) = self.transfers.get(buffer) {
            self.writer.write_tag(Tag::ArrayBufferTransfer);
            self.writer.write_u32(index);
            return Ok(());
        }
        let bytes = buffer
            .buffer_bytes()
            .ok_or_else(|| Error::DataClone("a neutered ArrayBuffer could not be cloned".into()))?;
        self.pool.assign(buffer);
        self.writer.write_tag(Tag::ArrayBuffer);
        self.writer.write_bytes(&bytes);
        Ok(())
    }

    /// The buffer goes first (inline, transferred or as a reference) so the
    /// decoder finds it on top of its stack when the view tag arrives.
    fn write_view(&mut self, info: ViewInfo) -> Result<()> {
        if info.buffer.is_neutered() {
            return Err(Error::DataClone(
                "a view over a neutered ArrayBuffer could not be cloned".into(),
            ));
        }
        self.visit(&Value::Object(info.buffer.clone()))?;
        debug_assert!(
            self.transfers.contains(&info.buffer) || self.pool.contains(&info.buffer),
            "view buffer must be transferred or referenceable"
        );
        self.pool.assign(&info.view);
        self.writer.write_tag(Tag::ArrayBufferView);
        self.writer.write_u8(info.kind.as_u8());
        self.writer.write_u32(info.byte_offset);
        self.writer.write_u32(info.byte_length);
        Ok(())
    }

    fn write_object(&mut self, object: ObjectRef, class: ObjectClass) -> Result<bool> {
        self.pool.assign(&object);
        match class {
            ObjectClass::Date(t) => {
                self.writer.write_tag(Tag::Date);
                self.writer.write_double(t);
            }
            ObjectClass::BoxedString(s) => {
                self.writer.write_tag(Tag::StringObject);
                self.writer.write_string(&s);
            }
            ObjectClass::BoxedNumber(n) => {
                self.writer.write_tag(Tag::NumberObject);
                self.writer.write_double(n);
            }
            ObjectClass::BoxedBoolean(b) => {
                self.writer
                    .write_tag(if b { Tag::TrueObject } else { Tag::FalseObject });
            }
            ObjectClass::ImageData {
                width,
                height,
                data,
            } => {
                self.writer.write_tag(Tag::ImageData);
                self.writer.write_u32(width);
                self.writer.write_u32(height);
                self.writer.write_bytes(&data);
            }
            ObjectClass::RegExp { pattern, flags } => {
                self.writer.write_tag(Tag::RegExp);
                self.writer.write_string(&pattern);
                self.writer.write_u32(flags.bits());
            }
            ObjectClass::Array { length } => {
                let names = object.own_property_names();
                let dense = should_serialize_densely(length, names.len());
                let kind = if dense {
                    self.writer.write_tag(Tag::GenerateFreshDenseArray);
                    FrameKind::DenseArray { length, index: 0 }
                } else {
                    self.writer.write_tag(Tag::GenerateFreshSparseArray);
                    FrameKind::SparseArray { length }
                };
                self.writer.write_u32(length);
                let mut frame = Frame::new(kind, object);
                frame.names = Some(names);
                self.push(frame)?;
                return Ok(true);
            }
            ObjectClass::Plain => {
                self.writer.write_tag(Tag::GenerateFreshObject);
                self.push(Frame::new(FrameKind::Object, object))?;
                return Ok(true);
            }
            ObjectClass::Uncloneable(_) => {
                unreachable!("uncloneable objects are rejected before registration")
            }
        }
        Ok(false)
    }

    fn push(&mut self, frame: Frame) -> Result<()> {
        let depth = self.frames.len() + 1;
        if depth > self.options.max_depth {
            return Err(Error::Input("cyclic or too deeply nested".into()));
        }
        // Guard only: `write_object` registers a composite before pushing it,
        // so a repeat is normally written as a reference and never reaches
        // here. This catches frames pushed without going through the pool.
        if depth.is_power_of_two()
            && self
                .frames
                .iter()
                .any(|f| f.composite.ptr_eq(&frame.composite))
        {
            return Err(Error::Input("cyclic or too deeply nested".into()));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Writes the next piece of the top frame: one element, one property, or
    /// the closing tag.
    fn advance(&mut self) -> Result<()> {
        let top = self.frames.len() - 1;

        if let FrameKind::DenseArray { length, index } = self.frames[top].kind {
            if index < length {
                self.frames[top].kind = FrameKind::DenseArray {
                    length,
                    index: index + 1,
                };
                match self.frames[top].composite.get_index(index) {
                    Some(element) => {
                        self.visit(&element)?;
                    }
                    None => {
                        self.write_checkpoint(&Value::Undefined);
                        self.writer.write_tag(Tag::Hole);
                    }
                }
                return Ok(());
            }
        }

        loop {
            let frame = &mut self.frames[top];
            if frame.names.is_none() {
                frame.names = Some(frame.composite.own_property_names());
            }
            let next = frame
                .names
                .as_ref()
                .and_then(|names| names.get(frame.cursor))
                .cloned();
            let Some(name) = next else {
                return self.complete_top();
            };

            if !frame.name_done {
                if let FrameKind::DenseArray { length, .. } = frame.kind {
                    if parse_index(&name).map_or(false, |i| i < length) {
                        frame.cursor += 1;
                        continue;
                    }
                }
                if !frame.composite.has_own(&name) {
                    frame.cursor += 1;
                    continue;
                }
                frame.name_done = true;
                if self.visit(&Value::String(name.clone()))? {
                    return Ok(());
                }
            }

            let composite = self.frames[top].composite.clone();
            let value = composite
                .get(&name)
                .map_err(Error::Script)?
                .unwrap_or(Value::Undefined);
            let frame = &mut self.frames[top];
            frame.name_done = false;
            frame.cursor += 1;
            frame.count += 1;
            self.visit(&value)?;
            return Ok(());
        }
    }

    fn complete_top(&mut self) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        match frame.kind {
            FrameKind::Object => {
                self.writer.write_tag(Tag::Object);
                self.writer.write_u32(frame.count);
            }
            FrameKind::DenseArray { length, .. } => {
                self.writer.write_tag(Tag::DenseArray);
                self.writer.write_u32(frame.count);
                self.writer.write_u32(length);
            }
            FrameKind::SparseArray { length } => {
                self.writer.write_tag(Tag::SparseArray);
                self.writer.write_u32(frame.count);
                self.writer.write_u32(length);
            }
        }
        Ok(())
    }
}

/// Dense encoding writes every index; it pays off once at least a sixth of
/// the indices are populated.
pub fn should_serialize_densely(length: u32, property_count: usize) -> bool {
    6 * property_count as u64 >= u64::from(length)
}
