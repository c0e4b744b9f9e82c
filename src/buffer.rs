//! Append-only byte writer and bounds-checked byte reader.

use crate::error::DecodeError;
use crate::tag::Tag;
use crate::varint;

/// Growable output buffer with typed write primitives.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_tag(&mut self, tag: Tag) {
        self.buf.push(tag.as_u8());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u32(&mut self, v: u32) {
        varint::encode_u32(&mut self.buf, v);
    }

    pub fn write_u64(&mut self, v: u64) {
        varint::encode_u64(&mut self.buf, v);
    }

    /// Writes a length prefixed byte run.
    pub fn write_bytes(&mut self, v: &[u8]) {
        self.write_length(v.len());
        self.write_raw(v);
    }

    /// Writes a length prefixed UTF-8 string.
    pub fn write_string(&mut self, v: &str) {
        self.write_bytes(v.as_bytes());
    }

    /// Writes the little endian bits of `v`, eight bytes, no varint.
    pub fn write_double(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a [`Tag::StringUChar`] value: tag, byte length, UTF-16LE units.
    ///
    /// The code units always start at an even offset in the output. When they
    /// would not, a [`Tag::Padding`] byte is written ahead of the tag.
    pub fn write_uchar_string(&mut self, units: &[u16]) {
        let byte_len = units.len() * 2;
        let header = 1 + varint::encoded_len(byte_len as u64);
        if (self.buf.len() + header) % 2 != 0 {
            self.write_tag(Tag::Padding);
        }
        self.write_tag(Tag::StringUChar);
        self.write_length(byte_len);
        self.buf.reserve(byte_len);
        for unit in units {
            self.buf.extend_from_slice(&unit.to_le_bytes());
        }
    }

    /// Consumes the writer, returning the encoded bytes.
    pub fn take_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_length(&mut self, len: usize) {
        self.write_u64(len as u64);
    }
}

/// Cursor over an immutable byte slice. No read goes past the end.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = self.peek_u8().ok_or(DecodeError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(b)
    }

    /// Reads a tag byte. Bytes outside the vocabulary are an error.
    pub fn read_tag(&mut self) -> Result<Tag, DecodeError> {
        let b = self.read_u8()?;
        Tag::from_u8(b).ok_or(DecodeError::UnknownTag(b))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let (v, used) =
            varint::decode_u32(&self.bytes[self.pos..]).ok_or(DecodeError::InvalidVarint)?;
        self.pos += used;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let (v, used) =
            varint::decode_u64(&self.bytes[self.pos..]).ok_or(DecodeError::InvalidVarint)?;
        self.pos += used;
        Ok(v)
    }

    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::UnexpectedEnd)?;
        let out = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEnd)?;
        self.pos = end;
        Ok(out)
    }

    pub fn read_double(&mut self) -> Result<f64, DecodeError> {
        let raw = self.read_raw(8)?;
        let mut bits = [0u8; 8];
        bits.copy_from_slice(raw);
        Ok(f64::from_le_bytes(bits))
    }

    /// Reads a length prefixed byte run.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_length()?;
        self.read_raw(len)
    }

    /// Reads a length prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let raw = self.read_bytes()?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidString)
    }

    /// Reads the payload of a [`Tag::StringUChar`] value.
    pub fn read_uchar_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_length()?;
        if len % 2 != 0 {
            return Err(DecodeError::InvalidString);
        }
        let raw = self.read_raw(len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| DecodeError::InvalidString)
    }

    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let len = self.read_u64()?;
        usize::try_from(len).map_err(|_| DecodeError::UnexpectedEnd)
    }
}
