//! Fixed-offset scalar and text codec for the NIfTI-1 header.
//!
//! Every header field is described once as a [`Field`] (name, offset, kind,
//! element count). [`FieldReader`] and [`FieldWriter`] consume the same
//! descriptors, so the decode and encode paths cannot drift apart.
//!
//! Bounds are not checked beyond slice indexing: callers guarantee a buffer of
//! at least one header length before reading or writing.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Width/kind of a numeric header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// IEEE 754 single precision.
    Float32,
}

impl ScalarKind {
    /// Size in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
        }
    }
}

/// A decoded numeric value tagged with its on-disk kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Signed 8-bit value.
    Int8(i8),
    /// Signed 16-bit value.
    Int16(i16),
    /// Signed 32-bit value.
    Int32(i32),
    /// Single precision value.
    Float32(f32),
}

impl Scalar {
    /// Kind of this value.
    pub const fn kind(self) -> ScalarKind {
        match self {
            Self::Int8(_) => ScalarKind::Int8,
            Self::Int16(_) => ScalarKind::Int16,
            Self::Int32(_) => ScalarKind::Int32,
            Self::Float32(_) => ScalarKind::Float32,
        }
    }

    /// Value widened to `f64`.
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int8(v) => f64::from(v),
            Self::Int16(v) => f64::from(v),
            Self::Int32(v) => f64::from(v),
            Self::Float32(v) => f64::from(v),
        }
    }
}

pub(crate) fn read_i16(buf: &[u8], offset: usize, little_endian: bool) -> i16 {
    let bytes = &buf[offset..offset + 2];
    if little_endian {
        LittleEndian::read_i16(bytes)
    } else {
        BigEndian::read_i16(bytes)
    }
}

pub(crate) fn read_i32(buf: &[u8], offset: usize, little_endian: bool) -> i32 {
    let bytes = &buf[offset..offset + 4];
    if little_endian {
        LittleEndian::read_i32(bytes)
    } else {
        BigEndian::read_i32(bytes)
    }
}

pub(crate) fn read_f32(buf: &[u8], offset: usize, little_endian: bool) -> f32 {
    let bytes = &buf[offset..offset + 4];
    if little_endian {
        LittleEndian::read_f32(bytes)
    } else {
        BigEndian::read_f32(bytes)
    }
}

fn write_i16(buf: &mut [u8], offset: usize, value: i16, little_endian: bool) {
    let bytes = &mut buf[offset..offset + 2];
    if little_endian {
        LittleEndian::write_i16(bytes, value);
    } else {
        BigEndian::write_i16(bytes, value);
    }
}

fn write_i32(buf: &mut [u8], offset: usize, value: i32, little_endian: bool) {
    let bytes = &mut buf[offset..offset + 4];
    if little_endian {
        LittleEndian::write_i32(bytes, value);
    } else {
        BigEndian::write_i32(bytes, value);
    }
}

fn write_f32(buf: &mut [u8], offset: usize, value: f32, little_endian: bool) {
    let bytes = &mut buf[offset..offset + 4];
    if little_endian {
        LittleEndian::write_f32(bytes, value);
    } else {
        BigEndian::write_f32(bytes, value);
    }
}

/// Read one scalar of `kind` at `offset`.
pub fn read_scalar(buf: &[u8], offset: usize, kind: ScalarKind, little_endian: bool) -> Scalar {
    match kind {
        ScalarKind::Int8 => Scalar::Int8(buf[offset] as i8),
        ScalarKind::Int16 => Scalar::Int16(read_i16(buf, offset, little_endian)),
        ScalarKind::Int32 => Scalar::Int32(read_i32(buf, offset, little_endian)),
        ScalarKind::Float32 => Scalar::Float32(read_f32(buf, offset, little_endian)),
    }
}

/// Write one scalar at `offset`, using the value's own kind for the width.
pub fn write_scalar(buf: &mut [u8], offset: usize, value: Scalar, little_endian: bool) {
    match value {
        Scalar::Int8(v) => buf[offset] = v as u8,
        Scalar::Int16(v) => write_i16(buf, offset, v, little_endian),
        Scalar::Int32(v) => write_i32(buf, offset, v, little_endian),
        Scalar::Float32(v) => write_f32(buf, offset, v, little_endian),
    }
}

/// Raw bytes of a fixed-width text slot, embedded NULs included.
pub fn read_fixed_string(buf: &[u8], start: usize, end: usize) -> Vec<u8> {
    buf[start..end].to_vec()
}

/// Copy `text` into `buf` starting at `offset`.
///
/// Bytes past `text.len()` keep whatever the buffer already holds.
pub fn write_fixed_string(buf: &mut [u8], offset: usize, text: &[u8]) {
    buf[offset..offset + text.len()].copy_from_slice(text);
}

/// Storage class of a header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One or more numeric values.
    Scalar(ScalarKind),
    /// Fixed-width byte string.
    Text,
}

/// Declarative description of one header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name as used in error messages.
    pub name: &'static str,
    /// Byte offset from the start of the header.
    pub offset: usize,
    /// Storage class.
    pub kind: FieldKind,
    /// Element count for numeric fields, byte width for text fields.
    pub count: usize,
}

impl Field {
    /// Single numeric value.
    pub const fn scalar(name: &'static str, offset: usize, kind: ScalarKind) -> Self {
        Self::array(name, offset, kind, 1)
    }

    /// Fixed-length numeric array.
    pub const fn array(name: &'static str, offset: usize, kind: ScalarKind, count: usize) -> Self {
        Self {
            name,
            offset,
            kind: FieldKind::Scalar(kind),
            count,
        }
    }

    /// Fixed-width byte string.
    pub const fn text(name: &'static str, offset: usize, len: usize) -> Self {
        Self {
            name,
            offset,
            kind: FieldKind::Text,
            count: len,
        }
    }

    /// Total width in bytes.
    pub const fn width(&self) -> usize {
        match self.kind {
            FieldKind::Scalar(kind) => kind.width() * self.count,
            FieldKind::Text => self.count,
        }
    }

    /// One past the last byte of the field.
    pub const fn end(&self) -> usize {
        self.offset + self.width()
    }

    fn element_offset(&self, index: usize) -> usize {
        match self.kind {
            FieldKind::Scalar(kind) => {
                debug_assert!(index < self.count, "{}[{}] out of range", self.name, index);
                self.offset + index * kind.width()
            }
            FieldKind::Text => self.offset + index,
        }
    }

    fn expect(&self, kind: ScalarKind) {
        debug_assert_eq!(
            self.kind,
            FieldKind::Scalar(kind),
            "field {} read with wrong kind",
            self.name
        );
    }
}

/// Reads header fields from a buffer in a fixed byte order.
#[derive(Debug, Clone, Copy)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    little_endian: bool,
}

impl<'a> FieldReader<'a> {
    /// Wrap `buf`; every multi-byte read uses `little_endian`.
    pub fn new(buf: &'a [u8], little_endian: bool) -> Self {
        Self { buf, little_endian }
    }

    /// Generic read of element `index` of `field`.
    pub fn scalar(&self, field: &Field, index: usize) -> Scalar {
        let kind = match field.kind {
            FieldKind::Scalar(kind) => kind,
            FieldKind::Text => ScalarKind::Int8,
        };
        read_scalar(self.buf, field.element_offset(index), kind, self.little_endian)
    }

    pub fn i8(&self, field: &Field) -> i8 {
        field.expect(ScalarKind::Int8);
        self.buf[field.offset] as i8
    }

    pub fn i16(&self, field: &Field) -> i16 {
        field.expect(ScalarKind::Int16);
        read_i16(self.buf, field.offset, self.little_endian)
    }

    pub fn i32(&self, field: &Field) -> i32 {
        field.expect(ScalarKind::Int32);
        read_i32(self.buf, field.offset, self.little_endian)
    }

    pub fn f32(&self, field: &Field) -> f32 {
        field.expect(ScalarKind::Float32);
        read_f32(self.buf, field.offset, self.little_endian)
    }

    pub fn i16_array<const N: usize>(&self, field: &Field) -> [i16; N] {
        field.expect(ScalarKind::Int16);
        debug_assert_eq!(field.count, N);
        std::array::from_fn(|i| read_i16(self.buf, field.element_offset(i), self.little_endian))
    }

    pub fn f32_array<const N: usize>(&self, field: &Field) -> [f32; N] {
        field.expect(ScalarKind::Float32);
        debug_assert_eq!(field.count, N);
        std::array::from_fn(|i| read_f32(self.buf, field.element_offset(i), self.little_endian))
    }

    /// Text slot as raw bytes.
    pub fn text(&self, field: &Field) -> Vec<u8> {
        read_fixed_string(self.buf, field.offset, field.end())
    }

    /// Text slot copied into a fixed array of the same width.
    pub fn bytes<const N: usize>(&self, field: &Field) -> [u8; N] {
        debug_assert_eq!(field.width(), N);
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[field.offset..field.end()]);
        out
    }
}

/// Writes header fields into a buffer in a fixed byte order.
#[derive(Debug)]
pub struct FieldWriter<'a> {
    buf: &'a mut [u8],
    little_endian: bool,
}

impl<'a> FieldWriter<'a> {
    /// Wrap `buf`; every multi-byte write uses `little_endian`.
    pub fn new(buf: &'a mut [u8], little_endian: bool) -> Self {
        Self { buf, little_endian }
    }

    pub fn i8(&mut self, field: &Field, value: i8) {
        field.expect(ScalarKind::Int8);
        write_scalar(self.buf, field.offset, Scalar::Int8(value), self.little_endian);
    }

    pub fn i16(&mut self, field: &Field, value: i16) {
        field.expect(ScalarKind::Int16);
        write_i16(self.buf, field.offset, value, self.little_endian);
    }

    pub fn i32(&mut self, field: &Field, value: i32) {
        field.expect(ScalarKind::Int32);
        write_i32(self.buf, field.offset, value, self.little_endian);
    }

    pub fn f32(&mut self, field: &Field, value: f32) {
        field.expect(ScalarKind::Float32);
        write_f32(self.buf, field.offset, value, self.little_endian);
    }

    pub fn i16_array(&mut self, field: &Field, values: &[i16]) {
        field.expect(ScalarKind::Int16);
        debug_assert_eq!(field.count, values.len());
        for (i, &v) in values.iter().enumerate() {
            write_i16(self.buf, field.element_offset(i), v, self.little_endian);
        }
    }

    pub fn f32_array(&mut self, field: &Field, values: &[f32]) {
        field.expect(ScalarKind::Float32);
        debug_assert_eq!(field.count, values.len());
        for (i, &v) in values.iter().enumerate() {
            write_f32(self.buf, field.element_offset(i), v, self.little_endian);
        }
    }

    /// Raw bytes into a text slot; anything beyond the slot width is dropped.
    pub fn text(&mut self, field: &Field, text: &[u8]) {
        let len = text.len().min(field.width());
        write_fixed_string(self.buf, field.offset, &text[..len]);
    }
}
