//! Read and write field values in a configuration image using a compiled layout.
//!
//! The image is the raw byte block the device keeps in memory (and the tuning software
//! reads and burns). Multi-byte values use the configured endianness; bit fields are read
//! from and written into their backing word.

use crate::layout::{LayoutEntry, ResolvedLayout};
use crate::types::ElementType;
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order of multi-byte values in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Index {index} out of range for `{field}` ({count} element(s))")]
    IndexOutOfRange {
        field: String,
        index: usize,
        count: usize,
    },
    #[error("Image too short: need {needed} byte(s), have {len}")]
    ShortImage { needed: usize, len: usize },
    #[error("Field `{field}` is not {expected}")]
    KindMismatch { field: String, expected: &'static str },
    #[error("Value type {found} does not match `{field}` ({expected})")]
    TypeMismatch {
        field: String,
        expected: ElementType,
        found: ElementType,
    },
}

/// Accessor for images of one layout, in the byte order the layout was compiled for.
#[derive(Debug, Clone, Copy)]
pub struct ImageCodec<'l> {
    layout: &'l ResolvedLayout,
    endianness: Endianness,
}

impl<'l> ImageCodec<'l> {
    pub fn new(layout: &'l ResolvedLayout) -> Self {
        ImageCodec {
            layout,
            endianness: layout.options().endianness,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn layout(&self) -> &'l ResolvedLayout {
        self.layout
    }

    /// Zero-filled image of the structure's size.
    pub fn blank_image(&self) -> Vec<u8> {
        vec![0u8; self.layout.total_size()]
    }

    fn entry(&self, name: &str) -> Result<&'l LayoutEntry, CodecError> {
        self.layout
            .get(name)
            .ok_or_else(|| CodecError::UnknownField(name.to_string()))
    }

    /// Entry, element type and byte offset of element `index`.
    fn element(&self, name: &str, index: usize) -> Result<(&'l LayoutEntry, ElementType, usize), CodecError> {
        let entry = self.entry(name)?;
        let ty = entry.element_type().ok_or_else(|| CodecError::KindMismatch {
            field: name.to_string(),
            expected: "a primitive scalar or array",
        })?;
        let count = entry.element_count();
        if index >= count {
            return Err(CodecError::IndexOutOfRange {
                field: name.to_string(),
                index,
                count,
            });
        }
        Ok((entry, ty, entry.offset + index * ty.size()))
    }

    /// Stored value of element `index` of a scalar or array field.
    pub fn read(&self, image: &[u8], name: &str, index: usize) -> Result<Value, CodecError> {
        let (_, ty, offset) = self.element(name, index)?;
        let buf = slice(image, offset, ty.size())?;
        Ok(match ty {
            ElementType::Int8 => Value::I8(buf[0] as i8),
            ElementType::UInt8 => Value::U8(buf[0]),
            ElementType::Int16 => Value::I16(self.read_i16(buf)),
            ElementType::UInt16 => Value::U16(self.read_u16(buf)),
            ElementType::Int32 => Value::I32(self.read_i32(buf)),
            ElementType::UInt32 => Value::U32(self.read_u32(buf)),
            ElementType::Float => Value::Float(self.read_f32(buf)),
        })
    }

    /// Write element `index`. The value's type must match the field's element type.
    pub fn write(&self, image: &mut [u8], name: &str, index: usize, value: Value) -> Result<(), CodecError> {
        let (_, ty, offset) = self.element(name, index)?;
        if value.element_type() != ty {
            return Err(CodecError::TypeMismatch {
                field: name.to_string(),
                expected: ty,
                found: value.element_type(),
            });
        }
        let buf = slice_mut(image, offset, ty.size())?;
        match value {
            Value::I8(x) => buf[0] = x as u8,
            Value::U8(x) => buf[0] = x,
            Value::I16(x) => self.write_u16(buf, x as u16),
            Value::U16(x) => self.write_u16(buf, x),
            Value::I32(x) => self.write_u32(buf, x as u32),
            Value::U32(x) => self.write_u32(buf, x),
            Value::Float(x) => self.write_f32(buf, x),
        }
        Ok(())
    }

    /// Engineering value of element `index`, through the field's autoscale when it has one.
    pub fn read_scaled(&self, image: &[u8], name: &str, index: usize) -> Result<f64, CodecError> {
        let entry = self.entry(name)?;
        let stored = self.read(image, name, index)?;
        Ok(match &entry.autoscale {
            Some(a) => a.decode(&stored),
            None => stored.as_f64(),
        })
    }

    /// Write an engineering value; scaled fields round and saturate to their storage type.
    pub fn write_scaled(&self, image: &mut [u8], name: &str, index: usize, v: f64) -> Result<(), CodecError> {
        let (entry, ty, _) = self.element(name, index)?;
        let stored = match (&entry.autoscale, ty) {
            (Some(a), _) => a.encode(v),
            (None, ElementType::Float) => Value::Float(v as f32),
            (None, ty) => {
                let (lo, hi) = ty.range();
                Value::from_integer(ty, v.round().clamp(lo, hi) as i64)
            }
        };
        self.write(image, name, index, stored)
    }

    pub fn read_bit(&self, image: &[u8], name: &str) -> Result<bool, CodecError> {
        let (entry, bit) = self.bit_entry(name)?;
        let word = self.read_word(slice(image, entry.offset, entry.size)?);
        Ok(word & (1u32 << bit) != 0)
    }

    /// Set or clear one bit; the other bits of the word are preserved.
    pub fn write_bit(&self, image: &mut [u8], name: &str, value: bool) -> Result<(), CodecError> {
        let (entry, bit) = self.bit_entry(name)?;
        let buf = slice_mut(image, entry.offset, entry.size)?;
        let mut word = self.read_word(buf);
        if value {
            word |= 1u32 << bit;
        } else {
            word &= !(1u32 << bit);
        }
        self.write_word(buf, word);
        Ok(())
    }

    fn bit_entry(&self, name: &str) -> Result<(&'l LayoutEntry, u32), CodecError> {
        let entry = self.entry(name)?;
        match entry.bit {
            Some(bit) => Ok((entry, bit)),
            None => Err(CodecError::KindMismatch {
                field: name.to_string(),
                expected: "a bit field",
            }),
        }
    }

    fn read_word(&self, buf: &[u8]) -> u32 {
        match buf.len() {
            1 => buf[0] as u32,
            2 => self.read_u16(buf) as u32,
            _ => self.read_u32(buf),
        }
    }

    fn write_word(&self, buf: &mut [u8], word: u32) {
        match buf.len() {
            1 => buf[0] = word as u8,
            2 => self.write_u16(buf, word as u16),
            _ => self.write_u32(buf, word),
        }
    }

    fn read_u16(&self, buf: &[u8]) -> u16 {
        match self.endianness {
            Endianness::Big => BigEndian::read_u16(buf),
            Endianness::Little => LittleEndian::read_u16(buf),
        }
    }

    fn read_i16(&self, buf: &[u8]) -> i16 {
        match self.endianness {
            Endianness::Big => BigEndian::read_i16(buf),
            Endianness::Little => LittleEndian::read_i16(buf),
        }
    }

    fn read_u32(&self, buf: &[u8]) -> u32 {
        match self.endianness {
            Endianness::Big => BigEndian::read_u32(buf),
            Endianness::Little => LittleEndian::read_u32(buf),
        }
    }

    fn read_i32(&self, buf: &[u8]) -> i32 {
        match self.endianness {
            Endianness::Big => BigEndian::read_i32(buf),
            Endianness::Little => LittleEndian::read_i32(buf),
        }
    }

    fn read_f32(&self, buf: &[u8]) -> f32 {
        match self.endianness {
            Endianness::Big => BigEndian::read_f32(buf),
            Endianness::Little => LittleEndian::read_f32(buf),
        }
    }

    fn write_u16(&self, buf: &mut [u8], v: u16) {
        match self.endianness {
            Endianness::Big => BigEndian::write_u16(buf, v),
            Endianness::Little => LittleEndian::write_u16(buf, v),
        }
    }

    fn write_u32(&self, buf: &mut [u8], v: u32) {
        match self.endianness {
            Endianness::Big => BigEndian::write_u32(buf, v),
            Endianness::Little => LittleEndian::write_u32(buf, v),
        }
    }

    fn write_f32(&self, buf: &mut [u8], v: f32) {
        match self.endianness {
            Endianness::Big => BigEndian::write_f32(buf, v),
            Endianness::Little => LittleEndian::write_f32(buf, v),
        }
    }
}

fn slice(image: &[u8], offset: usize, len: usize) -> Result<&[u8], CodecError> {
    image.get(offset..offset + len).ok_or(CodecError::ShortImage {
        needed: offset + len,
        len: image.len(),
    })
}

fn slice_mut(image: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8], CodecError> {
    let have = image.len();
    image.get_mut(offset..offset + len).ok_or(CodecError::ShortImage {
        needed: offset + len,
        len: have,
    })
}
