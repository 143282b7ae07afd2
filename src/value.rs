//! Stored values of configuration fields (what sits in the image bytes).

use crate::types::ElementType;

/// A single stored element value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I16(i16),
    I32(i32),
    Float(f32),
}

impl Value {
    /// Build a value of `ty` from an integer, saturating to the type's range.
    pub fn from_integer(ty: ElementType, raw: i64) -> Value {
        let (lo, hi) = ty.range();
        let clamped = raw.clamp(lo as i64, hi as i64);
        match ty {
            ElementType::Int8 => Value::I8(clamped as i8),
            ElementType::UInt8 => Value::U8(clamped as u8),
            ElementType::Int16 => Value::I16(clamped as i16),
            ElementType::UInt16 => Value::U16(clamped as u16),
            ElementType::Int32 => Value::I32(clamped as i32),
            ElementType::UInt32 => Value::U32(clamped as u32),
            ElementType::Float => Value::Float(raw as f32),
        }
    }

    /// Zero of the given type.
    pub fn zero(ty: ElementType) -> Value {
        Value::from_integer(ty, 0)
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Value::U8(_) => ElementType::UInt8,
            Value::U16(_) => ElementType::UInt16,
            Value::U32(_) => ElementType::UInt32,
            Value::I8(_) => ElementType::Int8,
            Value::I16(_) => ElementType::Int16,
            Value::I32(_) => ElementType::Int32,
            Value::Float(_) => ElementType::Float,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Float(x) => *x as f64,
            other => other.as_i64().unwrap_or(0) as f64,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}
