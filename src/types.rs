//! Primitive storage types of configuration fields.

use crate::layout::ResolvedLayout;
use std::fmt;
use std::sync::Arc;

/// Primitive element type with a fixed byte size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float,
}

impl ElementType {
    /// Size of one element in bytes. Never zero.
    pub fn size(&self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float => 4,
        }
    }

    /// Natural alignment; equal to the size for every primitive.
    pub fn alignment(&self) -> usize {
        self.size()
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, ElementType::Float)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            ElementType::Int8 | ElementType::Int16 | ElementType::Int32 | ElementType::Float
        )
    }

    /// Inclusive storage range. Floats report the finite `f32` range.
    pub fn range(&self) -> (f64, f64) {
        match self {
            ElementType::Int8 => (i8::MIN as f64, i8::MAX as f64),
            ElementType::UInt8 => (0.0, u8::MAX as f64),
            ElementType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            ElementType::UInt16 => (0.0, u16::MAX as f64),
            ElementType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            ElementType::UInt32 => (0.0, u32::MAX as f64),
            ElementType::Float => (f32::MIN as f64, f32::MAX as f64),
        }
    }

    /// C type name used in firmware headers.
    pub fn c_name(&self) -> &'static str {
        match self {
            ElementType::Int8 => "int8_t",
            ElementType::UInt8 => "uint8_t",
            ElementType::Int16 => "int16_t",
            ElementType::UInt16 => "uint16_t",
            ElementType::Int32 => "int32_t",
            ElementType::UInt32 => "uint32_t",
            ElementType::Float => "float",
        }
    }

    /// Look up a primitive by its C type name.
    pub fn from_c_name(name: &str) -> Option<Self> {
        Some(match name {
            "int8_t" => ElementType::Int8,
            "uint8_t" => ElementType::UInt8,
            "int16_t" => ElementType::Int16,
            "uint16_t" => ElementType::UInt16,
            "int32_t" => ElementType::Int32,
            "uint32_t" => ElementType::UInt32,
            "float" => ElementType::Float,
            _ => return None,
        })
    }

    pub fn table_type(&self) -> TableType {
        match self {
            ElementType::Int8 => TableType::Int8,
            ElementType::UInt8 => TableType::UInt8,
            ElementType::Int16 => TableType::Int16,
            ElementType::UInt16 => TableType::UInt16,
            ElementType::Int32 => TableType::Int,
            ElementType::UInt32 => TableType::UInt32,
            ElementType::Float => TableType::Float,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// Type tag of a row in an emitted field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int,
    UInt32,
    Float,
    Bit,
}

impl TableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableType::Int8 => "INT8",
            TableType::UInt8 => "UINT8",
            TableType::Int16 => "INT16",
            TableType::UInt16 => "UINT16",
            TableType::Int => "INT",
            TableType::UInt32 => "UINT32",
            TableType::Float => "FLOAT",
            TableType::Bit => "BIT",
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A nested configuration structure used as a field type. Holds the already-compiled layout.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureType {
    pub name: String,
    pub layout: Arc<ResolvedLayout>,
}

impl StructureType {
    pub fn new(layout: ResolvedLayout) -> Arc<Self> {
        Arc::new(StructureType {
            name: layout.name().to_string(),
            layout: Arc::new(layout),
        })
    }

    pub fn size(&self) -> usize {
        self.layout.total_size()
    }
}

/// Declared type of a data field: a primitive or a nested structure.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Primitive(ElementType),
    Structure(Arc<StructureType>),
}

impl FieldType {
    pub fn element_size(&self) -> usize {
        match self {
            FieldType::Primitive(t) => t.size(),
            FieldType::Structure(s) => s.size(),
        }
    }

    /// Alignment a field of this type expects. Structures align to their widest member, capped at 4.
    pub fn alignment(&self) -> usize {
        match self {
            FieldType::Primitive(t) => t.alignment(),
            FieldType::Structure(s) => s
                .layout
                .entries()
                .iter()
                .map(|e| e.descriptor.alignment())
                .max()
                .unwrap_or(1)
                .clamp(1, 4),
        }
    }

    pub fn primitive(&self) -> Option<ElementType> {
        match self {
            FieldType::Primitive(t) => Some(*t),
            FieldType::Structure(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldType::Primitive(t) => t.c_name(),
            FieldType::Structure(s) => &s.name,
        }
    }
}

impl From<ElementType> for FieldType {
    fn from(t: ElementType) -> Self {
        FieldType::Primitive(t)
    }
}
