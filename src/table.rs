//! Flat field table: the `(fieldName, byteOffset, type)` listing emitters reproduce.
//!
//! Rows follow declaration order. Fields typed as a nested structure are flattened into
//! their members, named `<field>_<member>` at `offset + member offset`.

use crate::autoscale::Autoscale;
use crate::layout::{LayoutEntry, ResolvedLayout};
use crate::types::{FieldType, TableType};
use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub name: String,
    pub offset: usize,
    pub ty: TableType,
    pub bit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldTable {
    pub name: String,
    pub rows: Vec<TableRow>,
}

impl FieldTable {
    pub fn from_layout(layout: &ResolvedLayout) -> Self {
        let mut rows = Vec::with_capacity(layout.len());
        flatten_into(&mut rows, layout, "", 0);
        FieldTable {
            name: layout.name().to_string(),
            rows,
        }
    }

    pub fn get(&self, name: &str) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.name.as_str())
    }
}

fn flatten_into(rows: &mut Vec<TableRow>, layout: &ResolvedLayout, prefix: &str, base: usize) {
    for entry in layout {
        let name = format!("{}{}", prefix, entry.name);
        match entry.descriptor.structure_type() {
            Some(structure) => {
                let stride = structure.size();
                for i in 0..entry.element_count() {
                    let inner_prefix = if entry.element_count() > 1 {
                        format!("{}{}_", name, i)
                    } else {
                        format!("{}_", name)
                    };
                    flatten_into(rows, &structure.layout, &inner_prefix, base + entry.offset + i * stride);
                }
            }
            None => rows.push(row(entry, name, base)),
        }
    }
}

fn row(entry: &LayoutEntry, name: String, base: usize) -> TableRow {
    let ty = match (&entry.bit, entry.element_type()) {
        (Some(_), _) => TableType::Bit,
        (None, Some(t)) => t.table_type(),
        // structures are flattened before reaching here
        (None, None) => TableType::UInt8,
    };
    TableRow {
        name,
        offset: base + entry.offset,
        ty,
        bit: entry.bit,
    }
}

impl fmt::Display for FieldTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// {}", self.name)?;
        for r in &self.rows {
            match r.bit {
                Some(bit) => writeln!(f, "{} {} {} {}", r.name.to_uppercase(), r.offset, r.ty, bit)?,
                None => writeln!(f, "{} {} {}", r.name.to_uppercase(), r.offset, r.ty)?,
            }
        }
        Ok(())
    }
}

/// Human-readable type of a layout entry, e.g. `uint8_t[4][2]` or `bit`.
pub fn describe_type(entry: &LayoutEntry) -> String {
    let base = match (&entry.bit, entry.descriptor.data_type()) {
        (Some(_), _) => return "bit".to_string(),
        (None, Some(FieldType::Structure(s))) => s.name.clone(),
        (None, Some(FieldType::Primitive(t))) => t.c_name().to_string(),
        (None, None) => String::new(),
    };
    let dims: String = entry
        .descriptor
        .array_sizes()
        .iter()
        .map(|d| format!("[{}]", d))
        .collect();
    format!("{}{}", base, dims)
}

/// Stored value rendered in engineering units, with the raw value in parentheses.
pub fn format_scaled(v: &Value, autoscale: Option<&Autoscale>, units: Option<&str>) -> String {
    let raw = format_raw(v);
    let a = match autoscale {
        Some(a) => a,
        None => return raw,
    };
    let physical = a.decode(v);
    match units {
        Some(u) if !u.is_empty() => format!("{} {} ({})", physical, u, raw),
        _ => format!("{} ({})", physical, raw),
    }
}

pub fn format_raw(v: &Value) -> String {
    match v {
        Value::U8(x) => x.to_string(),
        Value::U16(x) => x.to_string(),
        Value::U32(x) => x.to_string(),
        Value::I8(x) => x.to_string(),
        Value::I16(x) => x.to_string(),
        Value::I32(x) => x.to_string(),
        Value::Float(x) => x.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementType;

    #[test]
    fn scaled_value_with_units() {
        let a = Autoscale::new(10.0, 0.0, ElementType::UInt16).unwrap();
        assert_eq!(format_scaled(&Value::U16(125), Some(&a), Some("kPa")), "12.5 kPa (125)");
        assert_eq!(format_scaled(&Value::U16(125), None, Some("kPa")), "125");
    }
}
