//! Field descriptors: the immutable description of one declared configuration field.
//!
//! [`FieldDescriptor`] is a tagged union over the field kinds. Every query is total: a
//! capability that does not apply to a variant answers with a neutral value (`None`, an
//! empty slice, `0`, `false`). [`FieldDescriptor::Void`] answers neutrally to everything and
//! stands in wherever "no descriptor" must still be queried, such as the lookahead past the
//! last field of a structure.
//!
//! ## Kinds
//!
//! - [`DataField`]: scalar, or array when it has dimensions
//! - [`BitField`]: one boolean bit packed into a shared backing word
//! - [`Directive`]: padding/alignment pseudo-field, emits no name
//! - [`IterateTemplate`]: a data field repeated `count` times with the index substituted
//! - `Void`

use crate::autoscale;
use crate::types::{ElementType, FieldType, StructureType};
use std::sync::Arc;

/// Placeholder replaced by the instance index in iterated names and comments. Only the first
/// occurrence is substituted.
pub const INDEX_PLACEHOLDER: &str = "{i}";

/// The neutral descriptor.
pub static VOID: FieldDescriptor = FieldDescriptor::Void;

/// Backing word of a run of bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitWord {
    U8,
    U16,
    #[default]
    U32,
}

impl BitWord {
    pub fn size(&self) -> usize {
        match self {
            BitWord::U8 => 1,
            BitWord::U16 => 2,
            BitWord::U32 => 4,
        }
    }

    pub fn bits(&self) -> u32 {
        self.size() as u32 * 8
    }
}

/// Descriptive metadata; never affects layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMeta {
    pub comment: Option<String>,
    pub units: Option<String>,
    pub min: f64,
    pub max: f64,
    pub digits: u32,
    /// Readable from the firmware's scripting layer.
    pub fsio_visible: bool,
}

/// Identity of an instance produced by iterate expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterateOrigin {
    pub template: String,
    pub index: usize,
}

/// Scalar or array field.
#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    pub name: String,
    pub ty: FieldType,
    /// Array dimensions; empty for scalars.
    pub array_sizes: Vec<usize>,
    /// Named constant the dimension was declared with, if any.
    pub array_size_variable: Option<String>,
    /// Raw autoscale spec text, see [`crate::autoscale`].
    pub autoscale: Option<String>,
    /// Offset the field is declared to land on.
    pub offset: Option<usize>,
    pub meta: FieldMeta,
    pub origin: Option<IterateOrigin>,
}

impl DataField {
    pub fn new(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        DataField {
            name: name.into(),
            ty: ty.into(),
            array_sizes: Vec::new(),
            array_size_variable: None,
            autoscale: None,
            offset: None,
            meta: FieldMeta::default(),
            origin: None,
        }
    }

    /// Field whose type is a nested, already-compiled structure.
    pub fn structure(name: impl Into<String>, structure: Arc<StructureType>) -> Self {
        DataField::new(name, FieldType::Structure(structure))
    }

    pub fn with_dims(mut self, dims: &[usize]) -> Self {
        self.array_sizes = dims.to_vec();
        self
    }

    pub fn with_array_size_variable(mut self, name: impl Into<String>) -> Self {
        self.array_size_variable = Some(name.into());
        self
    }

    pub fn with_autoscale(mut self, spec: impl Into<String>) -> Self {
        self.autoscale = Some(spec.into());
        self
    }

    /// Autoscale from numbers; stored in spec text form so every consumer sees the same source.
    pub fn with_scale(self, scale: f64, bias: f64) -> Self {
        self.with_autoscale(format!("{}, {}", scale, bias))
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.meta.comment = Some(comment.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.meta.units = Some(units.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.meta.min = min;
        self.meta.max = max;
        self
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.meta.digits = digits;
        self
    }

    pub fn with_fsio_visible(mut self) -> Self {
        self.meta.fsio_visible = true;
        self
    }

    /// Product of the dimensions (1 for scalars); `None` on overflow.
    pub fn checked_element_count(&self) -> Option<usize> {
        self.array_sizes
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .map(|n| n.max(1))
    }

    /// Element size times element count; `None` on overflow.
    pub fn checked_footprint(&self) -> Option<usize> {
        self.checked_element_count()?.checked_mul(self.ty.element_size())
    }

    /// Saturating form of [`DataField::checked_element_count`].
    pub fn element_count(&self) -> usize {
        self.checked_element_count().unwrap_or(usize::MAX)
    }

    /// Bytes occupied, saturating at `usize::MAX`. The compiler rejects fields that saturate.
    pub fn footprint(&self) -> usize {
        self.checked_footprint().unwrap_or(usize::MAX)
    }
}

/// One boolean bit in a packed word.
#[derive(Debug, Clone, PartialEq)]
pub struct BitField {
    pub name: String,
    pub true_name: Option<String>,
    pub false_name: Option<String>,
    /// Bit position the field is declared to land on within its word.
    pub bit: Option<u32>,
    pub offset: Option<usize>,
    pub meta: FieldMeta,
}

impl BitField {
    pub fn new(name: impl Into<String>) -> Self {
        BitField {
            name: name.into(),
            true_name: None,
            false_name: None,
            bit: None,
            offset: None,
            meta: FieldMeta::default(),
        }
    }

    pub fn with_states(mut self, true_name: impl Into<String>, false_name: impl Into<String>) -> Self {
        self.true_name = Some(true_name.into());
        self.false_name = Some(false_name.into());
        self
    }

    pub fn at_bit(mut self, bit: u32) -> Self {
        self.bit = Some(bit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.meta.comment = Some(comment.into());
        self
    }
}

/// Layout pseudo-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Insert exactly `n` bytes.
    Pad(usize),
    /// Pad up to the alignment of the following field.
    AlignNext,
}

/// A data field unrolled into `count` indexed instances.
#[derive(Debug, Clone, PartialEq)]
pub struct IterateTemplate {
    pub template: DataField,
    pub count: usize,
}

impl IterateTemplate {
    pub fn new(template: DataField, count: usize) -> Self {
        IterateTemplate { template, count }
    }

    /// Distance between consecutive instances.
    pub fn stride(&self) -> usize {
        self.template.footprint()
    }

    /// `count * stride`; `None` on overflow.
    pub fn checked_size(&self) -> Option<usize> {
        self.template.checked_footprint()?.checked_mul(self.count)
    }

    /// Concrete instances `0..count`. The template itself is left untouched.
    pub fn expand(&self) -> Vec<DataField> {
        let stride = self.stride();
        (0..self.count)
            .map(|i| {
                let mut instance = self.template.clone();
                instance.name = substitute_index(&self.template.name, i, "");
                instance.offset = self.template.offset.map(|o| o.saturating_add(i.saturating_mul(stride)));
                instance.origin = Some(IterateOrigin {
                    template: self.template.name.clone(),
                    index: i,
                });
                instance
            })
            .collect()
    }
}

fn substitute_index(text: &str, index: usize, separator: &str) -> String {
    if text.contains(INDEX_PLACEHOLDER) {
        text.replacen(INDEX_PLACEHOLDER, &index.to_string(), 1)
    } else {
        format!("{}{}{}", text, separator, index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldDescriptor {
    Data(DataField),
    Bit(BitField),
    Directive(Directive),
    Iterate(IterateTemplate),
    Void,
}

impl From<DataField> for FieldDescriptor {
    fn from(f: DataField) -> Self {
        FieldDescriptor::Data(f)
    }
}

impl From<BitField> for FieldDescriptor {
    fn from(f: BitField) -> Self {
        FieldDescriptor::Bit(f)
    }
}

impl From<Directive> for FieldDescriptor {
    fn from(d: Directive) -> Self {
        FieldDescriptor::Directive(d)
    }
}

impl From<IterateTemplate> for FieldDescriptor {
    fn from(t: IterateTemplate) -> Self {
        FieldDescriptor::Iterate(t)
    }
}

impl FieldDescriptor {
    pub fn scalar(name: impl Into<String>, ty: ElementType) -> Self {
        DataField::new(name, ty).into()
    }

    pub fn array(name: impl Into<String>, ty: ElementType, dims: &[usize]) -> Self {
        DataField::new(name, ty).with_dims(dims).into()
    }

    pub fn bit(name: impl Into<String>) -> Self {
        BitField::new(name).into()
    }

    pub fn pad(n: usize) -> Self {
        Directive::Pad(n).into()
    }

    pub fn align_next() -> Self {
        Directive::AlignNext.into()
    }

    pub fn iterate(template: DataField, count: usize) -> Self {
        IterateTemplate::new(template, count).into()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, FieldDescriptor::Void)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            FieldDescriptor::Data(f) => Some(&f.name),
            FieldDescriptor::Bit(b) => Some(&b.name),
            FieldDescriptor::Iterate(t) => Some(&t.template.name),
            FieldDescriptor::Directive(_) | FieldDescriptor::Void => None,
        }
    }

    /// C type name of the element (`"bit"` for bit fields).
    pub fn type_name(&self) -> Option<&str> {
        match self {
            FieldDescriptor::Data(f) => Some(f.ty.name()),
            FieldDescriptor::Iterate(t) => Some(t.template.ty.name()),
            FieldDescriptor::Bit(_) => Some("bit"),
            FieldDescriptor::Directive(_) | FieldDescriptor::Void => None,
        }
    }

    fn data(&self) -> Option<&DataField> {
        match self {
            FieldDescriptor::Data(f) => Some(f),
            FieldDescriptor::Iterate(t) => Some(&t.template),
            _ => None,
        }
    }

    fn meta(&self) -> Option<&FieldMeta> {
        match self {
            FieldDescriptor::Data(f) => Some(&f.meta),
            FieldDescriptor::Iterate(t) => Some(&t.template.meta),
            FieldDescriptor::Bit(b) => Some(&b.meta),
            FieldDescriptor::Directive(_) | FieldDescriptor::Void => None,
        }
    }

    pub fn structure_type(&self) -> Option<&Arc<StructureType>> {
        match self.data().map(|f| &f.ty) {
            Some(FieldType::Structure(s)) => Some(s),
            _ => None,
        }
    }

    /// Declared type of a data or iterate field.
    pub fn data_type(&self) -> Option<&FieldType> {
        self.data().map(|f| &f.ty)
    }

    pub fn element_type(&self) -> Option<ElementType> {
        self.data().and_then(|f| f.ty.primitive())
    }

    pub fn is_array(&self) -> bool {
        self.data().map_or(false, |f| !f.array_sizes.is_empty())
    }

    pub fn array_sizes(&self) -> &[usize] {
        self.data().map(|f| f.array_sizes.as_slice()).unwrap_or(&[])
    }

    pub fn array_size_variable_name(&self) -> Option<&str> {
        self.data().and_then(|f| f.array_size_variable.as_deref())
    }

    pub fn is_bit(&self) -> bool {
        matches!(self, FieldDescriptor::Bit(_))
    }

    pub fn true_name(&self) -> Option<&str> {
        match self {
            FieldDescriptor::Bit(b) => b.true_name.as_deref(),
            _ => None,
        }
    }

    pub fn false_name(&self) -> Option<&str> {
        match self {
            FieldDescriptor::Bit(b) => b.false_name.as_deref(),
            _ => None,
        }
    }

    pub fn is_directive(&self) -> bool {
        matches!(self, FieldDescriptor::Directive(_))
    }

    pub fn directive(&self) -> Option<Directive> {
        match self {
            FieldDescriptor::Directive(d) => Some(*d),
            _ => None,
        }
    }

    /// Offset this field is declared to land on, if any.
    pub fn explicit_offset(&self) -> Option<usize> {
        match self {
            FieldDescriptor::Data(f) => f.offset,
            FieldDescriptor::Iterate(t) => t.template.offset,
            FieldDescriptor::Bit(b) => b.offset,
            FieldDescriptor::Directive(_) | FieldDescriptor::Void => None,
        }
    }

    /// Size of one element before array multiplication.
    pub fn element_size(&self) -> usize {
        match self {
            FieldDescriptor::Data(f) => f.ty.element_size(),
            FieldDescriptor::Iterate(t) => t.template.ty.element_size(),
            FieldDescriptor::Bit(_) => BitWord::default().size(),
            FieldDescriptor::Directive(_) | FieldDescriptor::Void => 0,
        }
    }

    /// Alignment the field expects; 0 when it has none.
    pub fn alignment(&self) -> usize {
        match self {
            FieldDescriptor::Data(f) => f.ty.alignment(),
            FieldDescriptor::Iterate(t) => t.template.ty.alignment(),
            FieldDescriptor::Bit(_) | FieldDescriptor::Directive(_) | FieldDescriptor::Void => 0,
        }
    }

    /// Byte footprint, looking at the following descriptor. Bit fields charge their word on the
    /// last bit of a run, so a run sums to one word.
    pub fn size(&self, next: &FieldDescriptor) -> usize {
        self.size_with_word(next, BitWord::default())
    }

    pub fn size_with_word(&self, next: &FieldDescriptor, word: BitWord) -> usize {
        match self {
            FieldDescriptor::Data(f) => f.footprint(),
            FieldDescriptor::Iterate(t) => t.checked_size().unwrap_or(usize::MAX),
            FieldDescriptor::Bit(_) => {
                if next.is_bit() {
                    0
                } else {
                    word.size()
                }
            }
            FieldDescriptor::Directive(Directive::Pad(n)) => *n,
            FieldDescriptor::Directive(Directive::AlignNext) => 0,
            FieldDescriptor::Void => 0,
        }
    }

    pub fn is_iterate(&self) -> bool {
        matches!(self, FieldDescriptor::Iterate(_))
    }

    pub fn iterate_original_name(&self) -> Option<&str> {
        match self {
            FieldDescriptor::Iterate(t) => Some(&t.template.name),
            FieldDescriptor::Data(f) => f.origin.as_ref().map(|o| o.template.as_str()),
            _ => None,
        }
    }

    pub fn iterate_index(&self) -> usize {
        match self {
            FieldDescriptor::Data(f) => f.origin.as_ref().map_or(0, |o| o.index),
            _ => 0,
        }
    }

    pub fn is_from_iterate(&self) -> bool {
        matches!(self, FieldDescriptor::Data(f) if f.origin.is_some())
    }

    pub fn has_autoscale(&self) -> bool {
        self.data().map_or(false, |f| f.autoscale.is_some())
    }

    /// Raw autoscale spec text.
    pub fn autoscale_spec(&self) -> Option<&str> {
        self.data().and_then(|f| f.autoscale.as_deref())
    }

    /// Scale factor alone; 0 when absent or unparseable.
    pub fn autoscale_spec_number(&self) -> f64 {
        self.autoscale_spec_pair().map_or(0.0, |(scale, _)| scale)
    }

    /// `(scale, bias)`; bias is 0 when the spec omits it.
    pub fn autoscale_spec_pair(&self) -> Option<(f64, f64)> {
        self.autoscale_spec().and_then(autoscale::parse_spec)
    }

    pub fn min(&self) -> f64 {
        self.meta().map_or(0.0, |m| m.min)
    }

    pub fn max(&self) -> f64 {
        self.meta().map_or(0.0, |m| m.max)
    }

    pub fn digits(&self) -> u32 {
        self.meta().map_or(0, |m| m.digits)
    }

    pub fn is_fsio_visible(&self) -> bool {
        self.meta().map_or(false, |m| m.fsio_visible)
    }

    pub fn units(&self) -> Option<&str> {
        self.meta().and_then(|m| m.units.as_deref())
    }

    pub fn comment(&self) -> Option<&str> {
        self.meta().and_then(|m| m.comment.as_deref())
    }

    /// Comment with the instance index substituted for iterated instances.
    pub fn comment_templated(&self) -> Option<String> {
        let comment = self.comment()?;
        match self {
            FieldDescriptor::Data(DataField {
                origin: Some(origin),
                ..
            }) => Some(substitute_index(comment, origin.index, " ")),
            _ => Some(comment.to_string()),
        }
    }

    /// Tuning-software info line: `"units", multiplier, bias, min, max, digits`.
    pub fn ts_info(&self) -> Option<String> {
        let f = self.data()?;
        let (multiplier, bias) = match self.autoscale_spec_pair() {
            Some((scale, bias)) => (1.0 / scale, bias),
            None => (1.0, 0.0),
        };
        Some(format!(
            "\"{}\", {}, {}, {}, {}, {}",
            f.meta.units.as_deref().unwrap_or(""),
            multiplier,
            bias,
            f.meta.min,
            f.meta.max,
            f.meta.digits
        ))
    }
}
