//! Layout compiler: one left-to-right pass from descriptors to a [`ResolvedLayout`].
//!
//! The pass looks at a two-element window `(current, next)`; past the last descriptor
//! `next` is [`VOID`]. It keeps a byte cursor and, while a run of bit fields is open, the
//! backing word and its next free bit. Descriptor order is authoritative: two entries share
//! an offset only when they are bits of the same word.
//!
//! Structural errors stop the pass immediately. Autoscale errors are collected while the
//! remaining fields are still placed, then fail the compilation as a whole.

use crate::autoscale::{Autoscale, AutoscaleError, AutoscaleFault};
use crate::codec::Endianness;
use crate::descriptor::{BitField, BitWord, DataField, Directive, FieldDescriptor, VOID};
use crate::types::ElementType;
use std::collections::HashMap;
use std::iter;
use tracing::{debug, trace};

/// Layout rule violated by the descriptor sequence.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuralError {
    #[error("field `{field}` at offset {offset} overlaps `{other}` ({other_offset}..{other_end})")]
    Overlap {
        field: String,
        offset: usize,
        other: String,
        other_offset: usize,
        other_end: usize,
    },
    #[error("field `{field}` at offset {offset} overlaps padding inserted by a directive")]
    PaddingOverlap { field: String, offset: usize },
    #[error("field `{field}` declared at offset {declared} but the layout is at offset {offset}; gaps need a directive")]
    UnexpectedGap {
        field: String,
        declared: usize,
        offset: usize,
    },
    #[error("bit `{field}` at offset {offset}: bit {bit} collides with an earlier bit (next free bit is {next_free})")]
    BitCollision {
        field: String,
        offset: usize,
        bit: u32,
        next_free: u32,
    },
    #[error("bit `{field}` at offset {offset}: bit {bit} does not fit a {width}-bit word")]
    BitOutOfRange {
        field: String,
        offset: usize,
        bit: u32,
        width: u32,
    },
    #[error("iterate `{field}` at offset {offset}: count must be positive")]
    NonPositiveCount { field: String, offset: usize },
    #[error("field `{field}` at offset {offset}: array dimension {index} is zero")]
    ZeroDimension {
        field: String,
        offset: usize,
        index: usize,
    },
    #[error("field `{field}` at offset {offset}: element size is zero")]
    ZeroSizedElement { field: String, offset: usize },
    #[error("field `{field}` at offset {offset}: size does not fit the address space")]
    SizeOverflow { field: String, offset: usize },
    #[error("field `{field}` at offset {offset}: name already used by the field at offset {first_offset}")]
    DuplicateName {
        field: String,
        offset: usize,
        first_offset: usize,
    },
    #[error("directive at offset {offset}: {reason}")]
    AmbiguousDirective { offset: usize, reason: String },
}

/// Compilation of one structure failed; nothing may be handed to emitters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("structure `{structure}`: {source}")]
    Structural {
        structure: String,
        #[source]
        source: StructuralError,
    },
    #[error("structure `{structure}`: {} autoscale error(s)", .errors.len())]
    Autoscale {
        structure: String,
        errors: Vec<AutoscaleError>,
    },
}

/// Compiler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutOptions {
    /// Backing word for runs of bit fields.
    pub bit_word: BitWord,
    /// Byte order of multi-byte values in the configuration image.
    pub endianness: Endianness,
}

impl LayoutOptions {
    pub fn with_bit_word(mut self, bit_word: BitWord) -> Self {
        self.bit_word = bit_word;
        self
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }
}

/// One placed field.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub name: String,
    pub offset: usize,
    /// Bytes occupied; for bits, the size of the backing word.
    pub size: usize,
    /// Bit index within the backing word, for bit fields.
    pub bit: Option<u32>,
    /// The concrete descriptor (iterate templates appear as their expanded instances).
    pub descriptor: FieldDescriptor,
    pub autoscale: Option<Autoscale>,
}

impl LayoutEntry {
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    pub fn is_bit(&self) -> bool {
        self.bit.is_some()
    }

    pub fn element_type(&self) -> Option<ElementType> {
        self.descriptor.element_type()
    }

    pub fn element_count(&self) -> usize {
        self.descriptor.array_sizes().iter().product::<usize>().max(1)
    }
}

/// Compiled layout of one structure. Immutable; recompile from descriptors to change it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayout {
    name: String,
    entries: Vec<LayoutEntry>,
    total_size: usize,
    by_name: HashMap<String, usize>,
    options: LayoutOptions,
}

impl ResolvedLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Size of the structure including directive padding.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Options the layout was compiled with.
    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn get(&self, name: &str) -> Option<&LayoutEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayoutEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a ResolvedLayout {
    type Item = &'a LayoutEntry;
    type IntoIter = std::slice::Iter<'a, LayoutEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenWord {
    offset: usize,
    next_bit: u32,
}

/// State of one compilation; owned by the call to [`LayoutCompiler::compile`].
struct Pass<'o> {
    options: &'o LayoutOptions,
    cursor: usize,
    word: Option<OpenWord>,
    entries: Vec<LayoutEntry>,
    by_name: HashMap<String, usize>,
    autoscale_errors: Vec<AutoscaleError>,
}

impl<'o> Pass<'o> {
    fn new(options: &'o LayoutOptions) -> Self {
        Pass {
            options,
            cursor: 0,
            word: None,
            entries: Vec::new(),
            by_name: HashMap::new(),
            autoscale_errors: Vec::new(),
        }
    }

    fn place(&mut self, current: &FieldDescriptor, next: &FieldDescriptor) -> Result<(), StructuralError> {
        match current {
            FieldDescriptor::Directive(d) => self.place_directive(current, *d, next),
            FieldDescriptor::Bit(b) => self.place_bit(b, next),
            FieldDescriptor::Iterate(t) => {
                if t.count == 0 {
                    return Err(StructuralError::NonPositiveCount {
                        field: t.template.name.clone(),
                        offset: self.cursor,
                    });
                }
                if t.checked_size().and_then(|size| self.cursor.checked_add(size)).is_none() {
                    return Err(StructuralError::SizeOverflow {
                        field: t.template.name.clone(),
                        offset: self.cursor,
                    });
                }
                trace!(template = %t.template.name, count = t.count, stride = t.stride(), "expanding iterate");
                for instance in t.expand() {
                    self.place_data(instance)?;
                }
                Ok(())
            }
            FieldDescriptor::Data(f) => self.place_data(f.clone()),
            FieldDescriptor::Void => Ok(()),
        }
    }

    fn place_directive(
        &mut self,
        current: &FieldDescriptor,
        directive: Directive,
        next: &FieldDescriptor,
    ) -> Result<(), StructuralError> {
        let pad = match directive {
            Directive::Pad(_) => current.size_with_word(next, self.options.bit_word),
            Directive::AlignNext => {
                let align = match next {
                    FieldDescriptor::Data(_) | FieldDescriptor::Iterate(_) => next.alignment().max(1),
                    FieldDescriptor::Bit(_) => self.options.bit_word.size(),
                    FieldDescriptor::Directive(_) => {
                        return Err(StructuralError::AmbiguousDirective {
                            offset: self.cursor,
                            reason: "alignment followed by another directive".to_string(),
                        })
                    }
                    FieldDescriptor::Void => {
                        return Err(StructuralError::AmbiguousDirective {
                            offset: self.cursor,
                            reason: "alignment at the end of the structure".to_string(),
                        })
                    }
                };
                (align - self.cursor % align) % align
            }
        };
        trace!(offset = self.cursor, pad, "directive");
        self.cursor = self.advance("padding", self.cursor, pad)?;
        Ok(())
    }

    fn place_bit(&mut self, b: &BitField, next: &FieldDescriptor) -> Result<(), StructuralError> {
        let width = self.options.bit_word.bits();
        let word = match self.word {
            Some(w) => {
                self.check_declared(&b.name, b.offset, w.offset)?;
                w
            }
            None => {
                self.check_declared(&b.name, b.offset, self.cursor)?;
                OpenWord {
                    offset: self.cursor,
                    next_bit: 0,
                }
            }
        };
        let bit = match b.bit {
            Some(bit) if bit >= width => {
                return Err(StructuralError::BitOutOfRange {
                    field: b.name.clone(),
                    offset: word.offset,
                    bit,
                    width,
                })
            }
            Some(bit) if bit < word.next_bit => {
                return Err(StructuralError::BitCollision {
                    field: b.name.clone(),
                    offset: word.offset,
                    bit,
                    next_free: word.next_bit,
                })
            }
            Some(bit) => bit,
            None => word.next_bit,
        };
        self.push(LayoutEntry {
            name: b.name.clone(),
            offset: word.offset,
            size: self.options.bit_word.size(),
            bit: Some(bit),
            descriptor: FieldDescriptor::Bit(b.clone()),
            autoscale: None,
        })?;
        let word = OpenWord {
            offset: word.offset,
            next_bit: bit + 1,
        };
        if word.next_bit == width || !next.is_bit() {
            self.cursor = self.advance(&b.name, word.offset, self.options.bit_word.size())?;
            self.word = None;
        } else {
            self.word = Some(word);
        }
        Ok(())
    }

    fn place_data(&mut self, f: DataField) -> Result<(), StructuralError> {
        let offset = self.cursor;
        if let Some(index) = f.array_sizes.iter().position(|&d| d == 0) {
            return Err(StructuralError::ZeroDimension {
                field: f.name,
                offset,
                index,
            });
        }
        if f.ty.element_size() == 0 {
            return Err(StructuralError::ZeroSizedElement { field: f.name, offset });
        }
        self.check_declared(&f.name, f.offset, offset)?;
        let size = f
            .checked_footprint()
            .ok_or_else(|| StructuralError::SizeOverflow {
                field: f.name.clone(),
                offset,
            })?;
        let end = self.advance(&f.name, offset, size)?;

        let autoscale = match &f.autoscale {
            None => None,
            Some(spec) => {
                let validated = match f.ty.primitive() {
                    Some(storage) => Autoscale::from_spec(spec, storage),
                    None => Err(AutoscaleFault::NonIntegerStorage(f.ty.name().to_string())),
                };
                match validated {
                    Ok(a) => Some(a),
                    Err(fault) => {
                        self.autoscale_errors.push(AutoscaleError {
                            field: f.name.clone(),
                            offset,
                            fault,
                        });
                        None
                    }
                }
            }
        };

        self.push(LayoutEntry {
            name: f.name.clone(),
            offset,
            size,
            bit: None,
            descriptor: FieldDescriptor::Data(f),
            autoscale,
        })?;
        self.cursor = end;
        Ok(())
    }

    fn advance(&self, field: &str, offset: usize, size: usize) -> Result<usize, StructuralError> {
        offset.checked_add(size).ok_or_else(|| StructuralError::SizeOverflow {
            field: field.to_string(),
            offset,
        })
    }

    fn check_declared(&self, field: &str, declared: Option<usize>, at: usize) -> Result<(), StructuralError> {
        match declared {
            None => Ok(()),
            Some(d) if d == at => Ok(()),
            Some(d) if d < at => match self.entries.iter().rev().find(|e| e.offset <= d && d < e.end()) {
                Some(other) => Err(StructuralError::Overlap {
                    field: field.to_string(),
                    offset: d,
                    other: other.name.clone(),
                    other_offset: other.offset,
                    other_end: other.end(),
                }),
                None => Err(StructuralError::PaddingOverlap {
                    field: field.to_string(),
                    offset: d,
                }),
            },
            Some(d) => Err(StructuralError::UnexpectedGap {
                field: field.to_string(),
                declared: d,
                offset: at,
            }),
        }
    }

    fn push(&mut self, entry: LayoutEntry) -> Result<(), StructuralError> {
        if let Some(&first) = self.by_name.get(&entry.name) {
            return Err(StructuralError::DuplicateName {
                field: entry.name,
                offset: entry.offset,
                first_offset: self.entries[first].offset,
            });
        }
        trace!(field = %entry.name, offset = entry.offset, size = entry.size, bit = ?entry.bit, "placed");
        self.by_name.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }
}

/// Compiles descriptor sequences with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct LayoutCompiler {
    options: LayoutOptions,
}

impl LayoutCompiler {
    pub fn new(options: LayoutOptions) -> Self {
        LayoutCompiler { options }
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    /// Compile one structure. Fails without a partial layout.
    pub fn compile(&self, name: &str, descriptors: &[FieldDescriptor]) -> Result<ResolvedLayout, CompileError> {
        let mut pass = Pass::new(&self.options);
        let windows = descriptors
            .iter()
            .zip(descriptors.iter().skip(1).chain(iter::once(&VOID)));
        for (current, next) in windows {
            pass.place(current, next).map_err(|source| CompileError::Structural {
                structure: name.to_string(),
                source,
            })?;
        }
        if !pass.autoscale_errors.is_empty() {
            return Err(CompileError::Autoscale {
                structure: name.to_string(),
                errors: pass.autoscale_errors,
            });
        }
        debug_assert!(entries_disjoint(&pass.entries), "overlapping entries in `{}`", name);
        debug!(structure = name, entries = pass.entries.len(), total_size = pass.cursor, "compiled layout");
        Ok(ResolvedLayout {
            name: name.to_string(),
            entries: pass.entries,
            total_size: pass.cursor,
            by_name: pass.by_name,
            options: self.options,
        })
    }
}

/// Non-bit entries never overlap and bits sharing a word have increasing indices.
fn entries_disjoint(entries: &[LayoutEntry]) -> bool {
    let mut end = 0;
    let mut word: Option<(usize, u32)> = None;
    for e in entries {
        match (e.bit, word) {
            (Some(bit), Some((offset, last))) if offset == e.offset => {
                if bit <= last {
                    return false;
                }
                word = Some((offset, bit));
            }
            (bit, _) => {
                if e.offset < end {
                    return false;
                }
                end = e.end();
                word = bit.map(|b| (e.offset, b));
            }
        }
    }
    true
}

/// Compile with default options (32-bit bit words, little-endian image).
pub fn compile(name: &str, descriptors: &[FieldDescriptor]) -> Result<ResolvedLayout, CompileError> {
    LayoutCompiler::default().compile(name, descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u8f(name: &str) -> FieldDescriptor {
        FieldDescriptor::scalar(name, ElementType::UInt8)
    }

    #[test]
    fn bit_run_closes_when_word_full() {
        let options = LayoutOptions::default().with_bit_word(BitWord::U8);
        let mut fields: Vec<FieldDescriptor> = (0..10).map(|i| FieldDescriptor::bit(format!("b{}", i))).collect();
        fields.push(u8f("after"));
        let layout = LayoutCompiler::new(options).compile("s", &fields).unwrap();
        assert_eq!(layout.get("b7").map(|e| (e.offset, e.bit)), Some((0, Some(7))));
        assert_eq!(layout.get("b8").map(|e| (e.offset, e.bit)), Some((1, Some(0))));
        assert_eq!(layout.get("after").map(|e| e.offset), Some(2));
        assert_eq!(layout.total_size(), 3);
    }

    #[test]
    fn explicit_bit_may_skip_but_not_go_back() {
        let ok = compile(
            "s",
            &[
                FieldDescriptor::bit("a"),
                BitField::new("b").at_bit(5).into(),
                FieldDescriptor::bit("c"),
            ],
        )
        .unwrap();
        assert_eq!(ok.get("c").and_then(|e| e.bit), Some(6));

        let err = compile(
            "s",
            &[FieldDescriptor::bit("a"), FieldDescriptor::bit("b"), BitField::new("c").at_bit(1).into()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::BitCollision { bit: 1, next_free: 2, .. },
                ..
            }
        ));
    }

    #[test]
    fn bit_beyond_word_rejected() {
        let err = compile("s", &[BitField::new("a").at_bit(32).into()]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::BitOutOfRange { width: 32, .. },
                ..
            }
        ));
    }

    #[test]
    fn align_next_pads_to_next_alignment() {
        let layout = compile(
            "s",
            &[u8f("a"), FieldDescriptor::align_next(), FieldDescriptor::scalar("f", ElementType::Float)],
        )
        .unwrap();
        assert_eq!(layout.get("f").map(|e| e.offset), Some(4));
        assert_eq!(layout.total_size(), 8);
    }

    #[test]
    fn align_next_at_end_is_ambiguous() {
        let err = compile("s", &[u8f("a"), FieldDescriptor::align_next()]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::AmbiguousDirective { offset: 1, .. },
                ..
            }
        ));
    }

    #[test]
    fn declared_offset_beyond_cursor_is_gap() {
        let err = compile("s", &[u8f("a"), DataField::new("b", ElementType::UInt8).with_offset(3).into()]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::UnexpectedGap { declared: 3, offset: 1, .. },
                ..
            }
        ));
    }

    #[test]
    fn declared_offset_into_padding() {
        let err = compile(
            "s",
            &[u8f("a"), FieldDescriptor::pad(3), DataField::new("b", ElementType::UInt8).with_offset(2).into()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::PaddingOverlap { offset: 2, .. },
                ..
            }
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = compile("s", &[u8f("a"), u8f("a")]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::DuplicateName { first_offset: 0, offset: 1, .. },
                ..
            }
        ));
    }

    #[test]
    fn oversized_array_rejected() {
        let err = compile("s", &[FieldDescriptor::array("big", ElementType::UInt32, &[usize::MAX / 2 + 1])]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::SizeOverflow { offset: 0, .. },
                ..
            }
        ));
    }

    #[test]
    fn cursor_overflow_rejected() {
        let err = compile(
            "s",
            &[FieldDescriptor::array("a", ElementType::UInt8, &[usize::MAX]), u8f("b")],
        )
        .unwrap_err();
        match err {
            CompileError::Structural {
                source: StructuralError::SizeOverflow { field, offset },
                ..
            } => {
                assert_eq!(field, "b");
                assert_eq!(offset, usize::MAX);
            }
            other => panic!("expected size overflow, got {:?}", other),
        }
    }

    #[test]
    fn oversized_iterate_rejected() {
        let template = DataField::new("t", ElementType::UInt16).with_dims(&[usize::MAX / 4]);
        let err = compile("s", &[FieldDescriptor::iterate(template, 3)]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::SizeOverflow { .. },
                ..
            }
        ));
    }

    #[test]
    fn padding_overflow_rejected() {
        let err = compile("s", &[u8f("a"), FieldDescriptor::pad(usize::MAX)]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::SizeOverflow { offset: 1, .. },
                ..
            }
        ));
    }

    #[test]
    fn compiled_entries_are_disjoint() {
        let layout = compile(
            "s",
            &[
                u8f("a"),
                FieldDescriptor::bit("b0"),
                FieldDescriptor::bit("b1"),
                FieldDescriptor::iterate(DataField::new("c", ElementType::Int16), 3),
            ],
        )
        .unwrap();
        assert!(entries_disjoint(layout.entries()));

        let entry = |name: &str, offset, size, bit| LayoutEntry {
            name: name.to_string(),
            offset,
            size,
            bit,
            descriptor: VOID.clone(),
            autoscale: None,
        };
        assert!(!entries_disjoint(&[entry("a", 0, 4, None), entry("b", 2, 2, None)]));
        assert!(!entries_disjoint(&[entry("a", 0, 4, Some(3)), entry("b", 0, 4, Some(3))]));
        assert!(!entries_disjoint(&[entry("a", 0, 4, None), entry("b", 0, 4, Some(0))]));
    }

    #[test]
    fn layout_keeps_options() {
        let options = LayoutOptions::default()
            .with_bit_word(BitWord::U8)
            .with_endianness(Endianness::Big);
        let layout = LayoutCompiler::new(options).compile("s", &[u8f("a")]).unwrap();
        assert_eq!(layout.options(), &options);
        assert_eq!(compile("s", &[u8f("a")]).unwrap().options(), &LayoutOptions::default());
    }

    #[test]
    fn zero_dimension_rejected() {
        let err = compile("s", &[FieldDescriptor::array("t", ElementType::UInt8, &[4, 0])]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural {
                source: StructuralError::ZeroDimension { index: 1, .. },
                ..
            }
        ));
    }
}
