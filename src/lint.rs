//! Linter for compiled layouts: findings that do not make a layout invalid but usually
//! point at a definition mistake.
//!
//! ## Rules
//!
//! - **Misaligned**: a field's offset is not a multiple of its element alignment. An error for
//!   floats (the FPU load faults on unaligned addresses), a warning otherwise.
//! - **Partial bit word**: a closed bit word leaves bits unused.
//! - **Size not a word multiple**: the structure size is not a multiple of the bit-word size,
//!   so arrays of the structure would misalign their members.

use crate::layout::ResolvedLayout;
use crate::table::describe_type;
use crate::types::ElementType;

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    Misaligned,
    PartialBitWord,
    SizeNotWordMultiple,
}

impl LintRule {
    pub fn id(&self) -> &'static str {
        match self {
            LintRule::Misaligned => "misaligned",
            LintRule::PartialBitWord => "partial-bit-word",
            LintRule::SizeNotWordMultiple => "size-not-word-multiple",
        }
    }
}

/// A single lint message, located by field and offset.
#[derive(Debug, Clone)]
pub struct LintMessage {
    pub field: Option<String>,
    pub offset: usize,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
}

/// Run all lint rules on a layout, against the bit word it was compiled with.
pub fn lint(layout: &ResolvedLayout) -> Vec<LintMessage> {
    let mut out = Vec::new();
    let options = layout.options();
    let word_bits = options.bit_word.bits();

    let mut i = 0;
    let entries = layout.entries();
    while i < entries.len() {
        let e = &entries[i];
        if e.is_bit() {
            // bits of one word are contiguous in the entry list
            let mut used = 0u32;
            let mut last = i;
            while last < entries.len() && entries[last].is_bit() && entries[last].offset == e.offset {
                used = used.max(entries[last].bit.unwrap_or(0) + 1);
                last += 1;
            }
            if used < word_bits {
                out.push(LintMessage {
                    field: Some(e.name.clone()),
                    offset: e.offset,
                    rule: LintRule::PartialBitWord,
                    severity: Severity::Warning,
                    message: format!("bit word at {} uses {} of {} bits", e.offset, used, word_bits),
                });
            }
            i = last;
            continue;
        }

        let align = e.descriptor.alignment().max(1);
        if e.offset % align != 0 {
            out.push(LintMessage {
                field: Some(e.name.clone()),
                offset: e.offset,
                rule: LintRule::Misaligned,
                severity: if e.element_type() == Some(ElementType::Float) {
                    Severity::Error
                } else {
                    Severity::Warning
                },
                message: format!(
                    "`{}` ({}) at offset {} is not {}-byte aligned",
                    e.name,
                    describe_type(e),
                    e.offset,
                    align
                ),
            });
        }
        i += 1;
    }

    let word = options.bit_word.size();
    if layout.total_size() % word != 0 {
        out.push(LintMessage {
            field: None,
            offset: layout.total_size(),
            rule: LintRule::SizeNotWordMultiple,
            severity: Severity::Warning,
            message: format!(
                "structure `{}` size {} is not a multiple of {}",
                layout.name(),
                layout.total_size(),
                word
            ),
        });
    }

    out
}
