//! # cfglayout — Configuration Structure Layout Compiler
//!
//! Compiles an ordered list of field descriptors describing an embedded device's
//! in-memory configuration structure into a resolved binary layout: every field's byte
//! offset, size and bit position, plus the scaling metadata consumers need to read and
//! write values without re-deriving the layout.
//!
//! ## Field kinds
//!
//! - Scalars and arrays of `int8_t` … `uint32_t`, `float`, or a nested compiled structure
//! - Bits: packed into a shared backing word (32-bit by default), one bit per field
//! - Iterate templates: one definition unrolled into `N` indexed instances
//! - Directives: `Pad(n)` and `AlignNext`, which move the cursor but emit no field
//! - `Void`: the neutral descriptor every query answers with an empty value
//!
//! Scaled fields carry an autoscale spec: `v = s / scale + bias` between the engineering
//! value `v` and the stored integer `s`.
//!
//! ## Example
//!
//! ```
//! use cfglayout::{compile, DataField, ElementType, FieldDescriptor};
//!
//! let layout = compile(
//!     "pid_state",
//!     &[
//!         FieldDescriptor::scalar("iTerm", ElementType::Float),
//!         FieldDescriptor::scalar("dTerm", ElementType::Float),
//!         FieldDescriptor::bit("isEnabled"),
//!         DataField::new("clt", ElementType::Int16).with_scale(10.0, 0.0).into(),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(layout.get("dTerm").map(|e| e.offset), Some(4));
//! assert_eq!(layout.get("clt").map(|e| e.offset), Some(12));
//! ```
//!
//! Descriptors come from a definition parser and layouts go to emitters; neither lives in
//! this crate. [`FieldTable`] is the flat `(name, offset, type)` listing emitters reproduce.

pub mod autoscale;
pub mod codec;
pub mod descriptor;
pub mod layout;
pub mod lint;
pub mod table;
pub mod types;
pub mod value;

pub use autoscale::{Autoscale, AutoscaleError, AutoscaleFault};
pub use codec::{CodecError, Endianness, ImageCodec};
pub use descriptor::{
    BitField, BitWord, DataField, Directive, FieldDescriptor, FieldMeta, IterateOrigin,
    IterateTemplate, VOID,
};
pub use layout::{
    compile, CompileError, LayoutCompiler, LayoutEntry, LayoutOptions, ResolvedLayout,
    StructuralError,
};
pub use table::{FieldTable, TableRow};
pub use types::{ElementType, FieldType, StructureType, TableType};
pub use value::Value;
