//! Layout fuzz target: turn arbitrary bytes into a descriptor sequence and compile it.
//! The compiler must not panic; it returns a layout or a structural/autoscale error.
//! Build with: cargo fuzz run layout_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use cfglayout::{BitField, DataField, ElementType, FieldDescriptor};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn descriptor(i: usize, pair: &[u8]) -> FieldDescriptor {
    let (op, arg) = (pair[0], pair[1] as usize);
    let ty = match arg % 7 {
        0 => ElementType::Int8,
        1 => ElementType::UInt8,
        2 => ElementType::Int16,
        3 => ElementType::UInt16,
        4 => ElementType::Int32,
        5 => ElementType::UInt32,
        _ => ElementType::Float,
    };
    match op % 8 {
        0 => FieldDescriptor::scalar(format!("f{}", i), ty),
        1 => FieldDescriptor::array(format!("a{}", i), ty, &[arg % 5, 1 + arg % 3]),
        2 => FieldDescriptor::bit(format!("b{}", i)),
        3 => BitField::new(format!("e{}", i)).at_bit(arg as u32 % 40).into(),
        4 => FieldDescriptor::pad(arg % 4),
        5 => FieldDescriptor::align_next(),
        6 => FieldDescriptor::iterate(DataField::new(format!("t{}_", i), ty), arg % 4),
        _ => DataField::new(format!("o{}", i), ty).with_offset(arg).with_scale(arg as f64 - 8.0, 0.0).into(),
    }
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let fields: Vec<FieldDescriptor> = data
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| descriptor(i, pair))
        .collect();
    if let Ok(layout) = cfglayout::compile("fuzz", &fields) {
        let _ = cfglayout::FieldTable::from_layout(&layout);
        let _ = cfglayout::lint::lint(&layout);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run layout_fuzz");
}
