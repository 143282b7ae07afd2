//! Autoscale fuzz target: feed arbitrary text to the spec parser and, when it validates,
//! through encode/decode. Nothing may panic.
//! Build with: cargo fuzz run autoscale_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let _ = cfglayout::autoscale::parse_spec(s);
    if let Ok(a) = cfglayout::Autoscale::from_spec(s, cfglayout::ElementType::Int16) {
        for v in [f64::MIN, -1.0, 0.0, 1.0, f64::MAX, f64::NAN] {
            let _ = a.decode(&a.encode(v));
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run autoscale_fuzz");
}
