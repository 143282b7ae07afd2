//! Autoscale: mapping between engineering-unit values and compact stored integers.
//!
//! A scaled field stores an integer `s`; its engineering value is `v = s / scale + bias`.
//! Encoding is the inverse, `s = round((v - bias) * scale)`, saturated to the storage type.
//!
//! ## Spec text
//!
//! Descriptors carry the raw spec text as written in the definition:
//!
//! ```text
//! 10            scale 10, bias 0   (0.1 resolution)
//! 1/0.5, -40    scale 2, bias -40
//! {2^7}         scale 128
//! ```

use crate::types::ElementType;
use crate::value::Value;

/// Why an autoscale spec was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AutoscaleFault {
    #[error("malformed autoscale spec `{0}`")]
    Malformed(String),
    #[error("scale is zero")]
    ZeroScale,
    #[error("scale {0} is not finite")]
    NonFiniteScale(f64),
    #[error("bias {0} is not finite")]
    NonFiniteBias(f64),
    #[error("storage type `{0}` is not an integer type")]
    NonIntegerStorage(String),
}

/// Autoscale rejected for a specific field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field `{field}` at offset {offset}: {fault}")]
pub struct AutoscaleError {
    pub field: String,
    pub offset: usize,
    pub fault: AutoscaleFault,
}

/// Parse spec text into `(scale, bias)`. Bias defaults to 0.
pub fn parse_spec(text: &str) -> Option<(f64, f64)> {
    let s = text.trim();
    let s = s
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(s)
        .trim();
    if s.is_empty() {
        return None;
    }
    let (scale_str, bias_str) = match s.find(',') {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    };
    let scale = parse_scale_expr(scale_str)?;
    let bias = match bias_str {
        Some(b) => b.trim().parse::<f64>().ok()?,
        None => 0.0,
    };
    Some((scale, bias))
}

fn parse_scale_expr(s: &str) -> Option<f64> {
    let s = s.trim().trim_start_matches('{').trim_end_matches('}').trim();
    if let Some((num, denom)) = s.split_once('/') {
        // a single quotient only
        if denom.contains('/') {
            return None;
        }
        return Some(parse_scale_expr(num)? / parse_scale_expr(denom)?);
    }
    if let Some(exp_str) = s.strip_prefix("2^") {
        let exp_str = exp_str.trim_matches(|c| c == '(' || c == ')');
        let exp: i32 = exp_str.parse().ok()?;
        if exp.unsigned_abs() > 62 {
            return None;
        }
        return Some(2f64.powi(exp));
    }
    s.parse::<f64>().ok()
}

/// Validated `(scale, bias)` pair bound to an integer storage type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Autoscale {
    scale: f64,
    bias: f64,
    storage: ElementType,
}

impl Autoscale {
    pub fn new(scale: f64, bias: f64, storage: ElementType) -> Result<Self, AutoscaleFault> {
        if !scale.is_finite() {
            return Err(AutoscaleFault::NonFiniteScale(scale));
        }
        if scale == 0.0 {
            return Err(AutoscaleFault::ZeroScale);
        }
        if !bias.is_finite() {
            return Err(AutoscaleFault::NonFiniteBias(bias));
        }
        if !storage.is_integer() {
            return Err(AutoscaleFault::NonIntegerStorage(storage.c_name().to_string()));
        }
        Ok(Autoscale { scale, bias, storage })
    }

    /// Parse and validate spec text in one step.
    pub fn from_spec(text: &str, storage: ElementType) -> Result<Self, AutoscaleFault> {
        let (scale, bias) =
            parse_spec(text).ok_or_else(|| AutoscaleFault::Malformed(text.to_string()))?;
        Autoscale::new(scale, bias, storage)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn storage(&self) -> ElementType {
        self.storage
    }

    /// Engineering-unit step of one stored count.
    pub fn resolution(&self) -> f64 {
        1.0 / self.scale
    }

    /// Stored integer for `v`, rounded half away from zero and saturated to the storage range.
    pub fn encode_raw(&self, v: f64) -> i64 {
        let (lo, hi) = self.storage.range();
        let s = ((v - self.bias) * self.scale).round();
        if s.is_nan() {
            return 0i64.clamp(lo as i64, hi as i64);
        }
        s.clamp(lo, hi) as i64
    }

    pub fn encode(&self, v: f64) -> Value {
        Value::from_integer(self.storage, self.encode_raw(v))
    }

    pub fn decode_raw(&self, s: i64) -> f64 {
        s as f64 / self.scale + self.bias
    }

    pub fn decode(&self, stored: &Value) -> f64 {
        self.decode_raw(stored.as_i64().unwrap_or(0))
    }

    /// Engineering-unit range representable by the storage type.
    pub fn value_range(&self) -> (f64, f64) {
        let (lo, hi) = self.storage.range();
        let a = self.decode_raw(lo as i64);
        let b = self.decode_raw(hi as i64);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_scale() {
        assert_eq!(parse_spec("10"), Some((10.0, 0.0)));
        assert_eq!(parse_spec("{2^7}"), Some((128.0, 0.0)));
        assert_eq!(parse_spec("1/0.5, -40"), Some((2.0, -40.0)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_spec(""), None);
        assert_eq!(parse_spec("{}"), None);
        assert_eq!(parse_spec("ten"), None);
        assert_eq!(parse_spec("10, x"), None);
        assert_eq!(parse_spec("1/2/4"), None);
        assert_eq!(parse_spec("1/2^3"), Some((0.125, 0.0)));
    }

    #[test]
    fn zero_scale_rejected() {
        assert_eq!(
            Autoscale::new(0.0, 0.0, ElementType::UInt8),
            Err(AutoscaleFault::ZeroScale)
        );
        assert!(matches!(
            Autoscale::from_spec("1/0", ElementType::UInt8),
            Err(AutoscaleFault::NonFiniteScale(_))
        ));
    }

    #[test]
    fn float_storage_rejected() {
        assert!(matches!(
            Autoscale::new(10.0, 0.0, ElementType::Float),
            Err(AutoscaleFault::NonIntegerStorage(_))
        ));
    }

    #[test]
    fn encode_clamps_to_storage() {
        let a = Autoscale::new(2.0, -64.0, ElementType::UInt8).unwrap();
        // timing advance: (A/2)-64
        assert_eq!(a.encode(10.0), Value::U8(148));
        assert_eq!(a.encode(-100.0), Value::U8(0));
        assert_eq!(a.encode(1000.0), Value::U8(255));
        assert_eq!(a.decode(&Value::U8(148)), 10.0);
    }

    #[test]
    fn round_trip_within_one_count() {
        let a = Autoscale::new(100.0, 0.0, ElementType::UInt16).unwrap();
        let (lo, hi) = a.value_range();
        let mut v = lo;
        while v <= hi {
            let back = a.decode(&a.encode(v));
            assert!((back - v).abs() <= a.resolution(), "{} -> {}", v, back);
            v += 3.7;
        }
    }

    #[test]
    fn negative_scale_range_is_ordered() {
        let a = Autoscale::new(-10.0, 0.0, ElementType::Int8).unwrap();
        let (lo, hi) = a.value_range();
        assert!(lo < hi);
    }
}
