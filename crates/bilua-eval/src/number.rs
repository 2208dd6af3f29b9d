//! Lua 5.3 numbers: a tagged int/float pair.
//!
//! Arithmetic keeps integers integral where Lua does: `+ - *` stay `Int`
//! unless they overflow (then the result is promoted to float), `/` and `^`
//! are always float, `//` and `%` follow Lua's floor semantics. Integer
//! division or modulo by zero is an arithmetic error; the float paths
//! produce inf/nan like Lua.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use bilua_common::LuaError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_float(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// The exact integer value, if this number has one (`3` and `3.0` do,
    /// `3.5` and `inf` do not).
    pub fn as_exact_int(self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(i),
            Number::Float(f) => {
                if f.is_finite() && f.trunc() == f && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
        }
    }

    pub fn is_nan(self) -> bool {
        matches!(self, Number::Float(f) if f.is_nan())
    }

    pub fn is_finite(self) -> bool {
        match self {
            Number::Int(_) => true,
            Number::Float(f) => f.is_finite(),
        }
    }

    /* ───────────────────── arithmetic ───────────────────── */

    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match a.checked_add(b) {
                Some(v) => Number::Int(v),
                None => Number::Float(a as f64 + b as f64),
            },
            (a, b) => Number::Float(a.as_float() + b.as_float()),
        }
    }

    pub fn sub(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match a.checked_sub(b) {
                Some(v) => Number::Int(v),
                None => Number::Float(a as f64 - b as f64),
            },
            (a, b) => Number::Float(a.as_float() - b.as_float()),
        }
    }

    pub fn mul(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => match a.checked_mul(b) {
                Some(v) => Number::Int(v),
                None => Number::Float(a as f64 * b as f64),
            },
            (a, b) => Number::Float(a.as_float() * b.as_float()),
        }
    }

    /// `/` — always float; 0/0 is nan, x/0 is ±inf.
    pub fn div(self, other: Number) -> Number {
        Number::Float(self.as_float() / other.as_float())
    }

    /// `//` — floor division.
    pub fn idiv(self, other: Number) -> Result<Number, LuaError> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => {
                if b == 0 {
                    return Err(LuaError::arithmetic("attempt to perform 'n//0'"));
                }
                let q = a.wrapping_div(b);
                let r = a.wrapping_rem(b);
                Ok(Number::Int(if r != 0 && (r < 0) != (b < 0) {
                    q - 1
                } else {
                    q
                }))
            }
            (a, b) => Ok(Number::Float((a.as_float() / b.as_float()).floor())),
        }
    }

    /// `%` — floor modulo: `a % b == a - floor(a/b)*b`.
    pub fn rem(self, other: Number) -> Result<Number, LuaError> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => {
                if b == 0 {
                    return Err(LuaError::arithmetic("attempt to perform 'n%0'"));
                }
                let r = a.wrapping_rem(b);
                Ok(Number::Int(if r != 0 && (r < 0) != (b < 0) {
                    r + b
                } else {
                    r
                }))
            }
            (a, b) => {
                let (a, b) = (a.as_float(), b.as_float());
                Ok(Number::Float(a - (a / b).floor() * b))
            }
        }
    }

    /// `^` — always float.
    pub fn pow(self, other: Number) -> Number {
        Number::Float(self.as_float().powf(other.as_float()))
    }

    pub fn neg(self) -> Number {
        match self {
            Number::Int(i) => match i.checked_neg() {
                Some(v) => Number::Int(v),
                None => Number::Float(-(i as f64)),
            },
            Number::Float(f) => Number::Float(-f),
        }
    }

    /// The 64-bit two's complement view for bitwise operators; errors when
    /// the number has no integer representation.
    pub fn as_bitwise_int(self) -> Result<i64, LuaError> {
        self.as_exact_int()
            .ok_or_else(|| LuaError::arithmetic("number has no integer representation"))
    }

    /* ───────────────────── comparison ───────────────────── */

    pub fn num_eq(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_float() == b.as_float(),
        }
    }

    pub fn num_cmp(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_float().partial_cmp(&b.as_float()),
        }
    }

    /* ───────────────────── rendering ───────────────────── */

    /// Source-literal form: ints as digits, floats in shortest roundtrip
    /// form with a forced fractional part (`14.0`, not `14`). Non-finite
    /// floats have no literal form.
    pub fn to_literal(self) -> Option<String> {
        match self {
            Number::Int(i) => Some(i.to_string()),
            Number::Float(f) if f.is_finite() => Some(format!("{f:?}")),
            Number::Float(_) => None,
        }
    }

    /// `tostring` form: like the literal, with inf/nan spelled out.
    pub fn display_string(self) -> String {
        match self {
            Number::Int(i) => i.to_string(),
            Number::Float(f) if f.is_nan() => "nan".to_string(),
            Number::Float(f) if f.is_infinite() => {
                if f > 0.0 { "inf" } else { "-inf" }.to_string()
            }
            Number::Float(f) => format!("{f:?}"),
        }
    }
}

/// `3` and `3.0` are equal in Lua, so they must hash alike. NaN never
/// reaches a hash table (table keys reject it).
impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_exact_int() {
            Some(i) => i.hash(state),
            None => self.as_float().to_bits().hash(state),
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number::Int(i)
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number::Float(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_stays_int() {
        assert_eq!(Number::Int(25).add(Number::Int(13)), Number::Int(38));
        assert_eq!(Number::Int(6).mul(Number::Int(7)), Number::Int(42));
    }

    #[test]
    fn division_is_always_float() {
        assert_eq!(Number::Int(6).div(Number::Int(3)), Number::Float(2.0));
        assert_eq!(Number::Int(1).pow(Number::Int(1)), Number::Float(1.0));
    }

    #[test]
    fn overflow_promotes_to_float() {
        let big = Number::Int(i64::MAX);
        match big.add(Number::Int(1)) {
            Number::Float(f) => assert!(f > i64::MAX as f64 - 2.0),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        assert_eq!(
            Number::Int(7).idiv(Number::Int(-2)).unwrap(),
            Number::Int(-4)
        );
        assert_eq!(
            Number::Int(-7).idiv(Number::Int(2)).unwrap(),
            Number::Int(-4)
        );
        assert_eq!(Number::Int(7).idiv(Number::Int(2)).unwrap(), Number::Int(3));
    }

    #[test]
    fn modulo_takes_the_sign_of_the_divisor() {
        assert_eq!(Number::Int(5).rem(Number::Int(3)).unwrap(), Number::Int(2));
        assert_eq!(Number::Int(-5).rem(Number::Int(3)).unwrap(), Number::Int(1));
        assert_eq!(Number::Int(5).rem(Number::Int(-3)).unwrap(), Number::Int(-1));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        assert!(Number::Int(1).idiv(Number::Int(0)).is_err());
        assert!(Number::Int(1).rem(Number::Int(0)).is_err());
        // float path produces inf instead
        assert_eq!(
            Number::Int(1).div(Number::Int(0)),
            Number::Float(f64::INFINITY)
        );
    }

    #[test]
    fn mixed_comparison_is_numeric() {
        assert!(Number::Int(3).num_eq(Number::Float(3.0)));
        assert_eq!(
            Number::Int(2).num_cmp(Number::Float(2.5)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn literal_rendering_roundtrips() {
        assert_eq!(Number::Int(38).to_literal().unwrap(), "38");
        assert_eq!(Number::Float(14.0).to_literal().unwrap(), "14.0");
        assert_eq!(Number::Float(0.1).to_literal().unwrap(), "0.1");
        assert_eq!(Number::Float(f64::INFINITY).to_literal(), None);
    }
}
