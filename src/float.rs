//! Arbitrary-precision binary floating point.
//!
//! A `BigFloat` is one of four classes: finite nonzero, signed zero,
//! signed infinity, or NaN. Finite values are stored sign-magnitude as a
//! `BigUint` mantissa plus the binary exponent of the mantissa's leading
//! bit, so the value is `±mant × 2^(exp − bits(mant) + 1)`. The exponent is
//! idealized (no subnormal range); it saturates only at the far-out
//! [`crate::env::EXP_LIMIT`] wall, where the overflow/underflow flags
//! fire.
//!
//! Mantissa length encodes the precision a value was produced at: results
//! rounded inexactly keep exactly the environment's precision in bits
//! (trailing zeros included), exact results are stored in canonical
//! minimal form. Numeric comparison ignores the distinction.
//!
//! All arithmetic is correctly rounded: the exact mathematical result is
//! formed (or tracked with a sticky tail) and rounded once by
//! `crate::round`. Domain problems are soft failures: NaN or an
//! infinity comes back and a sticky flag is raised on the environment;
//! no arithmetic here returns `Result`.

use std::cmp::Ordering;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Signed, ToPrimitive, Zero};

use crate::env::{with_active, FloatEnv, RoundingMode};
use crate::round::round_in_env;

#[derive(Debug, Clone)]
enum Repr {
    /// Nonzero finite value. `mant` is nonzero; `exp` is the exponent of
    /// its most significant bit.
    Finite { neg: bool, exp: i64, mant: BigUint },
    Zero { neg: bool },
    Inf { neg: bool },
    Nan,
}

/// An arbitrary-precision binary floating-point value.
#[derive(Debug, Clone)]
pub struct BigFloat {
    repr: Repr,
}

impl BigFloat {
    pub(crate) fn from_raw(neg: bool, mant: BigUint, exp: i64) -> BigFloat {
        debug_assert!(!mant.is_zero());
        BigFloat {
            repr: Repr::Finite { neg, exp, mant },
        }
    }

    pub fn zero(negative: bool) -> BigFloat {
        BigFloat {
            repr: Repr::Zero { neg: negative },
        }
    }

    pub fn infinity(negative: bool) -> BigFloat {
        BigFloat {
            repr: Repr::Inf { neg: negative },
        }
    }

    pub fn nan() -> BigFloat {
        BigFloat { repr: Repr::Nan }
    }

    /// Exact conversion from a big integer.
    pub fn from_bigint(n: &BigInt) -> BigFloat {
        if n.is_zero() {
            return BigFloat::zero(false);
        }
        let mant = n.magnitude().clone();
        let exp = mant.bits() as i64 - 1;
        BigFloat::from_raw(n.is_negative(), mant, exp)
    }

    /// Exact conversion from an `f64`; NaN and infinities map to the
    /// corresponding specials, -0.0 stays negative zero.
    pub fn from_f64(x: f64) -> BigFloat {
        if x.is_nan() {
            return BigFloat::nan();
        }
        if x.is_infinite() {
            return BigFloat::infinity(x.is_sign_negative());
        }
        if x == 0.0 {
            return BigFloat::zero(x.is_sign_negative());
        }
        let bits = x.to_bits();
        let neg = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7ff) as i64;
        let frac = bits & ((1u64 << 52) - 1);
        let (mant, lsb_exp) = if biased == 0 {
            // subnormal
            (frac, -1074)
        } else {
            (frac | (1u64 << 52), biased - 1075)
        };
        // Canonical form: odd mantissa, so exact values stay minimal.
        let tz = mant.trailing_zeros();
        let mant = BigUint::from(mant >> tz);
        let exp = lsb_exp + tz as i64 + mant.bits() as i64 - 1;
        BigFloat::from_raw(neg, mant, exp)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.repr, Repr::Nan)
    }

    pub fn is_finite(&self) -> bool {
        matches!(self.repr, Repr::Finite { .. } | Repr::Zero { .. })
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self.repr, Repr::Inf { .. })
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.repr, Repr::Zero { .. })
    }

    pub fn is_sign_positive(&self) -> bool {
        !self.is_sign_negative()
    }

    pub fn is_sign_negative(&self) -> bool {
        match self.repr {
            Repr::Finite { neg, .. } | Repr::Zero { neg } | Repr::Inf { neg } => neg,
            Repr::Nan => false,
        }
    }

    /// True when the value is finite and mathematically an integer.
    /// Mantissas need not be canonical, so trailing zeros count toward
    /// the integer test.
    pub fn is_integer(&self) -> bool {
        match &self.repr {
            Repr::Zero { .. } => true,
            Repr::Finite { exp, mant, .. } => {
                let tz = mant.trailing_zeros().unwrap_or(0) as i64;
                *exp + 1 + tz >= mant.bits() as i64
            }
            _ => false,
        }
    }

    /// Exponent of the leading bit (`⌊log2 |x|⌋`) for finite nonzero
    /// values.
    pub fn exponent(&self) -> Option<i64> {
        match &self.repr {
            Repr::Finite { exp, .. } => Some(*exp),
            _ => None,
        }
    }

    /// `-1`, `0`, or `+1` by sign, as a float; NaN propagates, signed
    /// zeros are returned unchanged.
    pub fn signum(&self) -> BigFloat {
        match &self.repr {
            Repr::Nan => BigFloat::nan(),
            Repr::Zero { neg } => BigFloat::zero(*neg),
            Repr::Finite { neg, .. } | Repr::Inf { neg } => {
                let one = BigUint::from(1u8);
                BigFloat::from_raw(*neg, one, 0)
            }
        }
    }

    pub fn abs(&self) -> BigFloat {
        let mut out = self.clone();
        match &mut out.repr {
            Repr::Finite { neg, .. } | Repr::Zero { neg } | Repr::Inf { neg } => *neg = false,
            Repr::Nan => {}
        }
        out
    }

    pub fn neg(&self) -> BigFloat {
        let mut out = self.clone();
        match &mut out.repr {
            Repr::Finite { neg, .. } | Repr::Zero { neg } | Repr::Inf { neg } => *neg = !*neg,
            Repr::Nan => {}
        }
        out
    }

    pub(crate) fn finite_parts(&self) -> Option<(&BigUint, i64)> {
        match &self.repr {
            Repr::Finite { exp, mant, .. } => Some((mant, *exp)),
            _ => None,
        }
    }

    /// Signed scaled-integer form of a finite value: `(m, e)` with
    /// value = `m × 2^e`, `m` odd (trailing mantissa zeros are folded
    /// into `e`, so `e >= 0` iff the value is an integer). Zero maps to
    /// `(0, 0)`.
    pub(crate) fn to_scaled(&self) -> Option<(BigInt, i64)> {
        match &self.repr {
            Repr::Zero { .. } => Some((BigInt::zero(), 0)),
            Repr::Finite { neg, exp, mant } => {
                let tz = mant.trailing_zeros().unwrap_or(0);
                let sign = if *neg { Sign::Minus } else { Sign::Plus };
                let m = BigInt::from_biguint(sign, mant >> tz);
                Some((m, exp - mant.bits() as i64 + 1 + tz as i64))
            }
            _ => None,
        }
    }

    /// Exact numeric comparison; `None` when either operand is NaN.
    /// Signed zeros compare equal.
    pub fn compare(&self, rhs: &BigFloat) -> Option<Ordering> {
        use Repr::*;
        Some(match (&self.repr, &rhs.repr) {
            (Nan, _) | (_, Nan) => return None,
            (Zero { .. }, Zero { .. }) => Ordering::Equal,
            (Inf { neg: a }, Inf { neg: b }) => b.cmp(a),
            (Inf { neg }, _) => {
                if *neg {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (_, Inf { neg }) => {
                if *neg {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Zero { .. }, Finite { neg, .. }) => {
                if *neg {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Finite { neg, .. }, Zero { .. }) => {
                if *neg {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Finite { neg: na, exp: ea, mant: ma }, Finite { neg: nb, exp: eb, mant: mb }) => {
                if na != nb {
                    return Some(if *na { Ordering::Less } else { Ordering::Greater });
                }
                let mag = if ea != eb {
                    ea.cmp(eb)
                } else {
                    // Same leading-bit position: align trailing ends.
                    let (ba, bb) = (ma.bits(), mb.bits());
                    let width = ba.max(bb);
                    (ma << (width - ba)).cmp(&(mb << (width - bb)))
                };
                if *na {
                    mag.reverse()
                } else {
                    mag
                }
            }
        })
    }

    /// Correctly rounded addition.
    pub fn add(&self, rhs: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
        with_active(env, |env| {
            use Repr::*;
            match (&self.repr, &rhs.repr) {
                (Nan, _) | (_, Nan) => {
                    env.raise_invalid();
                    BigFloat::nan()
                }
                (Inf { neg: a }, Inf { neg: b }) => {
                    if a == b {
                        BigFloat::infinity(*a)
                    } else {
                        env.raise_invalid();
                        BigFloat::nan()
                    }
                }
                (Inf { neg }, _) | (_, Inf { neg }) => BigFloat::infinity(*neg),
                (Zero { neg: a }, Zero { neg: b }) => {
                    let neg = if a == b {
                        *a
                    } else {
                        env.mode() == RoundingMode::TowardNegative
                    };
                    BigFloat::zero(neg)
                }
                (Zero { .. }, Finite { .. }) => rhs.round_into(env),
                (Finite { .. }, Zero { .. }) => self.round_into(env),
                (Finite { .. }, Finite { .. }) => {
                    let x = self.to_scaled().unwrap();
                    let y = rhs.to_scaled().unwrap();
                    add_exact(x, y, env)
                }
            }
        })
    }

    /// Correctly rounded subtraction (`self + (−rhs)` including zero-sign
    /// rules).
    pub fn sub(&self, rhs: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
        self.add(&rhs.neg(), env)
    }

    /// Correctly rounded multiplication.
    pub fn mul(&self, rhs: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
        with_active(env, |env| {
            use Repr::*;
            let xor_neg = self.is_sign_negative() != rhs.is_sign_negative();
            match (&self.repr, &rhs.repr) {
                (Nan, _) | (_, Nan) => {
                    env.raise_invalid();
                    BigFloat::nan()
                }
                (Inf { .. }, Zero { .. }) | (Zero { .. }, Inf { .. }) => {
                    env.raise_invalid();
                    BigFloat::nan()
                }
                (Inf { .. }, _) | (_, Inf { .. }) => BigFloat::infinity(xor_neg),
                (Zero { .. }, _) | (_, Zero { .. }) => BigFloat::zero(xor_neg),
                (Finite { exp: ea, mant: ma, .. }, Finite { exp: eb, mant: mb, .. }) => {
                    let prod = ma * mb;
                    let lsb = (ea - ma.bits() as i64 + 1) as i128 + (eb - mb.bits() as i64 + 1) as i128;
                    let exp = lsb + prod.bits() as i128 - 1;
                    round_in_env(env, xor_neg, prod, exp, false)
                }
            }
        })
    }

    /// Correctly rounded division. `x/±0` is a soft failure: signed
    /// infinity (NaN with `invalid` for `0/0`), never an `Err`.
    pub fn div(&self, rhs: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
        with_active(env, |env| {
            use Repr::*;
            let xor_neg = self.is_sign_negative() != rhs.is_sign_negative();
            match (&self.repr, &rhs.repr) {
                (Nan, _) | (_, Nan) => {
                    env.raise_invalid();
                    BigFloat::nan()
                }
                (Inf { .. }, Inf { .. }) | (Zero { .. }, Zero { .. }) => {
                    env.raise_invalid();
                    BigFloat::nan()
                }
                (Inf { .. }, _) => BigFloat::infinity(xor_neg),
                (_, Inf { .. }) => BigFloat::zero(xor_neg),
                (Zero { .. }, _) => BigFloat::zero(xor_neg),
                (_, Zero { .. }) => BigFloat::infinity(xor_neg),
                (Finite { exp: ea, mant: ma, .. }, Finite { exp: eb, mant: mb, .. }) => {
                    div_finite(env, xor_neg, ma, *ea, mb, *eb)
                }
            }
        })
    }

    /// Fused multiply-add: `self*a + b` with a single final rounding.
    pub fn fma(&self, a: &BigFloat, b: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
        with_active(env, |env| {
            use Repr::*;
            if self.is_nan() || a.is_nan() || b.is_nan() {
                env.raise_invalid();
                return BigFloat::nan();
            }
            // Product specials first, then the addition specials.
            let prod_neg = self.is_sign_negative() != a.is_sign_negative();
            let prod_inf = self.is_infinite() || a.is_infinite();
            if prod_inf {
                if self.is_zero() || a.is_zero() {
                    env.raise_invalid();
                    return BigFloat::nan();
                }
                if b.is_infinite() && b.is_sign_negative() != prod_neg {
                    env.raise_invalid();
                    return BigFloat::nan();
                }
                return BigFloat::infinity(prod_neg);
            }
            if b.is_infinite() {
                return BigFloat::infinity(b.is_sign_negative());
            }
            if self.is_zero() || a.is_zero() {
                // Exact product is a signed zero; fall back to addition
                // semantics with it.
                return BigFloat::zero(prod_neg).add(b, Some(env));
            }
            let (mx, ex) = self.to_scaled().unwrap();
            let (ma, ea) = a.to_scaled().unwrap();
            let prod = (&mx * &ma, ex.checked_add(ea));
            let Some(pe) = prod.1 else {
                // Exponent sum outside i64: treat through the widened
                // rounding path directly.
                let p = &mx * &ma;
                let neg = p.is_negative();
                let mag = p.magnitude().clone();
                let exp = ex as i128 + ea as i128 + mag.bits() as i128 - 1;
                return round_in_env(env, neg, mag, exp, false).add(b, Some(env));
            };
            if b.is_zero() {
                let p = prod.0;
                if p.is_zero() {
                    return BigFloat::zero(prod_neg);
                }
                let neg = p.is_negative();
                let mag = p.magnitude().clone();
                let exp = pe as i128 + mag.bits() as i128 - 1;
                return round_in_env(env, neg, mag, exp, false);
            }
            let y = b.to_scaled().unwrap();
            add_exact((prod.0, pe), y, env)
        })
    }

    /// Re-round an already-finite value into an environment (used when an
    /// operand passes through an operation unchanged, e.g. `x + 0`).
    pub(crate) fn round_into(&self, env: &FloatEnv) -> BigFloat {
        match &self.repr {
            Repr::Finite { neg, exp, mant } => {
                round_in_env(env, *neg, mant.clone(), *exp as i128, false)
            }
            _ => self.clone(),
        }
    }
}

/// Exact addition of two nonzero scaled integers, rounded once.
///
/// When the operands' magnitudes are so far apart that the smaller cannot
/// touch the rounding grid, it collapses to a one-ulp nudge below the
/// guard position; the nudge lies strictly between the true sum's rounding
/// boundaries, so every mode rounds identically.
fn add_exact(x: (BigInt, i64), y: (BigInt, i64), env: &FloatEnv) -> BigFloat {
    let (mx, ex) = x;
    let (my, ey) = y;
    debug_assert!(!mx.is_zero() && !my.is_zero());

    let top_x = ex as i128 + mx.magnitude().bits() as i128 - 1;
    let top_y = ey as i128 + my.magnitude().bits() as i128 - 1;
    let (big, big_e, big_top, small, small_top) = if top_x >= top_y {
        (&mx, ex, top_x, &my, top_y)
    } else {
        (&my, ey, top_y, &mx, top_x)
    };

    let prec = env.prec() as i128;
    let gap = big_top - small_top;
    if gap > prec + big.magnitude().bits() as i128 + 4 {
        // Sticky shortcut: the small operand only nudges the tail.
        let bits = big.magnitude().bits() as i128;
        let g = 2.max(prec + 2 - bits) as u32;
        let s = (big << g) + small.signum();
        let neg = s.is_negative();
        let mag = s.magnitude().clone();
        let exp = big_e as i128 - g as i128 + mag.bits() as i128 - 1;
        return round_in_env(env, neg, mag, exp, false);
    }

    let e = ex.min(ey);
    let s = (mx << (ex - e) as u32) + (my << (ey - e) as u32);
    if s.is_zero() {
        return BigFloat::zero(env.mode() == RoundingMode::TowardNegative);
    }
    let neg = s.is_negative();
    let mag = s.magnitude().clone();
    let exp = e as i128 + mag.bits() as i128 - 1;
    round_in_env(env, neg, mag, exp, false)
}

/// Finite ÷ finite with a quotient carrying `prec + 2` bits and an exact
/// sticky remainder.
fn div_finite(
    env: &FloatEnv,
    neg: bool,
    ma: &BigUint,
    ea: i64,
    mb: &BigUint,
    eb: i64,
) -> BigFloat {
    let prec = env.prec() as i64;
    let need = prec + 2 + mb.bits() as i64 - ma.bits() as i64;
    let k = need.max(0) as u32;
    let n = ma << k;
    let (q, r) = num_integer::Integer::div_rem(&n, mb);
    let sticky = !r.is_zero();
    let lsb_a = ea as i128 - ma.bits() as i128 + 1;
    let lsb_b = eb as i128 - mb.bits() as i128 + 1;
    let exp = lsb_a - k as i128 - lsb_b + q.bits() as i128 - 1;
    round_in_env(env, neg, q, exp, sticky)
}

impl PartialEq for BigFloat {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for BigFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl From<i64> for BigFloat {
    fn from(v: i64) -> BigFloat {
        BigFloat::from_bigint(&BigInt::from(v))
    }
}

impl From<u64> for BigFloat {
    fn from(v: u64) -> BigFloat {
        BigFloat::from_bigint(&BigInt::from(v))
    }
}

impl From<i32> for BigFloat {
    fn from(v: i32) -> BigFloat {
        BigFloat::from(v as i64)
    }
}

impl From<f64> for BigFloat {
    fn from(v: f64) -> BigFloat {
        BigFloat::from_f64(v)
    }
}

impl BigFloat {
    /// Lossy conversion to `f64` (nearest-even), mainly for diagnostics.
    pub fn to_f64(&self) -> f64 {
        match &self.repr {
            Repr::Nan => f64::NAN,
            Repr::Inf { neg } => {
                if *neg {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                }
            }
            Repr::Zero { neg } => {
                if *neg {
                    -0.0
                } else {
                    0.0
                }
            }
            Repr::Finite { neg, exp, mant } => {
                // Round to 53 bits, then scale. Exponents beyond f64's
                // range collapse to 0/inf through powi.
                let bits = mant.bits();
                let top = if bits > 64 {
                    (mant >> (bits - 64)).to_u64().unwrap_or(0)
                } else {
                    mant.to_u64().unwrap_or(0) << (64 - bits)
                };
                let m = top as f64 / 2f64.powi(63); // in [1, 2)
                let v = if *exp >= -1022 && *exp <= 1023 {
                    m * 2f64.powi(*exp as i32)
                } else if *exp < -1022 {
                    0.0
                } else {
                    f64::INFINITY
                };
                if *neg {
                    -v
                } else {
                    v
                }
            }
        }
    }
}
