//! Mixed-kind numeric values and exact cross-kind comparison.
//!
//! A [`Value`] holds any of the five numeric kinds side by side. The
//! comparison never rounds one kind into another: every finite operand
//! reduces to an exact scaled integer, either `m × 2^e` (machine
//! integers, doubles, big integers, binary floats) or `c × 10^(−s)`
//! (decimals), and mixed-base pairs are settled by exact cross
//! multiplication. NaN of any kind compares as unordered and the two
//! signed zeros are equal.

use std::cmp::Ordering;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Pow, Signed, Zero};

use crate::decimal::BigDecimal;
use crate::float::BigFloat;

/// A number of any of the supported kinds.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Double(f64),
    BigInt(BigInt),
    BigFloat(BigFloat),
    BigDecimal(BigDecimal),
}

/// Exact finite form: sign lives in the integer part.
enum Exact {
    Nan,
    Inf(bool),
    /// `m × 2^e`.
    Dyadic(BigInt, i64),
    /// `c × 10^(−s)`.
    Decimal(BigInt, i64),
}

fn classify(v: &Value) -> Exact {
    match v {
        Value::Int(i) => Exact::Dyadic(BigInt::from(*i), 0),
        Value::Double(x) => {
            if x.is_nan() {
                Exact::Nan
            } else if x.is_infinite() {
                Exact::Inf(*x < 0.0)
            } else {
                let (m, e) = BigFloat::from_f64(*x).to_scaled().expect("finite");
                Exact::Dyadic(m, e)
            }
        }
        Value::BigInt(n) => Exact::Dyadic(n.clone(), 0),
        Value::BigFloat(x) => {
            if x.is_nan() {
                Exact::Nan
            } else if x.is_infinite() {
                Exact::Inf(x.is_sign_negative())
            } else {
                let (m, e) = x.to_scaled().expect("finite");
                Exact::Dyadic(m, e)
            }
        }
        Value::BigDecimal(x) => {
            if x.is_nan() {
                Exact::Nan
            } else if !x.is_finite() {
                Exact::Inf(x.is_sign_negative())
            } else {
                let (c, s) = x.to_scaled().expect("finite");
                Exact::Decimal(c, s)
            }
        }
    }
}

fn cmp_dyadic(ma: &BigInt, ea: i64, mb: &BigInt, eb: i64) -> Ordering {
    let sign = ma.signum().cmp(&mb.signum());
    if sign != Ordering::Equal || ma.is_zero() {
        return sign;
    }
    let e = ea.min(eb);
    let a = ma << (ea - e) as u64;
    let b = mb << (eb - e) as u64;
    a.cmp(&b)
}

fn cmp_decimal(ca: &BigInt, sa: i64, cb: &BigInt, sb: i64) -> Ordering {
    let sign = ca.signum().cmp(&cb.signum());
    if sign != Ordering::Equal || ca.is_zero() {
        return sign;
    }
    let s = sa.max(sb);
    let ten = BigUint::from(10u32);
    let a = ca * BigInt::from(Pow::pow(&ten, (s - sa) as u64));
    let b = cb * BigInt::from(Pow::pow(&ten, (s - sb) as u64));
    a.cmp(&b)
}

/// Compare `m × 2^e` against `c × 10^(−s)` exactly.
///
/// Equality is settled first through the 2- and 5-adic valuations, then
/// the power of ten is bracketed by a truncated binary powering so the
/// ordering never materializes a shift wider than the operands. Scales
/// and exponents near saturation (around ±2^62) stay cheap that way.
fn cmp_mixed(m: &BigInt, e: i64, c: &BigInt, s: i64) -> Ordering {
    let sign = m.signum().cmp(&c.signum());
    if sign != Ordering::Equal || m.is_zero() {
        return sign;
    }
    let neg = m.is_negative();
    // Fold trailing zeros of the dyadic mantissa into the exponent.
    let tz = m.magnitude().trailing_zeros().unwrap_or(0);
    let mm = m.magnitude() >> tz;
    let e = e as i128 + tz as i128;
    let mag = if mixed_eq(&mm, e, c.magnitude(), s) {
        Ordering::Equal
    } else {
        cmp_mixed_mag(&mm, e, c.magnitude(), s)
    };
    if neg {
        mag.reverse()
    } else {
        mag
    }
}

/// Does `m × 2^e` (with `m` odd) equal `c × 10^(−s)`?
///
/// Equal iff `m · 2^(e+s) · 5^s == c`, so the 2-adic valuation of `c`
/// must be exactly `e + s` and the odd parts must match across a power
/// of five. Bit-length guards keep the `5^|s|` blowup bounded by the
/// operands themselves.
fn mixed_eq(m: &BigUint, e: i128, c: &BigUint, s: i64) -> bool {
    let v2 = c.trailing_zeros().unwrap_or(0);
    if e + s as i128 != v2 as i128 {
        return false;
    }
    let c2 = c >> v2;
    let five = BigUint::from(5u32);
    if s >= 0 {
        // bits(m · 5^s) > 2s, so a shorter c2 cannot match.
        if s > 0 && c2.bits() as u128 <= 2 * s as u128 {
            return false;
        }
        m * Pow::pow(&five, s as u64) == c2
    } else {
        let k = s.unsigned_abs();
        if m.bits() as u128 <= 2 * k as u128 {
            return false;
        }
        c2 * Pow::pow(&five, k) == *m
    }
}

/// Strict ordering of `m × 2^e` against `c × 10^(−s)`, magnitudes only;
/// the two sides are known unequal.
fn cmp_mixed_mag(m: &BigUint, e: i128, c: &BigUint, s: i64) -> Ordering {
    if s == 0 {
        return cmp_shifted(m, e, c);
    }
    // Bracket 10^|s| in [pw, hi] × 2^pe and widen the working precision
    // until the interval lands strictly on one side. The truncation
    // error compounds once per unit of the exponent, so the bracket
    // width scales with bits(|s|).
    let sb = 64 - s.unsigned_abs().leading_zeros() as u64;
    let mut p = 128u64;
    loop {
        let (pw, pe) = pow10_floor(s.unsigned_abs(), p);
        let hi = &pw + ((&pw >> (p - 3 - sb)) + 1u32);
        let decided = if s > 0 {
            // m·2^e·10^s against c.
            if cmp_shifted(&(m * &pw), e + pe, c) != Ordering::Less {
                Some(Ordering::Greater)
            } else if cmp_shifted(&(m * &hi), e + pe, c) != Ordering::Greater {
                Some(Ordering::Less)
            } else {
                None
            }
        } else {
            // m·2^e against c·10^|s|.
            if cmp_shifted(m, e - pe, &(c * &pw)) != Ordering::Greater {
                Some(Ordering::Less)
            } else if cmp_shifted(m, e - pe, &(c * &hi)) != Ordering::Less {
                Some(Ordering::Greater)
            } else {
                None
            }
        };
        if let Some(r) = decided {
            return r;
        }
        p *= 2;
    }
}

/// Compare `v × 2^k` against `w` for nonzero `v`, `w`. The leading-bit
/// positions decide almost always; when they tie the residual shift is
/// at most the width of an operand.
fn cmp_shifted(v: &BigUint, k: i128, w: &BigUint) -> Ordering {
    let lv = v.bits() as i128 - 1 + k;
    let lw = w.bits() as i128 - 1;
    match lv.cmp(&lw) {
        Ordering::Equal => {
            if k >= 0 {
                (v << k as u64).cmp(w)
            } else {
                v.cmp(&(w << (-k) as u64))
            }
        }
        other => other,
    }
}

/// `10^s` truncated to about `p` bits: returns `(pw, pe)` with
/// `pw × 2^pe <= 10^s < pw × 2^pe × (1 + s × 2^(2−p))`. Binary powering
/// with downward truncation after every step keeps the error one-sided.
fn pow10_floor(mut s: u64, p: u64) -> (BigUint, i128) {
    let mut acc = BigUint::one();
    let mut ae: i128 = 0;
    let mut base = BigUint::from(10u32);
    let mut be: i128 = 0;
    loop {
        if s & 1 == 1 {
            acc *= &base;
            ae += be;
            let drop = acc.bits().saturating_sub(p);
            if drop > 0 {
                acc >>= drop;
                ae += drop as i128;
            }
        }
        s >>= 1;
        if s == 0 {
            break;
        }
        base = &base * &base;
        be *= 2;
        let drop = base.bits().saturating_sub(p);
        if drop > 0 {
            base >>= drop;
            be += drop as i128;
        }
    }
    (acc, ae)
}

impl Value {
    /// Exact numeric comparison across kinds; `None` when either side
    /// is NaN.
    pub fn compare(&self, rhs: &Value) -> Option<Ordering> {
        use Exact::*;
        let a = classify(self);
        let b = classify(rhs);
        Some(match (&a, &b) {
            (Nan, _) | (_, Nan) => return None,
            (Inf(na), Inf(nb)) => nb.cmp(na),
            (Inf(neg), _) => {
                if *neg {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (_, Inf(neg)) => {
                if *neg {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Dyadic(ma, ea), Dyadic(mb, eb)) => cmp_dyadic(ma, *ea, mb, *eb),
            (Decimal(ca, sa), Decimal(cb, sb)) => cmp_decimal(ca, *sa, cb, *sb),
            (Dyadic(m, e), Decimal(c, s)) => cmp_mixed(m, *e, c, *s),
            (Decimal(c, s), Dyadic(m, e)) => cmp_mixed(m, *e, c, *s).reverse(),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        self.compare(other)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Value {
        Value::BigInt(v)
    }
}

impl From<BigFloat> for Value {
    fn from(v: BigFloat) -> Value {
        Value::BigFloat(v)
    }
}

impl From<BigDecimal> for Value {
    fn from(v: BigDecimal) -> Value {
        Value::BigDecimal(v)
    }
}
