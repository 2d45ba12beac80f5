//! Arbitrary-precision decimal arithmetic: [`BigDecimal`] and
//! [`DecimalContext`].
//!
//! A finite value is `±coeff × 10^(−scale)` with the scale significant:
//! `10.050` keeps its trailing zero (coefficient 10050, scale 3) and is
//! distinct as a datum from `10.05`, though equal in value. Unlike the
//! binary type there is no ambient state and no status flags: `add`,
//! `sub` and `mul` are always exact, and the fallible operations either
//! succeed exactly, round under an explicit [`DecimalContext`], or fail
//! hard with an [`Error`].
//!
//! The context carries a rounding mode (named by its decimal alias) and
//! exactly one digit limit, either significant digits or fraction
//! digits. Division and square root compute the one correctly rounded
//! result at the limit; everything else rounds its exact result.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};

use crate::env::RoundingMode;
use crate::error::Error;

// ---------------------------------------------------------------------------
// Context

/// Digit budget of a [`DecimalContext`]: exactly one of the two kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitLimit {
    /// Total significant digits, at least 1.
    SignificantDigits(u64),
    /// Digits after the decimal point; 0 rounds to an integer.
    FractionDigits(u64),
}

/// Rounding mode plus digit limit for the fallible decimal operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalContext {
    mode: RoundingMode,
    limit: DigitLimit,
}

impl DecimalContext {
    pub fn new(mode: RoundingMode, limit: DigitLimit) -> Result<DecimalContext, Error> {
        if let DigitLimit::SignificantDigits(0) = limit {
            return Err(Error::InvalidConfiguration(
                "maximumSignificantDigits must be at least 1",
            ));
        }
        Ok(DecimalContext { mode, limit })
    }

    /// Build from an option-bag shape: a decimal mode alias and exactly
    /// one of the two digit maxima.
    pub fn from_parts(
        mode_alias: &str,
        max_significant: Option<u64>,
        max_fraction: Option<u64>,
    ) -> Result<DecimalContext, Error> {
        let mode = RoundingMode::from_alias(mode_alias)
            .ok_or(Error::InvalidConfiguration("unknown rounding mode"))?;
        let limit = match (max_significant, max_fraction) {
            (Some(n), None) => DigitLimit::SignificantDigits(n),
            (None, Some(n)) => DigitLimit::FractionDigits(n),
            _ => {
                return Err(Error::InvalidConfiguration(
                    "exactly one digit limit must be given",
                ))
            }
        };
        DecimalContext::new(mode, limit)
    }

    pub fn mode(&self) -> RoundingMode {
        self.mode
    }

    pub fn limit(&self) -> DigitLimit {
        self.limit
    }
}

// ---------------------------------------------------------------------------
// Representation

#[derive(Debug, Clone)]
enum Repr {
    Finite { neg: bool, coeff: BigUint, scale: i64 },
    Inf { neg: bool },
    Nan,
}

/// An arbitrary-precision decimal number.
#[derive(Debug, Clone)]
pub struct BigDecimal {
    repr: Repr,
}

fn ten_pow(n: u64) -> BigUint {
    Pow::pow(&BigUint::from(10u32), n)
}

/// Number of decimal digits of `n` (1 for zero).
fn dec_digits(n: &BigUint) -> u64 {
    if n.is_zero() {
        return 1;
    }
    n.to_str_radix(10).len() as u64
}

impl BigDecimal {
    fn finite(neg: bool, coeff: BigUint, scale: i64) -> BigDecimal {
        BigDecimal {
            repr: Repr::Finite { neg, coeff, scale },
        }
    }

    pub fn zero() -> BigDecimal {
        BigDecimal::finite(false, BigUint::zero(), 0)
    }

    pub fn infinity(negative: bool) -> BigDecimal {
        BigDecimal {
            repr: Repr::Inf { neg: negative },
        }
    }

    pub fn nan() -> BigDecimal {
        BigDecimal { repr: Repr::Nan }
    }

    /// Exact value from coefficient and scale: `±coeff × 10^(−scale)`.
    pub fn from_parts(negative: bool, coeff: BigUint, scale: i64) -> BigDecimal {
        BigDecimal::finite(negative, coeff, scale)
    }

    pub fn from_bigint(n: &BigInt) -> BigDecimal {
        BigDecimal::finite(n.is_negative(), n.magnitude().clone(), 0)
    }

    /// Exact conversion of a finite double via its shortest decimal
    /// representation, so `0.1` becomes one tenth rather than its
    /// binary expansion.
    pub fn try_from_f64(x: f64) -> Result<BigDecimal, Error> {
        if !x.is_finite() {
            return Err(Error::InvalidOperation("cannot convert non-finite to decimal"));
        }
        format!("{}", x).parse()
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.repr, Repr::Nan)
    }

    pub fn is_finite(&self) -> bool {
        matches!(self.repr, Repr::Finite { .. })
    }

    pub fn is_zero(&self) -> bool {
        matches!(&self.repr, Repr::Finite { coeff, .. } if coeff.is_zero())
    }

    pub fn is_sign_negative(&self) -> bool {
        match &self.repr {
            Repr::Finite { neg, .. } | Repr::Inf { neg } => *neg,
            Repr::Nan => false,
        }
    }

    /// True when the mathematical value is an integer.
    pub fn is_integer(&self) -> bool {
        match &self.repr {
            Repr::Finite { coeff, scale, .. } => {
                *scale <= 0 || coeff.is_zero() || (coeff % ten_pow(*scale as u64)).is_zero()
            }
            _ => false,
        }
    }

    fn parts(&self) -> Option<(bool, &BigUint, i64)> {
        match &self.repr {
            Repr::Finite { neg, coeff, scale } => Some((*neg, coeff, *scale)),
            _ => None,
        }
    }

    /// Signed coefficient and scale, for exact cross-type arithmetic.
    pub(crate) fn to_scaled(&self) -> Option<(BigInt, i64)> {
        let (neg, coeff, scale) = self.parts()?;
        let mut v = BigInt::from(coeff.clone());
        if neg {
            v = -v;
        }
        Some((v, scale))
    }

    /// Numeric comparison; `None` when either side is NaN. Scales do not
    /// participate: `10.050` equals `10.05`.
    pub fn compare(&self, rhs: &BigDecimal) -> Option<Ordering> {
        use Repr::*;
        match (&self.repr, &rhs.repr) {
            (Nan, _) | (_, Nan) => None,
            (Inf { neg: a }, Inf { neg: b }) => Some(b.cmp(a)),
            (Inf { neg }, Finite { .. }) => {
                Some(if *neg { Ordering::Less } else { Ordering::Greater })
            }
            (Finite { .. }, Inf { neg }) => {
                Some(if *neg { Ordering::Greater } else { Ordering::Less })
            }
            (Finite { .. }, Finite { .. }) => {
                let (va, sa) = self.to_scaled().expect("finite");
                let (vb, sb) = rhs.to_scaled().expect("finite");
                let s = sa.max(sb);
                let va = va * BigInt::from(ten_pow((s - sa) as u64));
                let vb = vb * BigInt::from(ten_pow((s - sb) as u64));
                Some(va.cmp(&vb))
            }
        }
    }

    pub fn abs(&self) -> BigDecimal {
        match &self.repr {
            Repr::Finite { coeff, scale, .. } => BigDecimal::finite(false, coeff.clone(), *scale),
            Repr::Inf { .. } => BigDecimal::infinity(false),
            Repr::Nan => BigDecimal::nan(),
        }
    }
}

impl PartialEq for BigDecimal {
    fn eq(&self, other: &BigDecimal) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for BigDecimal {
    fn partial_cmp(&self, other: &BigDecimal) -> Option<Ordering> {
        self.compare(other)
    }
}

impl From<i64> for BigDecimal {
    fn from(v: i64) -> BigDecimal {
        BigDecimal::finite(v < 0, BigUint::from(v.unsigned_abs()), 0)
    }
}

impl From<u64> for BigDecimal {
    fn from(v: u64) -> BigDecimal {
        BigDecimal::finite(false, BigUint::from(v), 0)
    }
}

// ---------------------------------------------------------------------------
// Rounding

/// Drop `drop` trailing digits of `q`, rounding per `mode`. `sticky`
/// reports a nonzero discarded tail strictly below the dropped digits
/// (it can only promote an apparent tie).
fn round_digits(neg: bool, q: &BigUint, drop: u64, sticky: bool, mode: RoundingMode) -> BigUint {
    if drop == 0 {
        debug_assert!(!sticky);
        return q.clone();
    }
    let den = ten_pow(drop);
    let (mut out, rem) = q.div_rem(&den);
    if !rem.is_zero() || sticky {
        let mut half = (&rem << 1u8).cmp(&den);
        if half == Ordering::Equal && sticky {
            half = Ordering::Greater;
        }
        if mode == RoundingMode::ToOdd {
            out |= BigUint::one();
        } else if mode.round_away(neg, out.is_odd(), half) {
            out += 1u8;
        }
    }
    out
}

/// Round an exact `±coeff × 10^(−scale)` to the context's limit.
fn round_exact(ctx: &DecimalContext, neg: bool, coeff: BigUint, scale: i64) -> BigDecimal {
    match ctx.limit {
        DigitLimit::FractionDigits(n) => {
            let target = n as i64;
            let drop = scale - target;
            let coeff = if drop <= 0 {
                coeff * ten_pow((-drop) as u64)
            } else {
                round_digits(neg, &coeff, drop as u64, false, ctx.mode)
            };
            BigDecimal::finite(neg, coeff, target)
        }
        DigitLimit::SignificantDigits(n) => {
            let dc = dec_digits(&coeff);
            if coeff.is_zero() || dc <= n {
                return BigDecimal::finite(neg, coeff, scale);
            }
            let drop = dc - n;
            let mut out = round_digits(neg, &coeff, drop, false, ctx.mode);
            let mut scale = scale - drop as i64;
            if dec_digits(&out) > n {
                // All-nines carry: exactly one extra zero to shed.
                out /= 10u32;
                scale -= 1;
            }
            BigDecimal::finite(neg, out, scale)
        }
    }
}

// ---------------------------------------------------------------------------
// Exact arithmetic

fn add_signed(a: &BigDecimal, b: &BigDecimal, negate_b: bool) -> BigDecimal {
    use Repr::*;
    match (&a.repr, &b.repr) {
        (Nan, _) | (_, Nan) => BigDecimal::nan(),
        (Inf { neg: na }, Inf { neg: nb }) => {
            let nb = *nb != negate_b;
            if *na == nb {
                BigDecimal::infinity(*na)
            } else {
                BigDecimal::nan()
            }
        }
        (Inf { neg }, Finite { .. }) => BigDecimal::infinity(*neg),
        (Finite { .. }, Inf { neg }) => BigDecimal::infinity(*neg != negate_b),
        (Finite { .. }, Finite { .. }) => {
            let (va, sa) = a.to_scaled().expect("finite");
            let (mut vb, sb) = b.to_scaled().expect("finite");
            if negate_b {
                vb = -vb;
            }
            let s = sa.max(sb);
            let va = va * BigInt::from(ten_pow((s - sa) as u64));
            let vb = vb * BigInt::from(ten_pow((s - sb) as u64));
            let sum = va + vb;
            BigDecimal::finite(sum.is_negative(), sum.magnitude().clone(), s)
        }
    }
}

fn mul_exact(a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
    use Repr::*;
    match (&a.repr, &b.repr) {
        (Nan, _) | (_, Nan) => BigDecimal::nan(),
        (Inf { .. }, Finite { coeff, .. }) | (Finite { coeff, .. }, Inf { .. })
            if coeff.is_zero() =>
        {
            BigDecimal::nan()
        }
        _ => {
            let neg = a.is_sign_negative() != b.is_sign_negative();
            match (a.parts(), b.parts()) {
                (Some((_, ca, sa)), Some((_, cb, sb))) => {
                    BigDecimal::finite(neg, ca * cb, sa + sb)
                }
                _ => BigDecimal::infinity(neg),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fallible operations

/// Exact division without a context: succeeds only when the quotient
/// terminates in decimal, i.e. the reduced denominator is `2^i·5^j`.
fn div_exact(neg: bool, ca: &BigUint, sa: i64, cb: &BigUint, sb: i64) -> Result<BigDecimal, Error> {
    let g = ca.gcd(cb);
    let num = ca / &g;
    let mut den = cb / &g;
    let mut twos = 0u64;
    while den.is_even() {
        den >>= 1u8;
        twos += 1;
    }
    let mut fives = 0u64;
    let five = BigUint::from(5u32);
    while (&den % &five).is_zero() {
        den /= &five;
        fives += 1;
    }
    if !den.is_one() {
        return Err(Error::InexactResult);
    }
    // num / (2^i·5^j) = num·2^(k−i)·5^(k−j) / 10^k with k = max(i, j).
    let k = twos.max(fives);
    let coeff = num * Pow::pow(&BigUint::from(2u32), k - twos) * Pow::pow(&five, k - fives);
    Ok(BigDecimal::finite(neg, coeff, sa - sb + k as i64))
}

/// One correctly rounded division at the context's digit limit.
fn div_rounded(
    ctx: &DecimalContext,
    neg: bool,
    ca: &BigUint,
    sa: i64,
    cb: &BigUint,
    sb: i64,
) -> BigDecimal {
    // Quotient scaled to the target: round(|a|·10^t / |b|) at scale t.
    let quotient_at = |t: i64| -> BigUint {
        let mut num = ca.clone();
        let mut den = cb.clone();
        let shift = t + sb - sa;
        if shift >= 0 {
            num *= ten_pow(shift as u64);
        } else {
            den *= ten_pow((-shift) as u64);
        }
        let (mut q, rem) = num.div_rem(&den);
        if !rem.is_zero() {
            let half = (&rem << 1u8).cmp(&den);
            if ctx.mode == RoundingMode::ToOdd {
                q |= BigUint::one();
            } else if ctx.mode.round_away(neg, q.is_odd(), half) {
                q += 1u8;
            }
        }
        q
    };
    match ctx.limit {
        DigitLimit::FractionDigits(n) => BigDecimal::finite(neg, quotient_at(n as i64), n as i64),
        DigitLimit::SignificantDigits(n) => {
            // Decimal exponent e of the quotient: 10^e <= |a/b| < 10^(e+1).
            let e0 = dec_digits(ca) as i64 - dec_digits(cb) as i64 + (sb - sa);
            // |a/b| is in [10^(e0−1), 10^(e0+1)); one comparison settles it.
            let e = if cmp_scaled(ca, sa, cb, sb, e0) == Ordering::Less {
                e0 - 1
            } else {
                e0
            };
            let t = n as i64 - 1 - e;
            let mut q = quotient_at(t);
            let mut scale = t;
            if dec_digits(&q) > n {
                q /= 10u32; // carry to 10^n is exact
                scale -= 1;
            }
            BigDecimal::finite(neg, q, scale)
        }
    }
}

/// Compare `ca·10^(−sa)` against `cb·10^(−sb)·10^e`.
fn cmp_scaled(ca: &BigUint, sa: i64, cb: &BigUint, sb: i64, e: i64) -> Ordering {
    let mut a = ca.clone();
    let mut b = cb.clone();
    let shift = e + sa - sb;
    if shift >= 0 {
        b *= ten_pow(shift as u64);
    } else {
        a *= ten_pow((-shift) as u64);
    }
    a.cmp(&b)
}

/// Truncating remainder, exact; sign of the dividend.
fn rem_exact(a: &BigDecimal, b: &BigDecimal) -> Result<BigDecimal, Error> {
    if a.is_nan() || b.is_nan() || !a.is_finite() {
        return Ok(BigDecimal::nan());
    }
    if b.is_zero() {
        return Err(Error::DivisionByZero);
    }
    if !b.is_finite() {
        return Ok(a.clone());
    }
    let (va, sa) = a.to_scaled().expect("finite");
    let (vb, sb) = b.to_scaled().expect("finite");
    let s = sa.max(sb);
    let va = va * BigInt::from(ten_pow((s - sa) as u64));
    let vb = vb * BigInt::from(ten_pow((s - sb) as u64));
    let r = va % vb;
    Ok(BigDecimal::finite(
        r.is_negative() || (r.is_zero() && a.is_sign_negative()),
        r.magnitude().clone(),
        s,
    ))
}

// ---------------------------------------------------------------------------
// Public one-shot operations (the `BigDecimal.*` statics)

/// Exact sum, optionally rounded by a context.
pub fn add(a: &BigDecimal, b: &BigDecimal, ctx: Option<&DecimalContext>) -> BigDecimal {
    finish(add_signed(a, b, false), ctx)
}

/// Exact difference, optionally rounded by a context.
pub fn sub(a: &BigDecimal, b: &BigDecimal, ctx: Option<&DecimalContext>) -> BigDecimal {
    finish(add_signed(a, b, true), ctx)
}

/// Exact product, optionally rounded by a context.
pub fn mul(a: &BigDecimal, b: &BigDecimal, ctx: Option<&DecimalContext>) -> BigDecimal {
    finish(mul_exact(a, b), ctx)
}

fn finish(v: BigDecimal, ctx: Option<&DecimalContext>) -> BigDecimal {
    if let Some(ctx) = ctx {
        if let Some((neg, coeff, scale)) = v.parts() {
            return round_exact(ctx, neg, coeff.clone(), scale);
        }
    }
    v
}

/// Division: exact (terminating) without a context, correctly rounded
/// with one. Zero divisor is always a hard error.
pub fn div(
    a: &BigDecimal,
    b: &BigDecimal,
    ctx: Option<&DecimalContext>,
) -> Result<BigDecimal, Error> {
    if a.is_nan() || b.is_nan() {
        return Ok(BigDecimal::nan());
    }
    if b.is_zero() {
        return Err(Error::DivisionByZero);
    }
    let neg = a.is_sign_negative() != b.is_sign_negative();
    match (a.parts(), b.parts()) {
        (None, None) => Ok(BigDecimal::nan()),
        (None, Some(_)) => Ok(BigDecimal::infinity(neg)),
        (Some(_), None) => Ok(BigDecimal::finite(neg, BigUint::zero(), 0)),
        (Some((_, ca, sa)), Some((_, cb, sb))) => {
            if ca.is_zero() {
                return Ok(BigDecimal::finite(neg, BigUint::zero(), (sa - sb).max(0)));
            }
            match ctx {
                None => div_exact(neg, ca, sa, cb, sb),
                Some(ctx) => Ok(div_rounded(ctx, neg, ca, sa, cb, sb)),
            }
        }
    }
}

/// Truncating remainder, optionally rounded by a context.
pub fn rem(
    a: &BigDecimal,
    b: &BigDecimal,
    ctx: Option<&DecimalContext>,
) -> Result<BigDecimal, Error> {
    Ok(finish(rem_exact(a, b)?, ctx))
}

/// Square root: hard error on negatives; exact squares only without a
/// context, correctly rounded with one.
pub fn sqrt(x: &BigDecimal, ctx: Option<&DecimalContext>) -> Result<BigDecimal, Error> {
    if x.is_nan() {
        return Ok(BigDecimal::nan());
    }
    if x.is_sign_negative() && !x.is_zero() {
        return Err(Error::InvalidOperation("square root of a negative number"));
    }
    let (_, coeff, scale) = match x.parts() {
        None => return Ok(BigDecimal::infinity(false)),
        Some(p) => p,
    };
    if coeff.is_zero() {
        return Ok(BigDecimal::finite(false, BigUint::zero(), scale.div_euclid(2)));
    }
    match ctx {
        None => {
            // Exact iff coeff·10^pad is a perfect square at even scale.
            let (c, s) = if scale.rem_euclid(2) == 1 {
                (coeff * 10u32, scale + 1)
            } else {
                (coeff.clone(), scale)
            };
            let r = num_integer::Roots::sqrt(&c);
            if &r * &r != c {
                return Err(Error::InexactResult);
            }
            Ok(BigDecimal::finite(false, r, s / 2))
        }
        Some(ctx) => {
            // Target scale t, then one guard digit: the floor root of
            // coeff·10^(2(t+1)−scale) carries the true root's digits
            // t+1 places up, and its exactness is the sticky.
            let t = match ctx.limit {
                DigitLimit::FractionDigits(n) => n as i64,
                DigitLimit::SignificantDigits(n) => {
                    let ex = dec_digits(coeff) as i64 - 1 - scale;
                    let e = ex.div_euclid(2);
                    n as i64 - 1 - e
                }
            };
            let g = 2 * (t + 1) - scale;
            // g < 0 only for scales far above the target; shed whole
            // hundreds exactly into the guard position first.
            let (c, extra) = if g >= 0 {
                (coeff * ten_pow(g as u64), 0u64)
            } else {
                let up = Integer::div_ceil(&-g, &2) as u64;
                (coeff * ten_pow((g + 2 * up as i64) as u64), up)
            };
            let root = num_integer::Roots::sqrt(&c);
            let sticky = &root * &root != c;
            let mut q = round_digits(false, &root, 1 + extra, sticky, ctx.mode);
            let mut scale_out = t;
            if let DigitLimit::SignificantDigits(n) = ctx.limit {
                if dec_digits(&q) > n {
                    q /= 10u32;
                    scale_out -= 1;
                }
            }
            Ok(BigDecimal::finite(false, q, scale_out))
        }
    }
}

/// `x^y` for integer `y >= 0`, exactly; a context rounds the exact
/// power. Everything else is a hard error.
pub fn pow(
    x: &BigDecimal,
    y: &BigDecimal,
    ctx: Option<&DecimalContext>,
) -> Result<BigDecimal, Error> {
    if !y.is_integer() || y.is_sign_negative() && !y.is_zero() {
        return Err(Error::InvalidExponent);
    }
    let (_, cy, sy) = y.parts().ok_or(Error::InvalidExponent)?;
    let yi = if sy > 0 {
        cy / ten_pow(sy as u64)
    } else {
        cy * ten_pow((-sy) as u64)
    };
    let yi = yi
        .to_u32()
        .ok_or(Error::InvalidOperation("exponent too large"))?;
    if x.is_nan() {
        return Ok(BigDecimal::nan());
    }
    let (neg, cx, sx) = match x.parts() {
        None => {
            return Ok(if yi == 0 {
                BigDecimal::from(1i64)
            } else {
                BigDecimal::infinity(x.is_sign_negative() && yi % 2 == 1)
            })
        }
        Some(p) => p,
    };
    let out_neg = neg && yi % 2 == 1;
    let scale = sx
        .checked_mul(yi as i64)
        .ok_or(Error::InvalidOperation("exponent too large"))?;
    Ok(finish(BigDecimal::finite(out_neg, Pow::pow(cx, yi), scale), ctx))
}

/// Round to the context's digit limit.
pub fn round(x: &BigDecimal, ctx: &DecimalContext) -> BigDecimal {
    finish(x.clone(), Some(ctx))
}

impl Neg for &BigDecimal {
    type Output = BigDecimal;
    fn neg(self) -> BigDecimal {
        match &self.repr {
            Repr::Finite { neg, coeff, scale } => BigDecimal::finite(!neg, coeff.clone(), *scale),
            Repr::Inf { neg } => BigDecimal::infinity(!neg),
            Repr::Nan => BigDecimal::nan(),
        }
    }
}

impl Add for &BigDecimal {
    type Output = BigDecimal;
    fn add(self, rhs: &BigDecimal) -> BigDecimal {
        add_signed(self, rhs, false)
    }
}

impl Sub for &BigDecimal {
    type Output = BigDecimal;
    fn sub(self, rhs: &BigDecimal) -> BigDecimal {
        add_signed(self, rhs, true)
    }
}

impl Mul for &BigDecimal {
    type Output = BigDecimal;
    fn mul(self, rhs: &BigDecimal) -> BigDecimal {
        mul_exact(self, rhs)
    }
}

// ---------------------------------------------------------------------------
// Text

impl FromStr for BigDecimal {
    type Err = Error;

    /// Exact decimal literal: optional sign, digits with an optional
    /// point, optional `e`/`E` power-of-ten exponent. No rounding.
    fn from_str(s: &str) -> Result<BigDecimal, Error> {
        let bad = || Error::MalformedLiteral(s.to_string());
        let mut t = s.trim();
        let neg = match t.as_bytes().first() {
            Some(b'-') => {
                t = &t[1..];
                true
            }
            Some(b'+') => {
                t = &t[1..];
                false
            }
            _ => false,
        };
        if t.eq_ignore_ascii_case("inf") || t.eq_ignore_ascii_case("infinity") {
            return Ok(BigDecimal::infinity(neg));
        }
        if t.eq_ignore_ascii_case("nan") {
            return Ok(BigDecimal::nan());
        }
        let mut coeff = BigUint::zero();
        let mut ndigits = 0u64;
        let mut scale: i64 = 0;
        let mut seen_point = false;
        let mut chars = t.char_indices().peekable();
        while let Some(&(_, c)) = chars.peek() {
            match c {
                '.' if !seen_point => {
                    seen_point = true;
                    chars.next();
                }
                '0'..='9' => {
                    coeff = coeff * 10u32 + (c as u32 - '0' as u32);
                    ndigits += 1;
                    if seen_point {
                        scale += 1;
                    }
                    chars.next();
                }
                _ => break,
            }
        }
        if ndigits == 0 {
            return Err(bad());
        }
        if let Some(&(_, c)) = chars.peek() {
            if c != 'e' && c != 'E' {
                return Err(bad());
            }
            chars.next();
            let mut exp_neg = false;
            match chars.peek() {
                Some(&(_, '-')) => {
                    exp_neg = true;
                    chars.next();
                }
                Some(&(_, '+')) => {
                    chars.next();
                }
                _ => {}
            }
            let mut exp: i64 = 0;
            let mut any = false;
            for (_, c) in chars {
                let d = c.to_digit(10).ok_or_else(bad)?;
                any = true;
                exp = exp
                    .checked_mul(10)
                    .and_then(|e| e.checked_add(d as i64))
                    .ok_or_else(bad)?;
            }
            if !any {
                return Err(bad());
            }
            scale = if exp_neg { scale + exp } else { scale - exp };
        }
        Ok(BigDecimal::finite(neg, coeff, scale))
    }
}

impl fmt::Display for BigDecimal {
    /// Exact positional notation; the scale is rendered faithfully, so
    /// trailing zeros survive.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Nan => f.write_str("NaN"),
            Repr::Inf { neg } => {
                write!(f, "{}Infinity", if *neg { "-" } else { "" })
            }
            Repr::Finite { neg, coeff, scale } => {
                let sign = if *neg && !coeff.is_zero() { "-" } else { "" };
                let digits = coeff.to_str_radix(10);
                if *scale <= 0 {
                    write!(f, "{}{}{}", sign, digits, "0".repeat((-scale) as usize))
                } else {
                    let s = *scale as usize;
                    let digits = if digits.len() <= s {
                        format!("{}{}", "0".repeat(s + 1 - digits.len()), digits)
                    } else {
                        digits
                    };
                    let cut = digits.len() - s;
                    write!(f, "{}{}.{}", sign, &digits[..cut], &digits[cut..])
                }
            }
        }
    }
}

impl BigDecimal {
    /// Exactly `frac_digits` digits after the point.
    pub fn to_fixed(&self, frac_digits: u64, mode: RoundingMode) -> String {
        let (neg, coeff, scale) = match self.parts() {
            None => return self.to_string(),
            Some(p) => p,
        };
        let target = frac_digits as i64;
        let coeff = if scale <= target {
            coeff * ten_pow((target - scale) as u64)
        } else {
            round_digits(neg, coeff, (scale - target) as u64, false, mode)
        };
        BigDecimal::finite(neg && !coeff.is_zero(), coeff, target).to_string()
    }

    /// `d.ddd e±k` with a power-of-ten exponent; `frac_digits = None`
    /// keeps every coefficient digit.
    pub fn to_exponential(&self, frac_digits: Option<u64>, mode: RoundingMode) -> String {
        let (neg, coeff, scale) = match self.parts() {
            None => return self.to_string(),
            Some(p) => p,
        };
        let dc = dec_digits(coeff);
        let mut e = dc as i64 - 1 - scale;
        if coeff.is_zero() {
            e = 0;
        }
        let n = frac_digits.map(|f| f + 1).unwrap_or(dc);
        let mut q = if dc <= n {
            coeff * ten_pow(n - dc)
        } else {
            round_digits(neg, coeff, dc - n, false, mode)
        };
        if dec_digits(&q) > n && !q.is_zero() {
            q /= 10u32;
            e += 1;
        }
        let digits = q.to_str_radix(10);
        let head = &digits[..1];
        let tail = &digits[1..];
        let mantissa = if tail.is_empty() {
            head.to_string()
        } else {
            format!("{}.{}", head, tail)
        };
        format!(
            "{}{}e{}{}",
            if neg && !q.is_zero() { "-" } else { "" },
            mantissa,
            if e < 0 { "-" } else { "+" },
            e.unsigned_abs()
        )
    }

    /// `sig` significant digits, fixed layout unless the decimal
    /// exponent escapes `[-6, sig)` (the ECMAScript rule).
    pub fn to_precision(&self, sig: u64, mode: RoundingMode) -> Result<String, Error> {
        if sig == 0 {
            return Err(Error::InvalidConfiguration("toPrecision needs at least one digit"));
        }
        let (neg, coeff, scale) = match self.parts() {
            None => return Ok(self.to_string()),
            Some(p) => p,
        };
        if coeff.is_zero() {
            return Ok(BigDecimal::finite(false, BigUint::zero(), sig as i64 - 1).to_string());
        }
        let dc = dec_digits(coeff);
        let e = dc as i64 - 1 - scale;
        if e < -6 || e >= sig as i64 {
            return Ok(self.to_exponential(Some(sig - 1), mode));
        }
        let ctx = DecimalContext::new(mode, DigitLimit::SignificantDigits(sig))?;
        let rounded = round_exact(&ctx, neg, coeff.clone(), scale);
        let (neg, c2, s2) = rounded.parts().expect("finite");
        let dc2 = dec_digits(c2);
        if dc2 as i64 - 1 - s2 >= sig as i64 {
            // Rounding carried past the threshold after all.
            return Ok(self.to_exponential(Some(sig - 1), mode));
        }
        // Pad to exactly `sig` significant digits.
        let padded = if dc2 < sig {
            BigDecimal::finite(neg, c2 * ten_pow(sig - dc2), s2 + (sig - dc2) as i64)
        } else {
            rounded.clone()
        };
        Ok(padded.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn ctx(mode: &str, sig: Option<u64>, frac: Option<u64>) -> DecimalContext {
        DecimalContext::from_parts(mode, sig, frac).unwrap()
    }

    #[test]
    fn test_parse_exact() {
        assert_eq!(d("1234.1"), d("  1234.1  "));
        assert_eq!(d("1.5e3"), d("1500"));
        assert_eq!(d("25e-2"), d("0.25"));
        assert_eq!(d("-0.5").to_string(), "-0.5");
        assert!(matches!(
            "1.2.3".parse::<BigDecimal>(),
            Err(Error::MalformedLiteral(_))
        ));
        assert!(matches!("".parse::<BigDecimal>(), Err(Error::MalformedLiteral(_))));
    }

    #[test]
    fn test_exact_arithmetic() {
        assert_eq!(&d("123") + &d("1"), d("124"));
        assert_eq!(&d("123") - &d("1"), d("122"));
        let p = &d("3.2") * &d("3");
        assert_eq!(p, d("9.6"));
        assert_eq!(p.to_string(), "9.6");
        // Scale of a sum is the max of the operand scales.
        assert_eq!((&d("0.125") + &d("1.5")).to_string(), "1.625");
        assert_eq!((&d("1.50") + &d("0.50")).to_string(), "2.00");
    }

    #[test]
    fn test_div_exact_or_fail() {
        assert_eq!(div(&d("10"), &d("2"), None).unwrap(), d("5"));
        assert_eq!(div(&d("1"), &d("8"), None).unwrap(), d("0.125"));
        assert_eq!(div(&d("-3"), &d("4"), None).unwrap(), d("-0.75"));
        assert!(matches!(div(&d("10"), &d("3"), None), Err(Error::InexactResult)));
        assert!(matches!(div(&d("1"), &d("0"), None), Err(Error::DivisionByZero)));
    }

    #[test]
    fn test_div_rounded() {
        let c = ctx("half-even", Some(3), None);
        assert_eq!(div(&d("20"), &d("3"), Some(&c)).unwrap().to_string(), "6.67");
        let c = ctx("half-even", None, Some(50));
        assert_eq!(
            div(&d("20"), &d("3"), Some(&c)).unwrap().to_string(),
            "6.66666666666666666666666666666666666666666666666667"
        );
    }

    #[test]
    fn test_rem() {
        assert_eq!(rem(&d("10"), &d("3"), None).unwrap(), d("1"));
        assert_eq!(rem(&d("-10"), &d("3"), None).unwrap(), d("-1"));
        let c = ctx("half-even", None, Some(4));
        assert_eq!(
            rem(&d("3.14159"), &d("0.31211"), Some(&c)).unwrap().to_string(),
            "0.0205"
        );
    }

    #[test]
    fn test_pow() {
        assert_eq!(pow(&d("1234.5"), &d("3"), None).unwrap(), d("1881365963.625"));
        assert_eq!(pow(&d("2"), &d("0"), None).unwrap(), d("1"));
        assert_eq!(pow(&d("-2"), &d("3"), None).unwrap(), d("-8"));
        // Integer-valued exponents may carry a scale.
        assert_eq!(pow(&d("2"), &d("3.0"), None).unwrap(), d("8"));
        assert!(matches!(pow(&d("2"), &d("3.1"), None), Err(Error::InvalidExponent)));
        assert!(matches!(pow(&d("2"), &d("-3"), None), Err(Error::InvalidExponent)));
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(sqrt(&d("2.25"), None).unwrap(), d("1.5"));
        assert_eq!(sqrt(&d("400"), None).unwrap(), d("20"));
        assert_eq!(sqrt(&d("0.04"), None).unwrap().to_string(), "0.2");
        assert!(matches!(sqrt(&d("2"), None), Err(Error::InexactResult)));
        assert!(matches!(sqrt(&d("0.4"), None), Err(Error::InexactResult)));
        assert!(matches!(sqrt(&d("-1"), None), Err(Error::InvalidOperation(_))));

        let c = ctx("half-even", Some(4), None);
        assert_eq!(sqrt(&d("2"), Some(&c)).unwrap().to_string(), "1.414");
        let c = ctx("half-even", None, Some(3));
        assert_eq!(sqrt(&d("101"), Some(&c)).unwrap().to_string(), "10.050");
        assert_eq!(sqrt(&d("0.002"), Some(&c)).unwrap().to_string(), "0.045");
        // Scale far above the target: the guard shift runs backwards.
        let c = ctx("ceiling", None, Some(2));
        assert_eq!(
            sqrt(&d("0.0000000000002025"), Some(&c)).unwrap().to_string(),
            "0.01"
        );
    }

    #[test]
    fn test_round_and_context_ops() {
        let c = ctx("half-even", None, Some(3));
        assert_eq!(round(&d("3.14159"), &c).to_string(), "3.142");
        let c = ctx("half-even", None, Some(2));
        assert_eq!(add(&d("3.14159"), &d("0.31212"), Some(&c)).to_string(), "3.45");
        let c = ctx("down", None, Some(2));
        assert_eq!(sub(&d("3.14159"), &d("0.31212"), Some(&c)).to_string(), "2.82");
        let c = ctx("half-even", None, Some(3));
        assert_eq!(mul(&d("3.14159"), &d("0.31212"), Some(&c)).to_string(), "0.981");
    }

    #[test]
    fn test_context_validation() {
        assert!(matches!(
            DecimalContext::from_parts("half-even", None, None),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            DecimalContext::from_parts("half-even", Some(3), Some(3)),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            DecimalContext::from_parts("half-even", Some(0), None),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            DecimalContext::from_parts("sideways", Some(3), None),
            Err(Error::InvalidConfiguration(_))
        ));
        // Zero fraction digits is a legal integer-rounding context.
        let c = ctx("half-up", None, Some(0));
        assert_eq!(round(&d("2.5"), &c).to_string(), "3");
    }

    #[test]
    fn test_compare() {
        assert_eq!(d("10.050"), d("10.05"));
        assert!(d("1") < d("2"));
        assert!(d("-1") > d("-2"));
        assert_eq!(d("0"), d("-0"));
        assert!(BigDecimal::nan().compare(&d("1")).is_none());
        assert!(BigDecimal::infinity(false) > d("1e100"));
    }

    #[test]
    fn test_from_f64_shortest() {
        assert_eq!(BigDecimal::try_from_f64(0.1).unwrap(), d("0.1"));
        assert_eq!(BigDecimal::try_from_f64(123.0).unwrap(), d("123"));
        assert!(BigDecimal::try_from_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn test_formatting() {
        let x = d("1234.125");
        assert_eq!(x.to_string(), "1234.125");
        assert_eq!(x.to_fixed(2, RoundingMode::NearestAway), "1234.13");
        assert_eq!(x.to_fixed(2, RoundingMode::ToZero), "1234.12");
        assert_eq!(x.to_exponential(None, RoundingMode::NearestAway), "1.234125e+3");
        assert_eq!(x.to_exponential(Some(5), RoundingMode::NearestAway), "1.23413e+3");
        assert_eq!(x.to_exponential(Some(5), RoundingMode::ToZero), "1.23412e+3");
        assert_eq!(x.to_precision(6, RoundingMode::NearestAway).unwrap(), "1234.13");
        assert_eq!(x.to_precision(6, RoundingMode::ToZero).unwrap(), "1234.12");
        assert_eq!(
            (-&x).to_precision(6, RoundingMode::TowardNegative).unwrap(),
            "-1234.13"
        );
        assert_eq!(d("0.0000001").to_precision(3, RoundingMode::NearestEven).unwrap(), "1.00e-7");
        assert_eq!(d("10.050").to_string(), "10.050");
    }
}
