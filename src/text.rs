//! Text conversion for [`BigFloat`]: parsing and the four formatters.
//!
//! Parsing accepts any radix from 2 to 36 (or 0 for prefix detection)
//! and rounds the exact literal value once into the active environment.
//! Formatting is exact-integer arithmetic throughout: a digit string is
//! the rounding of `|x| · radix^t` for some integer `t`, so no binary
//! round-off ever leaks into the digits.
//!
//! Exponent markers: `e`/`E` carries a power of ten and is used for
//! radix 10 only; every other radix uses
//! `p`/`P` carrying a power of two. `to_string_radix` produces the
//! shortest digit string that reparses to the same value at the active
//! environment's precision, in plain positional notation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Pow, Zero};

use crate::env::{with_active, FloatEnv, RoundingMode, EXP_LIMIT};
use crate::error::Error;
use crate::float::BigFloat;
use crate::round::round_in_env;

// ---------------------------------------------------------------------------
// Parsing

/// Parse a numeric literal in the given radix (2 to 36, or 0 to detect
/// `0x`/`0o`/`0b` prefixes with a decimal default), rounding once into
/// the active environment. Leading and trailing whitespace is ignored;
/// `inf`, `infinity` and `nan` are matched case-insensitively.
pub fn parse(s: &str, radix: u32, env: Option<&FloatEnv>) -> Result<BigFloat, Error> {
    with_active(env, |env| parse_in(s, radix, env))
}

fn parse_in(s: &str, radix: u32, env: &FloatEnv) -> Result<BigFloat, Error> {
    if radix != 0 && !(2..=36).contains(&radix) {
        return Err(Error::InvalidConfiguration("radix must be 0 or between 2 and 36"));
    }
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
        return Ok(BigFloat::infinity(neg));
    }
    if t.eq_ignore_ascii_case("nan") {
        return Ok(BigFloat::nan());
    }

    let radix = if radix == 0 {
        if let Some(rest) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
            t = rest;
            16
        } else if let Some(rest) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
            t = rest;
            8
        } else if let Some(rest) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
            t = rest;
            2
        } else {
            10
        }
    } else {
        radix
    };

    let mut acc = BigUint::zero();
    let mut ndigits = 0u64;
    let mut frac_len: i128 = 0;
    let mut seen_point = false;
    let mut chars = t.char_indices().peekable();
    while let Some(&(_, c)) = chars.peek() {
        if c == '.' {
            if seen_point {
                return Err(bad());
            }
            seen_point = true;
            chars.next();
        } else if let Some(d) = c.to_digit(radix) {
            acc = acc * radix + d;
            ndigits += 1;
            if seen_point {
                frac_len += 1;
            }
            chars.next();
        } else {
            break;
        }
    }
    if ndigits == 0 {
        return Err(bad());
    }

    // Exponent marker: decimal exponent for radix 10, binary otherwise.
    // In radices where the marker letter is itself a digit it has already
    // been consumed above, which matches the grammar: no marker there.
    let mut marker: i128 = 0;
    if let Some(&(_, c)) = chars.peek() {
        let is_marker = if radix == 10 {
            c == 'e' || c == 'E'
        } else {
            c == 'p' || c == 'P'
        };
        if !is_marker {
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
        let mut any = false;
        while let Some(&(_, c)) = chars.peek() {
            if let Some(d) = c.to_digit(10) {
                any = true;
                // Saturate far past the exponent wall; the magnitude
                // clamp below turns it into a clean overflow/underflow.
                if marker < 1i128 << 80 {
                    marker = marker * 10 + d as i128;
                }
                chars.next();
            } else {
                return Err(bad());
            }
        }
        if !any {
            return Err(bad());
        }
        if exp_neg {
            marker = -marker;
        }
    }

    if acc.is_zero() {
        return Ok(BigFloat::zero(neg));
    }

    // value = acc · radix^f_exp · 2^b_exp
    let (f_exp, b_exp) = if radix == 10 {
        (marker - frac_len, 0i128)
    } else {
        (-frac_len, marker)
    };

    // Magnitude clamp: literals evidently past the exponent wall saturate
    // without materializing astronomically large scale factors.
    let log2r = (radix as f64).log2();
    let approx = acc.bits() as f64 + f_exp as f64 * log2r + b_exp as f64;
    let wall = EXP_LIMIT as f64 * 1.5;
    if approx > wall {
        return Ok(round_in_env(env, neg, BigUint::one(), EXP_LIMIT as i128 + 8, true));
    }
    if approx < -wall {
        return Ok(round_in_env(env, neg, BigUint::one(), -(EXP_LIMIT as i128) - 8, true));
    }

    let r = BigUint::from(radix);
    if f_exp >= 0 {
        let mant = acc * Pow::pow(&r, f_exp as u64);
        let exp = b_exp + mant.bits() as i128 - 1;
        Ok(round_in_env(env, neg, mant, exp, false))
    } else {
        let den = Pow::pow(&r, (-f_exp) as u64);
        let k = (env.prec() as u64 + 2 + den.bits()).saturating_sub(acc.bits());
        let (q, rem) = (acc << k).div_rem(&den);
        let sticky = !rem.is_zero();
        let exp = b_exp - k as i128 + q.bits() as i128 - 1;
        Ok(round_in_env(env, neg, q, exp, sticky))
    }
}

// ---------------------------------------------------------------------------
// Digit generation

fn split(x: &BigFloat) -> (bool, BigUint, i64) {
    let (mant, exp) = x.finite_parts().expect("digit generation needs a finite value");
    let lsb = exp - mant.bits() as i64 + 1;
    (x.is_sign_negative(), mant.clone(), lsb)
}

/// `|x| · radix^t` rounded to an integer. The sign only steers the
/// directed modes.
fn round_scaled(
    neg: bool,
    m: &BigUint,
    lsb: i64,
    radix: u32,
    t: i64,
    mode: RoundingMode,
) -> BigUint {
    let r = BigUint::from(radix);
    let mut num = m.clone();
    let mut den = BigUint::one();
    if t >= 0 {
        num *= Pow::pow(&r, t as u64);
    } else {
        den = Pow::pow(&r, (-t) as u64);
    }
    if lsb >= 0 {
        num <<= lsb as u64;
    } else {
        den <<= (-lsb) as u64;
    }
    let (mut q, rem) = num.div_rem(&den);
    if !rem.is_zero() {
        let half = (&rem << 1u8).cmp(&den);
        if mode == RoundingMode::ToOdd {
            q |= BigUint::one();
        } else if mode.round_away(neg, q.is_odd(), half) {
            q += 1u8;
        }
    }
    q
}

/// Compare `m · 2^lsb` against `radix^e` exactly.
fn cmp_pow(m: &BigUint, lsb: i64, radix: u32, e: i64) -> Ordering {
    let r = BigUint::from(radix);
    let mut a = m.clone();
    let mut b = BigUint::one();
    if e >= 0 {
        b = Pow::pow(&r, e as u64);
    } else {
        a *= Pow::pow(&r, (-e) as u64);
    }
    if lsb >= 0 {
        a <<= lsb as u64;
    } else {
        b <<= (-lsb) as u64;
    }
    a.cmp(&b)
}

/// Digit exponent `e` with `radix^e <= |x| < radix^(e+1)`.
fn digit_exponent(m: &BigUint, lsb: i64, radix: u32) -> i64 {
    let msb = lsb + m.bits() as i64 - 1;
    if radix.is_power_of_two() {
        return msb.div_euclid(radix.trailing_zeros() as i64);
    }
    let mut e = (msb as f64 / (radix as f64).log2()).floor() as i64;
    while cmp_pow(m, lsb, radix, e) == Ordering::Less {
        e -= 1;
    }
    while cmp_pow(m, lsb, radix, e + 1) != Ordering::Less {
        e += 1;
    }
    e
}

/// `n` significant digits of `|x|`, given its digit exponent. A carry
/// out of the top digit bumps the exponent.
fn sig_digits(
    neg: bool,
    m: &BigUint,
    lsb: i64,
    radix: u32,
    n: u32,
    e: i64,
    mode: RoundingMode,
) -> (String, i64) {
    let mut q = round_scaled(neg, m, lsb, radix, n as i64 - 1 - e, mode);
    let mut e = e;
    let rn = Pow::pow(&BigUint::from(radix), n as u64);
    if q >= rn {
        // Only an all-(radix−1) string carries, and then exactly to r^n.
        q = Pow::pow(&BigUint::from(radix), (n - 1) as u64);
        e += 1;
    }
    (q.to_str_radix(radix), e)
}

/// Smallest `k >= 0` such that `|x| · radix^k` is an integer. Only
/// meaningful for even radices, where dyadic values terminate.
fn exact_scale(lsb: i64, radix: u32) -> u32 {
    if lsb >= 0 {
        return 0;
    }
    let a = radix.trailing_zeros() as i64;
    debug_assert!(a > 0);
    Integer::div_ceil(&-lsb, &a) as u32
}

fn layout_fixed(digits: &str, e: i64) -> String {
    let len = digits.len() as i64;
    if e >= 0 {
        if e + 1 >= len {
            format!("{}{}", digits, "0".repeat((e + 1 - len) as usize))
        } else {
            let cut = (e + 1) as usize;
            format!("{}.{}", &digits[..cut], &digits[cut..])
        }
    } else {
        format!("0.{}{}", "0".repeat((-e - 1) as usize), digits)
    }
}

fn sign_str(neg: bool) -> &'static str {
    if neg {
        "-"
    } else {
        ""
    }
}

/// Special values format JavaScript-style; `None` for finite input.
fn format_special(x: &BigFloat) -> Option<String> {
    if x.is_nan() {
        Some("NaN".to_string())
    } else if x.is_infinite() {
        Some(format!("{}Infinity", sign_str(x.is_sign_negative())))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Formatters

/// Shortest digit string that reparses (at the active environment's
/// precision, nearest-even) to exactly `x`, in plain positional
/// notation. Values carrying more bits than the environment fall back
/// to their exact expansion.
pub fn to_string_radix(x: &BigFloat, radix: u32, env: Option<&FloatEnv>) -> String {
    assert!((2..=36).contains(&radix), "radix out of range");
    if let Some(s) = format_special(x) {
        return s;
    }
    if x.is_zero() {
        return format!("{}0", sign_str(x.is_sign_negative()));
    }
    let (neg, m, lsb) = split(x);
    let e = digit_exponent(&m, lsb, radix);
    let prec = with_active(env, |env| env.prec());
    let trial = FloatEnv::scratch(prec, RoundingMode::NearestEven);
    let max_digits = (prec as f64 / (radix as f64).log2()).ceil() as u32 + 1;
    for n in 1..=max_digits {
        let (digits, e2) = sig_digits(neg, &m, lsb, radix, n, e, RoundingMode::NearestEven);
        let s = format!("{}{}", sign_str(neg), layout_fixed(&digits, e2));
        if parse(&s, radix, Some(&trial)).map(|v| v == *x).unwrap_or(false) {
            return s;
        }
    }
    // More bits than the environment can round-trip: exact expansion for
    // even radices, saturated digit count otherwise.
    if radix % 2 == 0 {
        let k = exact_scale(lsb, radix);
        let q = round_scaled(neg, &m, lsb, radix, k as i64, RoundingMode::NearestEven);
        let digits = q.to_str_radix(radix);
        let e = digits.len() as i64 - 1 - k as i64;
        format!("{}{}", sign_str(neg), layout_fixed(&digits, e))
    } else {
        let (digits, e2) = sig_digits(neg, &m, lsb, radix, max_digits, e, RoundingMode::NearestEven);
        format!("{}{}", sign_str(neg), layout_fixed(&digits, e2))
    }
}

/// Exactly `frac_digits` digits after the radix point.
pub fn to_fixed(x: &BigFloat, frac_digits: u32, mode: RoundingMode, radix: u32) -> String {
    assert!((2..=36).contains(&radix), "radix out of range");
    if let Some(s) = format_special(x) {
        return s;
    }
    let (neg, digits) = if x.is_zero() {
        (false, "0".repeat(frac_digits as usize + 1))
    } else {
        let (neg, m, lsb) = split(x);
        let q = round_scaled(neg, &m, lsb, radix, frac_digits as i64, mode);
        let mut s = q.to_str_radix(radix);
        if s.len() <= frac_digits as usize {
            s = format!("{}{}", "0".repeat(frac_digits as usize + 1 - s.len()), s);
        }
        (neg, s)
    };
    let mut out = String::from(sign_str(neg));
    if frac_digits == 0 {
        out.push_str(&digits);
    } else {
        let cut = digits.len() - frac_digits as usize;
        out.push_str(&digits[..cut]);
        out.push('.');
        out.push_str(&digits[cut..]);
    }
    out
}

/// One leading digit, `frac_digits` digits after the point (all
/// significant digits if `None`), and an exponent suffix: `e±d` with a
/// decimal exponent for radix 10, `p±b` with a binary exponent
/// otherwise.
pub fn to_exponential(
    x: &BigFloat,
    frac_digits: Option<u32>,
    mode: RoundingMode,
    radix: u32,
) -> String {
    assert!((2..=36).contains(&radix), "radix out of range");
    if let Some(s) = format_special(x) {
        return s;
    }
    if x.is_zero() {
        let f = frac_digits.unwrap_or(0);
        let digits = layout_exponential("0", &"0".repeat(f as usize + 1));
        let marker = if radix == 10 { "e+0" } else { "p+0" };
        return format!("{}{}{}", sign_str(x.is_sign_negative()), digits, marker);
    }
    let (neg, m, lsb) = split(x);

    if radix == 10 {
        let e = digit_exponent(&m, lsb, radix);
        let (digits, e) = match frac_digits {
            Some(f) => sig_digits(neg, &m, lsb, radix, f + 1, e, mode),
            None => {
                let k = exact_scale(lsb, radix);
                let q = round_scaled(neg, &m, lsb, radix, k as i64, mode);
                let digits = q.to_str_radix(radix);
                let e = digits.len() as i64 - 1 - k as i64;
                (digits, e)
            }
        };
        return format!(
            "{}{}e{}{}",
            sign_str(neg),
            layout_exponential(&digits[..1], &digits),
            if e < 0 { "-" } else { "+" },
            e.unsigned_abs()
        );
    }

    // Binary exponent: the leading digit's weight is 2^b. For a
    // power-of-two radix b is a multiple of log2(radix), giving the
    // natural digit alignment; otherwise the mantissa lies in [1, 2).
    let msb = lsb + m.bits() as i64 - 1;
    let pow2 = radix.is_power_of_two();
    let a = if pow2 { radix.trailing_zeros() as i64 } else { 1 };
    let mut b = if pow2 { msb.div_euclid(a) * a } else { msb };
    let n = match frac_digits {
        Some(f) => f + 1,
        None if pow2 => {
            let k = exact_scale(lsb, radix);
            let q = round_scaled(neg, &m, lsb, radix, k as i64, mode);
            let digits = q.to_str_radix(radix);
            let b = a * (digits.len() as i64 - 1 - k as i64);
            return format!(
                "{}{}p{}{}",
                sign_str(neg),
                layout_exponential(&digits[..1], &digits),
                if b < 0 { "-" } else { "+" },
                b.unsigned_abs()
            );
        }
        // Non-power-of-two radices have no exact binary-exponent form;
        // cover the value's own bits instead.
        None => (m.bits() as f64 / (radix as f64).log2()).ceil() as u32 + 1,
    };
    let mut q = round_scaled(neg, &m, lsb - b, radix, n as i64 - 1, mode);
    let rn = Pow::pow(&BigUint::from(radix), n as u64);
    if q >= rn {
        q = Pow::pow(&BigUint::from(radix), (n - 1) as u64);
        b += a;
    }
    let digits = q.to_str_radix(radix);
    format!(
        "{}{}p{}{}",
        sign_str(neg),
        layout_exponential(&digits[..1], &digits),
        if b < 0 { "-" } else { "+" },
        b.unsigned_abs()
    )
}

fn layout_exponential(head: &str, digits: &str) -> String {
    if digits.len() > head.len() {
        format!("{}.{}", head, &digits[head.len()..])
    } else {
        head.to_string()
    }
}

/// `sig_digits` significant digits, in fixed layout unless the digit
/// exponent falls below −6 or reaches the digit count (the ECMAScript
/// `toPrecision` rule), in which case the exponential layout is used.
pub fn to_precision(
    x: &BigFloat,
    sig: u32,
    mode: RoundingMode,
    radix: u32,
) -> Result<String, Error> {
    assert!((2..=36).contains(&radix), "radix out of range");
    if sig == 0 {
        return Err(Error::InvalidConfiguration("toPrecision needs at least one digit"));
    }
    if let Some(s) = format_special(x) {
        return Ok(s);
    }
    if x.is_zero() {
        let digits = "0".repeat(sig as usize);
        return Ok(layout_fixed(&digits, 0));
    }
    let (neg, m, lsb) = split(x);
    let e = digit_exponent(&m, lsb, radix);
    if e < -6 || e >= sig as i64 {
        return Ok(to_exponential(x, Some(sig - 1), mode, radix));
    }
    let (digits, e2) = sig_digits(neg, &m, lsb, radix, sig, e, mode);
    if e2 >= sig as i64 {
        // The rounding carried past the layout threshold.
        return Ok(to_exponential(x, Some(sig - 1), mode, radix));
    }
    Ok(format!("{}{}", sign_str(neg), layout_fixed(&digits, e2)))
}

impl fmt::Display for BigFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_string_radix(self, 10, None))
    }
}

impl FromStr for BigFloat {
    type Err = Error;

    /// Parse with radix prefix detection against the ambient environment.
    fn from_str(s: &str) -> Result<BigFloat, Error> {
        parse(s, 0, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn env(prec: u32) -> FloatEnv {
        FloatEnv::with_prec(prec).unwrap()
    }

    fn lit(s: &str) -> BigFloat {
        parse(s, 0, Some(&env(113))).unwrap()
    }

    #[test]
    fn test_parse_basic() {
        assert_eq!(lit("1234.125"), BigFloat::from_f64(1234.125));
        assert_eq!(lit("-0.5"), BigFloat::from_f64(-0.5));
        assert_eq!(lit("1.5e3"), BigFloat::from_f64(1500.0));
        assert_eq!(lit("25e-2"), BigFloat::from_f64(0.25));
        assert_eq!(lit("0x10"), BigFloat::from_f64(16.0));
        assert_eq!(lit("0b101"), BigFloat::from_f64(5.0));
        assert_eq!(lit("0x1.8p+2"), BigFloat::from_f64(6.0));
        assert_eq!(lit("  42  "), BigFloat::from_f64(42.0));
    }

    #[test]
    fn test_parse_specials() {
        assert!(lit("inf").is_infinite());
        assert!(lit("-Infinity").is_infinite() && lit("-Infinity").is_sign_negative());
        assert!(lit("NaN").is_nan());
        let z = lit("-0");
        assert!(z.is_zero() && z.is_sign_negative());
    }

    #[test]
    fn test_parse_malformed() {
        for s in ["", ".", "12x", "1.2.3", "e5", "1e", "1e+", "0x", "--1"] {
            assert!(
                matches!(parse(s, 0, Some(&env(64))), Err(Error::MalformedLiteral(_))),
                "accepted {:?}",
                s
            );
        }
        assert!(matches!(
            parse("1", 37, Some(&env(64))),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_parse_rounding_and_flags() {
        let e = env(113);
        let v = parse("0.5", 10, Some(&e)).unwrap();
        assert_eq!(v, BigFloat::from_f64(0.5));
        assert!(!e.inexact());
        parse("0.1", 10, Some(&e)).unwrap();
        assert!(e.inexact());

        // Directed parse rounding.
        let e = FloatEnv::new(4, RoundingMode::ToZero).unwrap();
        let v = parse("15.9", 10, Some(&e)).unwrap();
        assert_eq!(v, BigFloat::from_f64(15.0));
    }

    #[test]
    fn test_parse_hex_reference_literal() {
        let e = env(128);
        let v = parse("0x1.6a09e667f3bcc908b2fb1366ea957d3e", 0, Some(&e)).unwrap();
        assert!(!e.inexact());
        assert_eq!(to_string_radix(&v, 16, Some(&e)), "1.6a09e667f3bcc908b2fb1366ea957d3e");
    }

    #[test]
    fn test_to_string_decimal() {
        assert_eq!(to_string_radix(&lit("1234.125"), 10, None), "1234.125");
        assert_eq!(to_string_radix(&BigFloat::from_f64(0.0), 10, None), "0");
        assert_eq!(to_string_radix(&BigFloat::from_f64(-0.0), 10, None), "-0");
        assert_eq!(to_string_radix(&BigFloat::from_f64(-42.0), 10, None), "-42");
        assert_eq!(to_string_radix(&BigFloat::nan(), 10, None), "NaN");
        assert_eq!(to_string_radix(&BigFloat::infinity(true), 10, None), "-Infinity");
    }

    #[test]
    fn test_to_string_hex_family() {
        for s in ["123.438", "323.438", "723.438", "f23.438"] {
            let v = parse(&format!("0x{}", s), 0, Some(&env(113))).unwrap();
            assert_eq!(to_string_radix(&v, 16, None), s);
        }
    }

    #[test]
    fn test_to_fixed_decimal() {
        let x = lit("1234.125");
        assert_eq!(to_fixed(&x, 2, RoundingMode::NearestAway, 10), "1234.13");
        assert_eq!(to_fixed(&x, 2, RoundingMode::ToZero, 10), "1234.12");
        assert_eq!(to_fixed(&x, 0, RoundingMode::NearestAway, 10), "1234");
        assert_eq!(to_fixed(&x.neg(), 2, RoundingMode::NearestAway, 10), "-1234.13");
        assert_eq!(to_fixed(&BigFloat::from_f64(0.0), 2, RoundingMode::NearestEven, 10), "0.00");
    }

    #[test]
    fn test_to_fixed_hex_family() {
        for s in ["123", "323", "723", "f23"] {
            let v = parse(&format!("0x{}.438", s), 0, Some(&env(113))).unwrap();
            assert_eq!(
                to_fixed(&v, 2, RoundingMode::NearestAway, 16),
                format!("{}.44", s)
            );
        }
        let tiny = lit("0x0.0000438");
        assert_eq!(to_fixed(&tiny, 6, RoundingMode::NearestAway, 16), "0.000044");
        let big = lit("0x1230000000");
        assert_eq!(to_fixed(&big, 1, RoundingMode::NearestAway, 16), "1230000000.0");
    }

    #[test]
    fn test_to_exponential() {
        let x = lit("1234.125");
        assert_eq!(to_exponential(&x, None, RoundingMode::NearestAway, 10), "1.234125e+3");
        assert_eq!(to_exponential(&x, Some(5), RoundingMode::NearestAway, 10), "1.23413e+3");
        assert_eq!(to_exponential(&x, Some(5), RoundingMode::ToZero, 10), "1.23412e+3");
        let h = lit("0x123.438");
        assert_eq!(to_exponential(&h, Some(4), RoundingMode::NearestAway, 16), "1.2344p+8");
        assert_eq!(to_exponential(&h, None, RoundingMode::NearestAway, 16), "1.23438p+8");
        assert_eq!(
            to_exponential(&lit("0.00025"), Some(1), RoundingMode::NearestAway, 10),
            "2.5e-4"
        );
    }

    #[test]
    fn test_to_precision() {
        let x = lit("1234.125");
        assert_eq!(to_precision(&x, 6, RoundingMode::NearestAway, 10).unwrap(), "1234.13");
        assert_eq!(to_precision(&x, 6, RoundingMode::ToZero, 10).unwrap(), "1234.12");
        assert_eq!(
            to_precision(&x.neg(), 6, RoundingMode::TowardNegative, 10).unwrap(),
            "-1234.13"
        );
        let h = lit("0x123.438");
        assert_eq!(to_precision(&h, 5, RoundingMode::NearestAway, 16).unwrap(), "123.44");
        assert_eq!(to_precision(&h, 5, RoundingMode::ToZero, 16).unwrap(), "123.43");
        let hn = lit("-0xf23.438");
        assert_eq!(
            to_precision(&hn, 5, RoundingMode::TowardNegative, 16).unwrap(),
            "-f23.44"
        );
        // ECMA layout switches.
        assert_eq!(to_precision(&lit("12345"), 2, RoundingMode::NearestEven, 10).unwrap(), "1.2e+4");
        assert_eq!(
            to_precision(&lit("0.0000001"), 3, RoundingMode::NearestEven, 10).unwrap(),
            "1.00e-7"
        );
        assert!(to_precision(&x, 0, RoundingMode::NearestEven, 10).is_err());
    }

    #[test]
    fn test_precision_carry_switches_layout() {
        // 999.9 to 3 significant digits carries to 1000: exponential.
        let v = lit("999.9");
        assert_eq!(to_precision(&v, 3, RoundingMode::NearestEven, 10).unwrap(), "1.00e+3");
        assert_eq!(to_precision(&v, 4, RoundingMode::NearestEven, 10).unwrap(), "999.9");
    }

    #[test]
    fn test_display_uses_ambient_precision() {
        assert_eq!(format!("{}", lit("1234.125")), "1234.125");
        assert_eq!("1234.125".parse::<BigFloat>().unwrap(), lit("1234.125"));
    }

    proptest! {
        #[test]
        fn prop_to_string_round_trips(bits in any::<u64>()) {
            let x = BigFloat::from_f64(f64::from_bits(bits));
            prop_assume!(x.is_finite());
            let s = to_string_radix(&x, 10, None);
            let back = parse(&s, 10, Some(&env(113))).unwrap();
            prop_assert_eq!(back, x);
        }

        #[test]
        fn prop_fixed_digit_count(v in -1.0e6f64..1.0e6, n in 0u32..8) {
            let x = BigFloat::from_f64(v);
            let s = to_fixed(&x, n, RoundingMode::NearestEven, 10);
            if n > 0 {
                let frac = s.rsplit('.').next().unwrap();
                prop_assert_eq!(frac.len(), n as usize);
            } else {
                prop_assert!(!s.contains('.'));
            }
        }
    }
}
