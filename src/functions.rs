//! Correctly-rounded elementary functions over [`BigFloat`].
//!
//! Every function delivers the exact mathematical result rounded exactly
//! once to the active environment. Internally each transcendental runs at
//! a widened working precision and the result is accepted only when a
//! stability check proves the final rounding unambiguous: the kernel's
//! approximation, nudged down and up by its worst-case error, must round
//! to the same target value. If not, the working precision doubles and
//! the kernel reruns (Ziv's strategy). Exact cases such as `exp(0)`,
//! `pow` with a small integer exponent, or `sqrt` of a perfect square
//! are peeled off before any kernel runs so they never raise `inexact`
//! and never park the approximation on a rounding boundary.
//!
//! Domain violations follow the soft-failure discipline of the binary
//! type: NaN (or an infinity) comes back and the environment's `invalid`
//! flag is raised; nothing here returns `Result`.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};

use crate::env::{with_active, FloatEnv, RoundingMode, EXP_LIMIT};
use crate::float::BigFloat;
use crate::round::{round_in_env, round_value};

// ---------------------------------------------------------------------------
// Ziv loop

/// Upper bound on the kernel's relative error at working precision `wp`:
/// `|err| <= 2^(exp(result) - (wp - margin))`. Covers per-operation
/// rounding noise (at most a few `wp` terms of half an ulp each) with a
/// wide cushion; the stability check makes an optimistic bound a
/// performance bug, not a correctness bug, but the cushion keeps retries
/// rare.
fn err_margin(wp: u32) -> i64 {
    (wp.ilog2() + 24) as i64
}

/// Run `kernel` at increasing working precision until its result rounds
/// unambiguously into `env`. The kernel returns a finite nonzero
/// approximation plus a power-of-two bias to fold into the exponent at
/// the very end (so argument-reduction scalings cannot overflow the
/// intermediate exponents).
///
/// Callers guarantee the exact result is irrational (or otherwise not
/// representable at any precision), so the loop terminates and `inexact`
/// is always the truth.
fn ziv(env: &FloatEnv, kernel: impl Fn(u32) -> (BigFloat, i64)) -> BigFloat {
    let p = env.prec();
    let mut wp = p + 64;
    let cap = wp.saturating_mul(64);
    loop {
        let margin = err_margin(wp);
        debug_assert!((wp as i64) - margin > p as i64 + 2);
        let (approx, bias) = kernel(wp);
        if let Some((mant, exp)) = approx.finite_parts() {
            let exp_total = exp as i128 + bias as i128;
            let err_exp = exp_total - (wp as i64 - margin) as i128;
            if let Some(v) = round_if_stable(
                env,
                approx.is_sign_negative(),
                mant,
                exp_total,
                err_exp,
                wp >= cap,
            ) {
                return v;
            }
        }
        wp *= 2;
    }
}

/// Round `±mant × 2^(exp − bits + 1)` into `env` if both ends of the
/// error interval `value ± 2^err_exp` round identically. With `force`
/// set, deliver the midpoint rounding unconditionally (termination
/// backstop; unreachable in practice).
fn round_if_stable(
    env: &FloatEnv,
    neg: bool,
    mant: &BigUint,
    exp: i128,
    err_exp: i128,
    force: bool,
) -> Option<BigFloat> {
    let bits = mant.bits() as i128;
    let lsb = exp - bits + 1;
    let (m, m_lsb) = if err_exp >= lsb {
        (mant.clone(), lsb)
    } else {
        (mant << (lsb - err_exp) as u32, err_exp)
    };
    let step = BigUint::one() << (err_exp - m_lsb) as u32;
    if m <= step {
        // Error interval straddles zero; the approximation is useless.
        return None;
    }
    let lo = &m - &step;
    let hi = &m + &step;
    let exp_of = |x: &BigUint| m_lsb + x.bits() as i128 - 1;

    let (vlo, _) = round_value(neg, lo.clone(), exp_of(&lo), true, env.prec(), env.mode());
    let (vhi, shi) = round_value(neg, hi.clone(), exp_of(&hi), true, env.prec(), env.mode());
    if force || vlo == vhi {
        // Rounding is monotone, so every value in the interval,
        // the exact result included, rounds to this.
        env.raise(|s| {
            s.inexact = true;
            s.merge(shi);
        });
        Some(vhi)
    } else {
        None
    }
}

fn scratch(wp: u32) -> FloatEnv {
    FloatEnv::scratch(wp, RoundingMode::NearestEven)
}

// ---------------------------------------------------------------------------
// Fixed-point constants

/// `floor(ln 2 · 2^scale)` within a few ulps, via `ln 2 = 2·atanh(1/3)`:
/// `2·Σ 1/((2k+1)·3^(2k+1))`.
fn ln2_fixed(scale: u64) -> BigUint {
    let mut acc = BigUint::zero();
    let mut pow = (BigUint::one() << scale) / 3u32;
    let mut k = 0u64;
    while !pow.is_zero() {
        acc += &pow / (2 * k + 1);
        pow /= 9u32;
        k += 1;
    }
    acc << 1
}

/// `floor(atan(1/x) · 2^scale)` within a few ulps (Gregory series).
fn atan_inv_fixed(x: u64, scale: u64) -> BigInt {
    let mut acc = BigInt::zero();
    let mut pow = BigInt::from((BigUint::one() << scale) / x);
    let xx = x * x;
    let mut k = 0u64;
    while !pow.is_zero() {
        let term = &pow / (2 * k + 1);
        if k % 2 == 0 {
            acc += term;
        } else {
            acc -= term;
        }
        pow /= xx;
        k += 1;
    }
    acc
}

/// `π` to `wp` fractional bits, by Machin's formula
/// `π = 16·atan(1/5) − 4·atan(1/239)`.
fn pi_at(wp: u64) -> BigFloat {
    let scale = wp + 16;
    let v = (atan_inv_fixed(5, scale) << 4u32) - (atan_inv_fixed(239, scale) << 2u32);
    let mag = v.magnitude().clone();
    let exp = mag.bits() as i64 - 1 - scale as i64;
    BigFloat::from_raw(false, mag, exp)
}

/// `ln 2` to `wp` fractional bits.
fn ln2_at(wp: u64) -> BigFloat {
    let scale = wp + 16;
    let mag = ln2_fixed(scale);
    let exp = mag.bits() as i64 - 1 - scale as i64;
    BigFloat::from_raw(false, mag, exp)
}

// ---------------------------------------------------------------------------
// Series kernels (arguments pre-reduced to small magnitude)

/// Stop once terms fall `wp + 8` bits below the running sum.
fn converged(term: &BigFloat, sum: &BigFloat, wp: u32) -> bool {
    match (term.exponent(), sum.exponent()) {
        (None, _) => true,
        (Some(te), Some(se)) => te < se - wp as i64 - 8,
        _ => false,
    }
}

/// `e^r` for `|r| < 1`, by Taylor series.
fn exp_series(r: &BigFloat, wp: u32) -> BigFloat {
    let e = scratch(wp);
    let mut sum = BigFloat::from(1i64);
    let mut term = BigFloat::from(1i64);
    let mut n = 1i64;
    loop {
        term = term.mul(r, Some(&e)).div(&BigFloat::from(n), Some(&e));
        if converged(&term, &sum, wp) {
            break;
        }
        sum = sum.add(&term, Some(&e));
        n += 1;
    }
    sum
}

/// `atanh(t)` for `|t| < 1/2`, by `t + t³/3 + t⁵/5 + …`.
fn atanh_series(t: &BigFloat, wp: u32) -> BigFloat {
    let e = scratch(wp);
    let t2 = t.mul(t, Some(&e));
    let mut sum = t.clone();
    let mut pow = t.clone();
    let mut n = 3i64;
    loop {
        pow = pow.mul(&t2, Some(&e));
        let term = pow.div(&BigFloat::from(n), Some(&e));
        if converged(&term, &sum, wp) {
            break;
        }
        sum = sum.add(&term, Some(&e));
        n += 2;
    }
    sum
}

/// `atan(t)` for small `|t|` (callers reduce below 1/8).
fn atan_series(t: &BigFloat, wp: u32) -> BigFloat {
    let e = scratch(wp);
    let t2 = t.mul(t, Some(&e)).neg();
    let mut sum = t.clone();
    let mut pow = t.clone();
    let mut n = 3i64;
    loop {
        pow = pow.mul(&t2, Some(&e));
        let term = pow.div(&BigFloat::from(n), Some(&e));
        if converged(&term, &sum, wp) {
            break;
        }
        sum = sum.add(&term, Some(&e));
        n += 2;
    }
    sum
}

/// `sin r` for `|r|` at most a little over π/4.
fn sin_series(r: &BigFloat, wp: u32) -> BigFloat {
    let e = scratch(wp);
    let r2 = r.mul(r, Some(&e)).neg();
    let mut sum = r.clone();
    let mut term = r.clone();
    let mut n = 1i64;
    loop {
        term = term
            .mul(&r2, Some(&e))
            .div(&BigFloat::from((n + 1) * (n + 2)), Some(&e));
        if converged(&term, &sum, wp) {
            break;
        }
        sum = sum.add(&term, Some(&e));
        n += 2;
    }
    sum
}

/// `cos r` for `|r|` at most a little over π/4.
fn cos_series(r: &BigFloat, wp: u32) -> BigFloat {
    let e = scratch(wp);
    let r2 = r.mul(r, Some(&e)).neg();
    let mut sum = BigFloat::from(1i64);
    let mut term = BigFloat::from(1i64);
    let mut n = 0i64;
    loop {
        term = term
            .mul(&r2, Some(&e))
            .div(&BigFloat::from((n + 1) * (n + 2)), Some(&e));
        if converged(&term, &sum, wp) {
            break;
        }
        sum = sum.add(&term, Some(&e));
        n += 2;
    }
    sum
}

/// `ln(x)` kernel for finite positive `x`.
fn log_kernel(x: &BigFloat, wp: u32) -> BigFloat {
    let e = scratch(wp);
    let (mant, exp) = x.finite_parts().expect("log kernel needs finite input");
    // x = m̂ · 2^exp with m̂ ∈ [1, 2): ln x = exp·ln2 + 2·atanh((m̂−1)/(m̂+1)).
    let mhat = BigFloat::from_raw(false, mant.clone(), 0);
    let one = BigFloat::from(1i64);
    let t = mhat
        .sub(&one, Some(&e))
        .div(&mhat.add(&one, Some(&e)), Some(&e));
    let ln_m = if t.is_zero() {
        BigFloat::zero(false)
    } else {
        mul_pow2(&atanh_series(&t, wp), 1)
    };
    let e_ln2 = ln2_at(wp as u64).mul(&BigFloat::from(exp), Some(&e));
    e_ln2.add(&ln_m, Some(&e))
}

// ---------------------------------------------------------------------------
// Small exact helpers

/// Multiply a finite value by `2^k` exactly. Kernel-internal: `k` stays
/// far from the exponent wall.
fn mul_pow2(x: &BigFloat, k: i64) -> BigFloat {
    match x.finite_parts() {
        Some((mant, exp)) => BigFloat::from_raw(x.is_sign_negative(), mant.clone(), exp + k),
        None => x.clone(),
    }
}

/// Nearest integer (half away from zero) of a finite value.
fn to_nearest_bigint(x: &BigFloat) -> BigInt {
    let (m, e) = match x.to_scaled() {
        Some(v) => v,
        None => return BigInt::zero(),
    };
    if e >= 0 {
        m << e as u32
    } else {
        let k = (-e) as u32;
        let half = BigInt::one() << (k - 1);
        let adj = if m.is_negative() { m - half } else { m + half };
        // Truncating shift toward zero.
        let (q, _) = adj.div_rem(&(BigInt::one() << k));
        q
    }
}

// ---------------------------------------------------------------------------
// Public surface

/// Correctly rounded square root. Negative input is a soft failure: NaN
/// with `invalid` raised.
pub fn sqrt(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || (x.is_sign_negative() && !x.is_zero()) {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x.is_zero() {
            return x.clone();
        }
        if x.is_infinite() {
            return BigFloat::infinity(false);
        }
        let (mant, exp) = x.finite_parts().expect("finite");
        let mut m = mant.clone();
        let mut lsb = exp - m.bits() as i64 + 1;
        if lsb.rem_euclid(2) == 1 {
            m <<= 1u8;
            lsb -= 1;
        }
        // Scale so the integer root carries prec + 2 bits.
        let want = 2 * (env.prec() as u64 + 2);
        let k = (want.saturating_sub(m.bits()) / 2 + 1) as u32;
        m <<= 2 * k;
        lsb -= 2 * k as i64;
        let s = num_integer::Roots::sqrt(&m);
        let sticky = &s * &s != m;
        let exp = lsb as i128 / 2 + s.bits() as i128 - 1;
        round_in_env(env, false, s, exp, sticky)
    })
}

/// Correctly rounded `e^x`.
pub fn exp(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x.is_zero() {
            return BigFloat::from(1i64);
        }
        if x.is_infinite() {
            return if x.is_sign_negative() {
                BigFloat::zero(false)
            } else {
                BigFloat::infinity(false)
            };
        }
        if let Some(v) = exp_range_shortcut(x, env) {
            return v;
        }
        ziv(env, |wp| exp_kernel(x, wp))
    })
}

/// Saturate `exp(x)` for arguments whose result is past the exponent
/// wall (so the reduction count always fits an `i64`).
fn exp_range_shortcut(x: &BigFloat, env: &FloatEnv) -> Option<BigFloat> {
    let e = x.exponent()?;
    if e < 62 {
        return None;
    }
    let exp = if x.is_sign_negative() {
        -(EXP_LIMIT as i128) - 8
    } else {
        EXP_LIMIT as i128 + 8
    };
    Some(round_in_env(env, false, BigUint::one(), exp, true))
}

fn exp_kernel(x: &BigFloat, wp: u32) -> (BigFloat, i64) {
    // The reduction count k can reach ~2^62, amplifying any error in
    // ln 2 by as much; the reduction runs with 80 extra bits so the
    // reduced argument keeps full working accuracy. k itself must come
    // from the full-precision quotient: an f64 estimate is off by
    // hundreds of ulps at large |x|, leaving a reduced argument the
    // series cannot absorb.
    let wr = wp + 80;
    let e = scratch(wr);
    let ln2 = ln2_at(wr as u64);
    let k = to_nearest_bigint(&x.div(&ln2, Some(&e)))
        .to_i64()
        .expect("reduction count fits i64 below the exponent wall");
    let r = x.sub(&ln2.mul(&BigFloat::from(k), Some(&e)), Some(&e));
    (exp_series(&r, wp), k)
}

/// Correctly rounded natural logarithm. `log(±0)` is −infinity; negative
/// input is NaN with `invalid`.
pub fn log(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || (x.is_sign_negative() && !x.is_zero()) {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x.is_zero() {
            return BigFloat::infinity(true);
        }
        if x.is_infinite() {
            return BigFloat::infinity(false);
        }
        if x == &BigFloat::from(1i64) {
            return BigFloat::zero(false);
        }
        ziv(env, |wp| (log_kernel(x, wp), 0))
    })
}

/// Correctly rounded `x^y`. A negative base demands an integer exponent;
/// otherwise NaN with `invalid`.
pub fn pow(x: &BigFloat, y: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || y.is_nan() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if y.is_zero() {
            return BigFloat::from(1i64);
        }
        let one = BigFloat::from(1i64);
        if x == &one {
            return one;
        }
        let y_int = y.is_integer();
        let y_odd = y_int && is_odd_integer(y);
        if x.is_zero() {
            let neg = x.is_sign_negative() && y_odd;
            return if y.is_sign_negative() {
                BigFloat::infinity(neg)
            } else {
                BigFloat::zero(neg)
            };
        }
        if x.is_infinite() {
            let neg = x.is_sign_negative() && y_odd;
            return if y.is_sign_negative() {
                BigFloat::zero(neg)
            } else {
                BigFloat::infinity(neg)
            };
        }
        if x.is_sign_negative() && !y_int {
            env.raise_invalid();
            return BigFloat::nan();
        }

        // Integer exponents whose exact power is representable: compute it
        // exactly so exactness (and directed rounding on the boundary) is
        // preserved.
        if y_int {
            if let Some(v) = pow_exact_int(x, y, env) {
                return v;
            }
        } else if let Some(v) = pow_exact_root(x, y, env) {
            // x > 0 here; dyadic exponents with an exact root must not
            // reach the kernel (they would sit on a rounding boundary
            // and raise a phantom `inexact`).
            return v;
        }

        let neg = x.is_sign_negative() && y_odd;
        let ax = x.abs();
        let v = ziv(env, |wp| {
            // y·ln|x| can dwarf the final result's exponent; compute it
            // with 80 extra bits so the exp kernel sees it at full
            // working accuracy.
            let wq = wp + 80;
            let e = scratch(wq);
            let t = y.mul(&log_kernel(&ax, wq), Some(&e));
            // Past ±2^62 the result is unconditionally across the
            // exponent wall (2^62 > 2^62·ln 2); a biased surrogate of 1
            // saturates stably in either direction. This also keeps the
            // exp kernel's reduction count within i64.
            if t.exponent().unwrap_or(i64::MIN) >= 62 {
                let bias = if t.is_sign_negative() {
                    -EXP_LIMIT - 64
                } else {
                    EXP_LIMIT + 64
                };
                (BigFloat::from(1i64), bias)
            } else {
                exp_kernel(&t, wp)
            }
        });
        if neg {
            v.neg()
        } else {
            v
        }
    })
}

fn is_odd_integer(y: &BigFloat) -> bool {
    match y.to_scaled() {
        Some((m, e)) => e == 0 && m.is_odd(),
        None => false,
    }
}

/// Exact integer powering when the result mantissa stays manageable.
/// Returns `None` when the result cannot be exact at any nearby
/// precision, sending the caller to the transcendental path.
fn pow_exact_int(x: &BigFloat, y: &BigFloat, env: &FloatEnv) -> Option<BigFloat> {
    let (my, ey) = y.to_scaled()?;
    // The odd part times 2^ey; ey >= 64 cannot fit an i64 anyway.
    if !(0..64).contains(&ey) {
        return None;
    }
    let yi = (my << ey as u32).to_i64()?;
    let (mx, ex) = x.to_scaled()?;
    let mag = mx.magnitude();
    let neg = x.is_sign_negative() && yi % 2 != 0;
    // Powers of two are exact for any integer exponent.
    if mag.is_one() {
        let exp = ex as i128 * yi as i128;
        return Some(round_in_env(env, neg, BigUint::one(), exp, false));
    }
    let abs_y = yi.unsigned_abs();
    if (mag.bits() - 1).saturating_mul(abs_y) > env.prec() as u64 + 64 {
        return None;
    }
    let powed = Pow::pow(mag, abs_y);
    let lsb = ex as i128 * yi as i128;
    if yi > 0 {
        let exp = lsb + powed.bits() as i128 - 1;
        Some(round_in_env(env, neg, powed, exp, false))
    } else {
        // Reciprocal of an exact odd-mantissa power: one correctly
        // rounded division with an exact sticky.
        let prec = env.prec() as u64;
        let k = (prec + 2 + powed.bits()) as u32;
        let n = BigUint::one() << k;
        let (q, r) = n.div_rem(&powed);
        let sticky = !r.is_zero();
        let exp = -(k as i128) - lsb + q.bits() as i128 - 1;
        Some(round_in_env(env, neg, q, exp, sticky))
    }
}

/// Exact evaluation of `x^(my·2^ey)` for positive `x` and a non-integer
/// dyadic exponent (`ey < 0`): succeeds when `x^my` has an exact
/// `2^(−ey)`-th root, taking the reciprocal through one rounded
/// division for negative `my`. `None` sends the caller to the kernel.
fn pow_exact_root(x: &BigFloat, y: &BigFloat, env: &FloatEnv) -> Option<BigFloat> {
    let (my, ey) = y.to_scaled()?;
    debug_assert!(ey < 0);
    let k = (-ey) as u64;
    let y_neg = my.is_negative();
    let (mx, ex) = x.to_scaled()?;
    let mag = mx.magnitude();

    // Powers of two root exactly iff the exponent divides out; an odd
    // quotient times an odd `my` keeps the result a power of two.
    if mag.is_one() {
        if k > 62 || ex % (1i64 << k) != 0 {
            return None;
        }
        let e_root = (ex >> k) as i128;
        let myi = my.to_i128().unwrap_or(if y_neg { i128::MIN >> 2 } else { i128::MAX >> 2 });
        let exp = e_root.saturating_mul(myi);
        return Some(round_in_env(env, false, BigUint::one(), exp, false));
    }

    // Odd mantissa >= 3: an exact 2^k-th root needs at least 3^(2^k)
    // underneath, so deep roots and huge exponents cannot be exact
    // within anything representable.
    if k > 32 {
        return None;
    }
    let yi = my.magnitude().to_u64()?;
    if (mag.bits() - 1).saturating_mul(yi) > 1 << 20 {
        return None;
    }
    let mut m = Pow::pow(mag, yi);
    let mut lsb = ex as i128 * yi as i128;
    for _ in 0..k {
        // m stays odd, so an odd binary exponent cannot square.
        if lsb.rem_euclid(2) == 1 {
            return None;
        }
        let r = num_integer::Roots::sqrt(&m);
        if &r * &r != m {
            return None;
        }
        m = r;
        lsb /= 2;
    }
    if y_neg {
        let prec = env.prec() as u64;
        let shift = (prec + 2 + m.bits()) as u32;
        let (q, rem) = (BigUint::one() << shift).div_rem(&m);
        let sticky = !rem.is_zero();
        let exp = -(shift as i128) - lsb + q.bits() as i128 - 1;
        Some(round_in_env(env, false, q, exp, sticky))
    } else {
        let exp = lsb + m.bits() as i128 - 1;
        Some(round_in_env(env, false, m, exp, false))
    }
}

/// Quadrant-reduced argument: returns `(r, quadrant)` with
/// `x = n·(π/2) + r`, `|r| ≤ π/4` (and a little slack), `quadrant = n mod 4`.
fn trig_reduce(x: &BigFloat, wp: u32) -> (BigFloat, u8) {
    let extra = x.exponent().unwrap_or(0).max(0) as u32;
    let wpr = wp + extra + 16;
    let e = scratch(wpr);
    let half_pi = mul_pow2(&pi_at(wpr as u64), -1);
    let n = to_nearest_bigint(&x.div(&half_pi, Some(&e)));
    let r = x.sub(&half_pi.mul(&BigFloat::from_bigint(&n), Some(&e)), Some(&e));
    let q = n.mod_floor(&BigInt::from(4)).to_u8().unwrap_or(0);
    (r, q)
}

/// Correctly rounded sine.
pub fn sin(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || x.is_infinite() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x.is_zero() {
            return x.clone();
        }
        ziv(env, |wp| {
            let (r, q) = trig_reduce(x, wp);
            let v = match q {
                0 => sin_series(&r, wp),
                1 => cos_series(&r, wp),
                2 => sin_series(&r, wp).neg(),
                _ => cos_series(&r, wp).neg(),
            };
            (v, 0)
        })
    })
}

/// Correctly rounded cosine.
pub fn cos(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || x.is_infinite() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x.is_zero() {
            return BigFloat::from(1i64);
        }
        ziv(env, |wp| {
            let (r, q) = trig_reduce(x, wp);
            let v = match q {
                0 => cos_series(&r, wp),
                1 => sin_series(&r, wp).neg(),
                2 => cos_series(&r, wp).neg(),
                _ => sin_series(&r, wp),
            };
            (v, 0)
        })
    })
}

/// Correctly rounded tangent.
pub fn tan(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || x.is_infinite() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x.is_zero() {
            return x.clone();
        }
        ziv(env, |wp| {
            let e = scratch(wp);
            let (r, q) = trig_reduce(x, wp);
            let (s, c) = (sin_series(&r, wp), cos_series(&r, wp));
            let v = match q {
                0 | 2 => s.div(&c, Some(&e)),
                _ => c.div(&s, Some(&e)).neg(),
            };
            (v, 0)
        })
    })
}

/// `atan` kernel for finite nonzero `x`, at working precision `wp`.
fn atan_kernel(x: &BigFloat, wp: u32) -> BigFloat {
    let e = scratch(wp);
    let neg = x.is_sign_negative();
    let mut t = x.abs();
    let one = BigFloat::from(1i64);
    // |t| > 1: atan t = π/2 − atan(1/t).
    let flip = t.compare(&one) == Some(std::cmp::Ordering::Greater);
    if flip {
        t = one.div(&t, Some(&e));
    }
    // Halve the angle until the series converges fast:
    // atan t = 2·atan(t / (1 + √(1+t²))).
    let mut halvings = 0u32;
    while t.exponent().unwrap_or(i64::MIN) >= -3 {
        let t2 = t.mul(&t, Some(&e));
        let root = sqrt(&one.add(&t2, Some(&e)), Some(&e));
        t = t.div(&one.add(&root, Some(&e)), Some(&e));
        halvings += 1;
    }
    let mut v = atan_series(&t, wp);
    if halvings > 0 {
        v = mul_pow2(&v, halvings as i64);
    }
    if flip {
        let half_pi = mul_pow2(&pi_at(wp as u64), -1);
        v = half_pi.sub(&v, Some(&e));
    }
    if neg {
        v.neg()
    } else {
        v
    }
}

/// Correctly rounded arctangent.
pub fn atan(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x.is_zero() {
            return x.clone();
        }
        if x.is_infinite() {
            let neg = x.is_sign_negative();
            return ziv(env, |wp| {
                let v = mul_pow2(&pi_at(wp as u64), -1);
                (if neg { v.neg() } else { v }, 0)
            });
        }
        ziv(env, |wp| (atan_kernel(x, wp), 0))
    })
}

/// Correctly rounded two-argument arctangent, `atan2(y, x)`, with the
/// IEEE quadrant and special-value conventions.
pub fn atan2(y: &BigFloat, x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || y.is_nan() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        let yneg = y.is_sign_negative();
        // Multiples of π/4 from the special-value table, as (numerator of
        // π/4 multiples, exact-zero) cases.
        let pi_multiple = |num: i64, den_pow2: i64, neg: bool| {
            ziv(env, |wp| {
                let e = scratch(wp);
                let v = mul_pow2(&pi_at(wp as u64), -den_pow2)
                    .mul(&BigFloat::from(num), Some(&e));
                (if neg { v.neg() } else { v }, 0)
            })
        };
        if y.is_zero() {
            // atan2(±0, x): ±0 for x > 0 (and +0), ±π for x < 0 (and −0).
            return if x.is_sign_negative() {
                pi_multiple(1, 0, yneg)
            } else {
                BigFloat::zero(yneg)
            };
        }
        if x.is_zero() {
            return pi_multiple(1, 1, yneg);
        }
        match (y.is_infinite(), x.is_infinite()) {
            (true, true) => {
                let num = if x.is_sign_negative() { 3 } else { 1 };
                return pi_multiple(num, 2, yneg);
            }
            (true, false) => return pi_multiple(1, 1, yneg),
            (false, true) => {
                return if x.is_sign_negative() {
                    pi_multiple(1, 0, yneg)
                } else {
                    BigFloat::zero(yneg)
                };
            }
            (false, false) => {}
        }
        let xneg = x.is_sign_negative();
        ziv(env, |wp| {
            let e = scratch(wp);
            let base = atan_kernel(&y.abs().div(&x.abs(), Some(&e)), wp);
            let v = if xneg {
                pi_at(wp as u64).sub(&base, Some(&e))
            } else {
                base
            };
            (if yneg { v.neg() } else { v }, 0)
        })
    })
}

/// Correctly rounded arcsine. Outside `[-1, 1]`: NaN with `invalid`.
pub fn asin(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || x.abs() > BigFloat::from(1i64) {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x.is_zero() {
            return x.clone();
        }
        let neg = x.is_sign_negative();
        if x.abs() == BigFloat::from(1i64) {
            return ziv(env, |wp| {
                let v = mul_pow2(&pi_at(wp as u64), -1);
                (if neg { v.neg() } else { v }, 0)
            });
        }
        ziv(env, |wp| (asin_kernel(x, wp), 0))
    })
}

/// `asin x = atan(x / √(1−x²))` for `|x| < 1`.
fn asin_kernel(x: &BigFloat, wp: u32) -> BigFloat {
    let e = scratch(wp);
    let one = BigFloat::from(1i64);
    let root = sqrt(&one.sub(&x.mul(x, Some(&e)), Some(&e)), Some(&e));
    atan_kernel(&x.div(&root, Some(&e)), wp)
}

/// Correctly rounded arccosine. Outside `[-1, 1]`: NaN with `invalid`.
pub fn acos(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || x.abs() > BigFloat::from(1i64) {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if x == &BigFloat::from(1i64) {
            return BigFloat::zero(false);
        }
        ziv(env, |wp| {
            let e = scratch(wp);
            let half_pi = mul_pow2(&pi_at(wp as u64), -1);
            let v = if x.is_zero() {
                half_pi
            } else {
                half_pi.sub(&asin_kernel(x, wp), Some(&e))
            };
            (v, 0)
        })
    })
}

/// Exact rounding of a finite value to an integer grid.
enum IntRound {
    Floor,
    Ceil,
    Trunc,
    HalfAway,
}

fn to_integer(x: &BigFloat, how: IntRound) -> BigFloat {
    if !x.is_finite() || x.is_zero() || x.is_integer() {
        return x.clone();
    }
    let (m, e) = x.to_scaled().expect("finite");
    debug_assert!(e < 0);
    let k = (-e) as u32;
    let den = BigInt::one() << k;
    let q = match how {
        IntRound::Floor => m.div_floor(&den),
        IntRound::Ceil => m.div_ceil(&den),
        IntRound::Trunc => {
            let (q, _) = m.div_rem(&den);
            q
        }
        IntRound::HalfAway => {
            let half = BigInt::one() << (k - 1);
            let adj = if m.is_negative() { m - half } else { m + half };
            let (q, _) = adj.div_rem(&den);
            q
        }
    };
    if q.is_zero() {
        BigFloat::zero(x.is_sign_negative())
    } else {
        BigFloat::from_bigint(&q)
    }
}

/// Largest integer ≤ x, exactly (never raises `inexact`).
pub fn floor(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    let _ = env;
    to_integer(x, IntRound::Floor)
}

/// Smallest integer ≥ x, exactly.
pub fn ceil(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    let _ = env;
    to_integer(x, IntRound::Ceil)
}

/// Integer part of x, exactly.
pub fn trunc(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    let _ = env;
    to_integer(x, IntRound::Trunc)
}

/// Nearest integer, half away from zero, exactly.
pub fn round(x: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    let _ = env;
    to_integer(x, IntRound::HalfAway)
}

/// IEEE truncating remainder: `x − trunc(x/y)·y`, sign of the dividend.
pub fn fmod(x: &BigFloat, y: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || y.is_nan() || x.is_infinite() || y.is_zero() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if y.is_infinite() || x.is_zero() {
            return x.round_into(env);
        }
        let (ma, ea) = x.to_scaled().expect("finite");
        let (mb, eb) = y.to_scaled().expect("finite");
        let e = ea.min(eb);
        let a = ma << (ea - e) as u32;
        let b = mb << (eb - e) as u32;
        let r = a % b; // truncating: sign of the dividend
        scaled_result(env, r, e, x.is_sign_negative())
    })
}

/// IEEE 754 `remainder`: `x − n·y` with `n` the nearest integer quotient,
/// ties to even. Can be negative for positive operands.
pub fn remainder(x: &BigFloat, y: &BigFloat, env: Option<&FloatEnv>) -> BigFloat {
    with_active(env, |env| {
        if x.is_nan() || y.is_nan() || x.is_infinite() || y.is_zero() {
            env.raise_invalid();
            return BigFloat::nan();
        }
        if y.is_infinite() || x.is_zero() {
            return x.round_into(env);
        }
        let (ma, ea) = x.to_scaled().expect("finite");
        let (mb, eb) = y.to_scaled().expect("finite");
        let e = ea.min(eb);
        let a = ma << (ea - e) as u32;
        let b = mb << (eb - e) as u32;
        let (q, mut r) = a.div_rem(&b);
        // Pull the remainder into [−|b|/2, |b|/2], breaking the tie toward
        // an even quotient.
        let twice = r.magnitude() << 1u8;
        let over = twice > *b.magnitude() || (twice == *b.magnitude() && q.is_odd());
        if over {
            if r.is_negative() == b.is_negative() {
                r -= &b;
            } else {
                r += &b;
            }
        }
        scaled_result(env, r, e, x.is_sign_negative())
    })
}

/// Round `r·2^e` into the environment; an exact zero keeps `zero_neg`.
fn scaled_result(env: &FloatEnv, r: BigInt, e: i64, zero_neg: bool) -> BigFloat {
    if r.is_zero() {
        return BigFloat::zero(zero_neg);
    }
    let neg = r.is_negative();
    let mag = r.magnitude().clone();
    let exp = e as i128 + mag.bits() as i128 - 1;
    round_in_env(env, neg, mag, exp, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse;

    fn env128() -> FloatEnv {
        FloatEnv::with_prec(128).unwrap()
    }

    fn f(v: f64) -> BigFloat {
        BigFloat::from_f64(v)
    }

    /// Parse a reference literal at the given precision.
    fn lit(s: &str, prec: u32) -> BigFloat {
        let env = FloatEnv::with_prec(prec).unwrap();
        parse(s, 10, Some(&env)).unwrap()
    }

    #[test]
    fn test_sqrt_exact() {
        let env = env128();
        assert_eq!(sqrt(&f(4.0), Some(&env)), f(2.0));
        assert_eq!(sqrt(&f(2.25), Some(&env)), f(1.5));
        assert!(!env.inexact());
    }

    #[test]
    fn test_sqrt_two_at_128() {
        let env = env128();
        let r = sqrt(&f(2.0), Some(&env));
        let expected = parse("0x1.6a09e667f3bcc908b2fb1366ea957d3e", 0, Some(&env128())).unwrap();
        assert_eq!(r, expected);
        assert!(env.inexact());
    }

    #[test]
    fn test_sqrt_domain() {
        let env = env128();
        assert!(sqrt(&f(-1.0), Some(&env)).is_nan());
        assert!(env.invalid());
        let z = sqrt(&f(-0.0), Some(&env));
        assert!(z.is_zero() && z.is_sign_negative());
        assert!(sqrt(&BigFloat::infinity(false), Some(&env)).is_infinite());
    }

    #[test]
    fn test_exp_log_reference_values() {
        let p = crate::env::PREC_DEFAULT;
        let env = FloatEnv::with_prec(p).unwrap();
        assert_eq!(exp(&f(0.0), Some(&env)), f(1.0));
        assert!(!env.inexact());
        assert_eq!(
            exp(&lit("0.2", p), Some(&env)),
            lit("1.2214027581601698339210719946396742", p)
        );
        assert_eq!(
            log(&f(3.0), Some(&env)),
            lit("1.0986122886681096913952452369225256", p)
        );
        assert!(log(&f(-1.0), Some(&env)).is_nan());
        assert!(log(&f(0.0), Some(&env)).is_infinite());
        assert!(log(&f(0.0), Some(&env)).is_sign_negative());
        assert_eq!(log(&f(1.0), Some(&env)), f(0.0));
    }

    #[test]
    fn test_exp_log_inverse() {
        let env = FloatEnv::with_prec(64).unwrap();
        let x = lit("1.5", 64);
        let roundtrip = log(&exp(&x, Some(&env)), Some(&env));
        // One rounding each way: equal to within the last couple of bits.
        let diff = roundtrip.sub(&x, Some(&env)).abs();
        assert!(diff < lit("1e-17", 64));
    }

    #[test]
    fn test_pow_reference_value() {
        let p = crate::env::PREC_DEFAULT;
        let env = FloatEnv::with_prec(p).unwrap();
        assert_eq!(
            pow(&lit("2.1", p), &lit("1.6", p), Some(&env)),
            lit("3.277561666451861947162828744873745", p)
        );
    }

    #[test]
    fn test_pow_exact_cases() {
        let env = env128();
        assert_eq!(pow(&f(2.0), &f(10.0), Some(&env)), f(1024.0));
        assert_eq!(pow(&f(1.5), &f(2.0), Some(&env)), f(2.25));
        assert_eq!(pow(&f(2.0), &f(-2.0), Some(&env)), f(0.25));
        assert!(!env.inexact());
        assert_eq!(pow(&f(-2.0), &f(3.0), Some(&env)), f(-8.0));
    }

    #[test]
    fn test_pow_exact_roots() {
        let env = env128();
        assert_eq!(pow(&f(4.0), &f(0.5), Some(&env)), f(2.0));
        assert_eq!(pow(&f(9.0), &f(0.5), Some(&env)), f(3.0));
        assert_eq!(pow(&f(6.25), &f(0.5), Some(&env)), f(2.5));
        assert_eq!(pow(&f(4.0), &f(-0.5), Some(&env)), f(0.5));
        assert_eq!(pow(&f(9.0), &f(1.5), Some(&env)), f(27.0));
        assert!(!env.inexact());
        // Irrational result still takes the kernel and flags.
        let r = pow(&f(2.0), &f(0.5), Some(&env));
        assert!(r > f(1.41) && r < f(1.42));
        assert!(env.inexact());
    }

    #[test]
    fn test_exp_huge_argument_inverse() {
        // Argument reduction must stay exact out to the exponent wall.
        let env = env128();
        let x = lit("1.234567", 128).mul(&BigFloat::from(1i64 << 60), Some(&env));
        let p = exp(&x, Some(&env)).mul(&exp(&x.neg(), Some(&env)), Some(&env));
        let diff = p.sub(&f(1.0), Some(&env)).abs();
        assert!(diff < lit("1e-30", 128));
    }

    #[test]
    fn test_pow_domain() {
        let env = env128();
        assert!(pow(&f(-2.0), &f(0.5), Some(&env)).is_nan());
        assert!(env.invalid());
        assert_eq!(pow(&f(7.0), &f(0.0), Some(&env)), f(1.0));
    }

    #[test]
    fn test_trig_reference_values() {
        let p = crate::env::PREC_DEFAULT;
        let env = FloatEnv::with_prec(p).unwrap();
        assert_eq!(
            sin(&f(-1.0), Some(&env)),
            lit("-0.841470984807896506652502321630299", p)
        );
        assert_eq!(
            cos(&f(1.0), Some(&env)),
            lit("0.5403023058681397174009366074429766", p)
        );
        assert_eq!(
            tan(&lit("0.1", p), Some(&env)),
            lit("0.10033467208545054505808004578111154", p)
        );
    }

    #[test]
    fn test_inverse_trig_reference_values() {
        let p = crate::env::PREC_DEFAULT;
        let env = FloatEnv::with_prec(p).unwrap();
        assert_eq!(
            asin(&lit("0.3", p), Some(&env)),
            lit("0.30469265401539750797200296122752915", p)
        );
        assert_eq!(
            acos(&lit("0.4", p), Some(&env)),
            lit("1.1592794807274085998465837940224159", p)
        );
        assert_eq!(
            atan(&lit("0.7", p), Some(&env)),
            lit("0.610725964389208616543758876490236", p)
        );
        assert_eq!(
            atan2(&lit("7.1", p), &lit("-5.1", p), Some(&env)),
            lit("2.1937053809751415549388104628759813", p)
        );
    }

    #[test]
    fn test_inverse_trig_domain() {
        let env = env128();
        assert!(asin(&f(1.5), Some(&env)).is_nan());
        assert!(acos(&f(-1.5), Some(&env)).is_nan());
        assert!(env.invalid());
        assert_eq!(acos(&f(1.0), Some(&env)), f(0.0));
        assert!(asin(&f(0.0), Some(&env)).is_zero());
    }

    #[test]
    fn test_atan2_special_values() {
        let env = env128();
        let z = atan2(&f(0.0), &f(3.0), Some(&env));
        assert!(z.is_zero() && z.is_sign_positive());
        let z = atan2(&f(-0.0), &f(3.0), Some(&env));
        assert!(z.is_zero() && z.is_sign_negative());
        // atan2(0, -x) = π.
        let pi_ref = mul_pow2(&atan(&f(1.0), Some(&env)), 2);
        let v = atan2(&f(0.0), &f(-3.0), Some(&env));
        let diff = v.sub(&pi_ref, Some(&env)).abs();
        assert!(diff < f(1e-30));
    }

    #[test]
    fn test_integer_rounding_exact() {
        let env = FloatEnv::with_prec(4).unwrap();
        assert_eq!(floor(&f(2.5), Some(&env)), f(2.0));
        assert_eq!(ceil(&f(2.5), Some(&env)), f(3.0));
        assert_eq!(trunc(&f(-2.5), Some(&env)), f(-2.0));
        assert_eq!(round(&f(2.5), Some(&env)), f(3.0));
        assert_eq!(round(&f(-2.5), Some(&env)), f(-3.0));
        assert_eq!(floor(&f(-0.5), Some(&env)), f(-1.0));
        let z = trunc(&f(-0.5), Some(&env));
        assert!(z.is_zero() && z.is_sign_negative());
        // Exact even at tiny precision; no flag.
        assert!(!env.inexact());
        // Large values pass through untouched.
        assert_eq!(floor(&f(1e300), Some(&env)), f(1e300));
    }

    #[test]
    fn test_fmod_remainder() {
        let env = env128();
        assert_eq!(fmod(&f(3.0), &f(2.0), Some(&env)), f(1.0));
        assert_eq!(remainder(&f(3.0), &f(2.0), Some(&env)), f(-1.0));
        assert_eq!(fmod(&f(-3.0), &f(2.0), Some(&env)), f(-1.0));
        assert_eq!(fmod(&f(5.25), &f(1.5), Some(&env)), f(0.75));
        // Not a tie: q=1 gives 0.5, which is closer than q=2's -1.5.
        assert_eq!(remainder(&f(2.5), &f(2.0), Some(&env)), f(0.5));
        // True tie: q=1 gives 1, q=2 gives -1; the even quotient wins.
        assert_eq!(remainder(&f(3.0), &f(2.0), Some(&env)), f(-1.0));
        let z = fmod(&f(-0.0), &f(2.0), Some(&env));
        assert!(z.is_zero() && z.is_sign_negative());
        assert!(fmod(&f(1.0), &f(0.0), Some(&env)).is_nan());
    }

    #[test]
    fn test_huge_argument_reduction() {
        // sin(2^40) still correctly rounded: compare against itself at
        // higher precision rounded down.
        let hi = FloatEnv::with_prec(160).unwrap();
        let lo = FloatEnv::with_prec(64).unwrap();
        let x = f(2f64.powi(40));
        let full = sin(&x, Some(&hi));
        let narrow = sin(&x, Some(&lo));
        assert_eq!(narrow, full.round_into(&lo));
    }

    #[test]
    fn test_exp_overflow_saturates() {
        let env = FloatEnv::with_prec(16).unwrap();
        let big = mul_pow2(&f(1.0), 70); // 2^70
        let r = exp(&big, Some(&env));
        assert!(r.is_infinite());
        assert!(env.overflow());
        let r = exp(&big.neg(), Some(&env));
        assert!(r.is_zero());
        assert!(env.underflow());
    }
}
