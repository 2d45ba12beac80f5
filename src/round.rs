//! The one rounding primitive behind every BigFloat operation.
//!
//! Arithmetic produces an exact (or exact-plus-sticky) magnitude as a big
//! integer mantissa with the binary exponent of its leading bit;
//! [`round_value`] reduces that to the target precision in a single step,
//! reporting the sticky flags the operation must accumulate. Keeping the
//! final rounding in one place is what makes the "rounded exactly once"
//! contract auditable: no caller ever rounds twice.
//!
//! The sticky bit stands for a nonzero discarded tail strictly below the
//! mantissa's least significant bit. Division, square root, and the
//! function library use it to avoid materializing unbounded exact
//! results.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::env::{FloatEnv, RoundingMode, Status, EXP_LIMIT};
use crate::float::BigFloat;

/// Round a finite nonzero magnitude to `prec` bits under `mode`.
///
/// `exp` is the exponent of the mantissa's most significant bit, so the
/// value is `±mant × 2^(exp − bits(mant) + 1)`. It is an `i128` because
/// intermediate exponents (for example the sum of two saturated `i64`
/// exponents in a product) may not fit `i64`; the result saturates at
/// [`EXP_LIMIT`] with the overflow/underflow flags.
pub(crate) fn round_value(
    neg: bool,
    mut mant: BigUint,
    mut exp: i128,
    sticky: bool,
    prec: u32,
    mode: RoundingMode,
) -> (BigFloat, Status) {
    debug_assert!(!mant.is_zero());
    let mut status = Status::default();

    let bits = mant.bits() as u32;
    if !sticky && bits <= prec {
        // Exact: store the canonical minimal mantissa.
        let trailing = mant.trailing_zeros().unwrap_or(0);
        if trailing > 0 {
            mant >>= trailing;
        }
        return saturate(neg, mant, exp, prec, mode, status);
    }

    // Widen short-but-sticky mantissas so the increment lands on the ulp
    // of the target grid.
    if bits < prec {
        mant <<= prec - bits;
    }
    let shift = mant.bits() as u32 - prec;

    let (mut kept, discarded) = if shift > 0 {
        let kept = &mant >> shift;
        let discarded = mant - (&kept << shift);
        (kept, discarded)
    } else {
        (mant, BigUint::zero())
    };

    status.inexact = sticky || !discarded.is_zero();
    if !status.inexact {
        let trailing = kept.trailing_zeros().unwrap_or(0);
        if trailing > 0 {
            kept >>= trailing;
        }
        return saturate(neg, kept, exp, prec, mode, status);
    }

    if mode == RoundingMode::ToOdd {
        kept |= BigUint::from(1u8);
    } else {
        // Compare the discarded tail against half an ulp; the sticky bit
        // breaks an exact tie upward without changing any other case.
        let half = if shift > 0 {
            let h = BigUint::from(1u8) << (shift - 1);
            let mut c = discarded.cmp(&h);
            if c == std::cmp::Ordering::Equal && sticky {
                c = std::cmp::Ordering::Greater;
            }
            c
        } else {
            std::cmp::Ordering::Less
        };
        let lsb_odd = kept.bit(0);
        if mode.round_away(neg, lsb_odd, half) {
            kept += 1u8;
            if kept.bits() as u32 > prec {
                kept >>= 1;
                exp += 1;
            }
        }
    }

    saturate(neg, kept, exp, prec, mode, status)
}

/// Clamp the exponent into the representable range, producing the
/// overflow/underflow sentinels the mode calls for.
fn saturate(
    neg: bool,
    mant: BigUint,
    exp: i128,
    prec: u32,
    mode: RoundingMode,
    mut status: Status,
) -> (BigFloat, Status) {
    if exp > EXP_LIMIT as i128 {
        status.overflow = true;
        status.inexact = true;
        let towards_zero = matches!(
            (mode, neg),
            (RoundingMode::ToZero, _)
                | (RoundingMode::TowardNegative, false)
                | (RoundingMode::TowardPositive, true)
        );
        let value = if towards_zero {
            // Largest finite value at this precision.
            let ones = (BigUint::from(1u8) << prec) - 1u8;
            BigFloat::from_raw(neg, ones, EXP_LIMIT)
        } else {
            BigFloat::infinity(neg)
        };
        return (value, status);
    }
    if exp < -(EXP_LIMIT as i128) {
        status.underflow = true;
        status.inexact = true;
        let away = matches!(
            (mode, neg),
            (RoundingMode::AwayFromZero, _)
                | (RoundingMode::TowardPositive, false)
                | (RoundingMode::TowardNegative, true)
        );
        let value = if away {
            BigFloat::from_raw(neg, BigUint::from(1u8), -EXP_LIMIT)
        } else {
            BigFloat::zero(neg)
        };
        return (value, status);
    }
    (BigFloat::from_raw(neg, mant, exp as i64), status)
}

/// Round into an environment: one rounding step plus sticky flag
/// accumulation on `env`.
pub(crate) fn round_in_env(
    env: &FloatEnv,
    neg: bool,
    mant: BigUint,
    exp: i128,
    sticky: bool,
) -> BigFloat {
    let (value, status) = round_value(neg, mant, exp, sticky, env.prec(), env.mode());
    env.raise(|s| s.merge(status));
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    fn round_u64(m: u64, prec: u32, mode: RoundingMode) -> (u64, i64, bool) {
        let mant = BigUint::from(m);
        let exp = mant.bits() as i128 - 1;
        let (v, st) = round_value(false, mant, exp, false, prec, mode);
        let (mant, exp) = v.finite_parts().unwrap();
        (mant.to_u64().unwrap(), exp, st.inexact)
    }

    #[test]
    fn test_exact_fits() {
        // 0b1010 at 8 bits: exact, canonical form drops the trailing zero.
        let (m, e, inexact) = round_u64(0b1010, 8, RoundingMode::NearestEven);
        assert_eq!((m, e), (0b101, 3));
        assert!(!inexact);
    }

    #[test]
    fn test_nearest_even_tie() {
        // 0b1011 to 3 bits: discarded 1 is exactly half, kept lsb odd → up.
        let (m, e, inexact) = round_u64(0b1011, 3, RoundingMode::NearestEven);
        assert_eq!((m, e), (0b110, 3));
        assert!(inexact);
        // 0b1001 to 3 bits: tie, kept lsb even → down.
        let (m, e, _) = round_u64(0b1001, 3, RoundingMode::NearestEven);
        assert_eq!((m, e), (0b100, 3));
    }

    #[test]
    fn test_carry_propagation() {
        // All ones rounds up to a power of two one exponent higher.
        let (m, e, _) = round_u64(0b1111, 3, RoundingMode::NearestAway);
        assert_eq!((m, e), (0b100, 4));
    }

    #[test]
    fn test_directed_modes() {
        let (m, _, _) = round_u64(0b10001, 4, RoundingMode::ToZero);
        assert_eq!(m, 0b1000);
        let (m, _, _) = round_u64(0b10001, 4, RoundingMode::AwayFromZero);
        assert_eq!(m, 0b1001);
        // Negative value, toward positive infinity: truncate.
        let mant = BigUint::from(0b10001u32);
        let (v, _) = round_value(true, mant, 4, false, 4, RoundingMode::TowardPositive);
        let (m, _) = v.finite_parts().unwrap();
        assert_eq!(m.to_u64().unwrap(), 0b1000);
    }

    #[test]
    fn test_to_odd_jams() {
        let (m, _, inexact) = round_u64(0b10001, 4, RoundingMode::ToOdd);
        assert_eq!(m, 0b1001);
        assert!(inexact);
        // Already-odd kept bits stay put.
        let (m, _, _) = round_u64(0b10011, 4, RoundingMode::ToOdd);
        assert_eq!(m, 0b1001);
    }

    #[test]
    fn test_sticky_breaks_tie() {
        // Tie pattern with even kept lsb stays down without sticky...
        let (v, _) = round_value(false, BigUint::from(0b1001u8), 3, false, 3, RoundingMode::NearestEven);
        assert_eq!(v.finite_parts().unwrap().0.to_u64().unwrap(), 0b100);
        // ...but goes up once the sticky bit marks the tail as larger.
        let (v, _) = round_value(false, BigUint::from(0b1001u8), 3, true, 3, RoundingMode::NearestEven);
        assert_eq!(v.finite_parts().unwrap().0.to_u64().unwrap(), 0b101);
    }

    #[test]
    fn test_overflow_saturation() {
        let (v, st) = round_value(
            false,
            BigUint::from(1u8),
            EXP_LIMIT as i128 + 1,
            false,
            8,
            RoundingMode::NearestEven,
        );
        assert!(st.overflow && st.inexact);
        assert!(v.is_infinite() && v.is_sign_positive());

        let (v, st) = round_value(
            false,
            BigUint::from(1u8),
            EXP_LIMIT as i128 + 1,
            false,
            8,
            RoundingMode::ToZero,
        );
        assert!(st.overflow);
        assert!(v.is_finite());
    }

    #[test]
    fn test_underflow_saturation() {
        let (v, st) = round_value(
            true,
            BigUint::from(1u8),
            -(EXP_LIMIT as i128) - 1,
            false,
            8,
            RoundingMode::NearestEven,
        );
        assert!(st.underflow);
        assert!(v.is_zero() && !v.is_sign_positive());
    }
}
