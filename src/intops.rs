//! Extended integer division conventions and integer square root.
//!
//! Four quotient conventions over arbitrary-precision integers, each with a
//! divide-with-remainder variant satisfying `a == b*q + r` exactly:
//!
//! | convention | quotient rounds | remainder sign          |
//! |------------|-----------------|-------------------------|
//! | `tdiv`     | toward zero     | sign of `a`             |
//! | `fdiv`     | toward −∞       | sign of `b`             |
//! | `cdiv`     | toward +∞       | opposite sign of `b`    |
//! | `ediv`     | Euclidean       | always `0 <= r < |b|`   |
//!
//! Plus `floor_log2` (with the `-1`-for-nonpositive convention) and
//! `isqrt`/`isqrt_rem`.

use num_bigint::BigInt;
use num_integer::{Integer, Roots};
use num_traits::{Signed, Zero};

use crate::error::Error;

fn check_divisor(b: &BigInt) -> Result<(), Error> {
    if b.is_zero() {
        Err(Error::DivisionByZero)
    } else {
        Ok(())
    }
}

/// Truncating division: quotient rounded toward zero.
pub fn tdiv(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
    check_divisor(b)?;
    Ok(a / b)
}

/// Truncating division with remainder. The remainder has the sign of `a`.
pub fn tdivrem(a: &BigInt, b: &BigInt) -> Result<(BigInt, BigInt), Error> {
    check_divisor(b)?;
    Ok(a.div_rem(b))
}

/// Flooring division: quotient rounded toward negative infinity.
pub fn fdiv(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
    check_divisor(b)?;
    Ok(a.div_floor(b))
}

/// Flooring division with remainder. The remainder has the sign of `b`.
pub fn fdivrem(a: &BigInt, b: &BigInt) -> Result<(BigInt, BigInt), Error> {
    check_divisor(b)?;
    Ok(a.div_mod_floor(b))
}

/// Ceiling division: quotient rounded toward positive infinity.
pub fn cdiv(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
    cdivrem(a, b).map(|(q, _)| q)
}

/// Ceiling division with remainder. The remainder has the sign opposite `b`.
pub fn cdivrem(a: &BigInt, b: &BigInt) -> Result<(BigInt, BigInt), Error> {
    check_divisor(b)?;
    let (mut q, mut r) = a.div_rem(b);
    // Truncation already equals the ceiling unless the exact quotient is
    // positive and has a fractional part.
    if !r.is_zero() && (a.is_negative() == b.is_negative()) {
        q += 1;
        r -= b;
    }
    Ok((q, r))
}

/// Euclidean division: the unique quotient giving `0 <= r < |b|`.
pub fn ediv(a: &BigInt, b: &BigInt) -> Result<BigInt, Error> {
    edivrem(a, b).map(|(q, _)| q)
}

/// Euclidean division with remainder. The remainder is always non-negative
/// and strictly less than `|b|`.
pub fn edivrem(a: &BigInt, b: &BigInt) -> Result<(BigInt, BigInt), Error> {
    check_divisor(b)?;
    let (mut q, mut r) = a.div_rem(b);
    if r.is_negative() {
        if b.is_negative() {
            q += 1;
            r -= b;
        } else {
            q -= 1;
            r += b;
        }
    }
    Ok((q, r))
}

/// `⌊log2(n)⌋` for positive `n`; `-1` for zero or negative input (the zero
/// case folds into the same conventional value).
pub fn floor_log2(n: &BigInt) -> i64 {
    if n.is_positive() {
        n.bits() as i64 - 1
    } else {
        -1
    }
}

/// Integer square root `⌊√n⌋`. Negative input is a domain error.
pub fn isqrt(n: &BigInt) -> Result<BigInt, Error> {
    if n.is_negative() {
        return Err(Error::InvalidOperation("square root of negative integer"));
    }
    Ok(n.sqrt())
}

/// Integer square root with remainder: `(s, n - s*s)` where `s = ⌊√n⌋`.
pub fn isqrt_rem(n: &BigInt) -> Result<(BigInt, BigInt), Error> {
    let s = isqrt(n)?;
    let r = n - &s * &s;
    Ok((s, r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bi(v: i64) -> BigInt {
        BigInt::from(v)
    }

    type DivRemFn = fn(&BigInt, &BigInt) -> Result<(BigInt, BigInt), Error>;

    /// Check one convention against the expected quotients for
    /// (a,b), (-a,b), (a,-b), (-a,-b), and verify the division identity.
    fn check_idiv(f: DivRemFn, a: i64, b: i64, expected_q: [i64; 4]) {
        let cases = [(a, b), (-a, b), (a, -b), (-a, -b)];
        for (i, &(x, y)) in cases.iter().enumerate() {
            let (q, r) = f(&bi(x), &bi(y)).unwrap();
            assert_eq!(q, bi(expected_q[i]), "quotient for {x}/{y}");
            assert_eq!(bi(x), bi(y) * &q + &r, "identity for {x}/{y}");
        }
    }

    #[test]
    fn test_division_conventions() {
        check_idiv(tdivrem, 3, 2, [1, -1, -1, 1]);
        check_idiv(fdivrem, 3, 2, [1, -2, -2, 1]);
        check_idiv(cdivrem, 3, 2, [2, -1, -1, 2]);
        check_idiv(edivrem, 3, 2, [1, -2, -1, 2]);
    }

    #[test]
    fn test_exact_division_all_conventions_agree() {
        for f in [tdivrem, fdivrem, cdivrem, edivrem] {
            let (q, r) = f(&bi(-6), &bi(2)).unwrap();
            assert_eq!(q, bi(-3));
            assert_eq!(r, bi(0));
        }
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(tdiv(&bi(1), &bi(0)), Err(Error::DivisionByZero));
        assert_eq!(edivrem(&bi(1), &bi(0)), Err(Error::DivisionByZero));
    }

    #[test]
    fn test_floor_log2() {
        assert_eq!(floor_log2(&bi(0)), -1);
        assert_eq!(floor_log2(&bi(-5)), -1);
        assert_eq!(floor_log2(&bi(1)), 0);
        assert_eq!(floor_log2(&bi(7)), 2);
        assert_eq!(floor_log2(&bi(8)), 3);
        let big = BigInt::from(1u8) << 300;
        assert_eq!(floor_log2(&big), 300);
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(&bi(0)).unwrap(), bi(0));
        assert_eq!(isqrt(&bi(15)).unwrap(), bi(3));
        assert_eq!(isqrt(&bi(16)).unwrap(), bi(4));
        assert!(isqrt(&bi(-1)).is_err());

        // 0xffffffc000000000000000 from the reference vectors
        let n: BigInt = "309485005209659050297393152".parse().unwrap();
        let (s, r) = isqrt_rem(&n).unwrap();
        assert_eq!(s, bi(17592185913343));
        assert_eq!(r, bi(35167191957503));
        assert_eq!(&s * &s + &r, n);
    }

    proptest! {
        #[test]
        fn prop_division_identity(a in any::<i128>(), b in any::<i128>().prop_filter("nonzero", |b| *b != 0)) {
            let (a, b) = (BigInt::from(a), BigInt::from(b));
            for f in [tdivrem, fdivrem, cdivrem, edivrem] {
                let (q, r) = f(&a, &b).unwrap();
                prop_assert_eq!(&a, &(&b * &q + &r));
                prop_assert!(r.magnitude() < b.magnitude());
            }
        }

        #[test]
        fn prop_remainder_signs(a in any::<i128>(), b in any::<i128>().prop_filter("nonzero", |b| *b != 0)) {
            let (a, b) = (BigInt::from(a), BigInt::from(b));
            let (_, r) = tdivrem(&a, &b).unwrap();
            prop_assert!(r.is_zero() || r.is_negative() == a.is_negative());
            let (_, r) = fdivrem(&a, &b).unwrap();
            prop_assert!(r.is_zero() || r.is_negative() == b.is_negative());
            let (_, r) = cdivrem(&a, &b).unwrap();
            prop_assert!(r.is_zero() || r.is_negative() != b.is_negative());
            let (_, r) = edivrem(&a, &b).unwrap();
            prop_assert!(!r.is_negative());
        }

        #[test]
        fn prop_isqrt_bounds(n in any::<u128>()) {
            let n = BigInt::from(n);
            let s = isqrt(&n).unwrap();
            prop_assert!(&s * &s <= n);
            prop_assert!((&s + 1) * (&s + 1) > n);
        }
    }
}
