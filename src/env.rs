//! Rounding modes, sticky status flags, and the binary rounding environment.
//!
//! Every BigFloat operation is parameterized by a [`FloatEnv`]: a target
//! precision in bits plus a rounding mode, carrying four sticky status
//! flags (inexact, overflow, underflow, invalid) that accumulate across
//! operations and are only reset by [`FloatEnv::clear_flags`].
//!
//! Operations accept `Option<&FloatEnv>`; `None` selects a thread-local
//! ambient environment (113-bit nearest-even by default). The ambient can
//! be replaced for the dynamic extent of a closure with [`with_env`] /
//! [`with_precision`]; the previous ambient is restored by a drop guard,
//! so it survives early returns and panics inside the closure.
//!
//! The override stack is genuinely thread-local state, never a process
//! global: two threads cannot race on each other's precision or flags.
//! `FloatEnv` itself uses a `Cell` for the flags, making it `!Sync`, so
//! the compiler rules out sharing one environment across concurrent
//! call graphs.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;

use crate::error::Error;

/// Smallest usable mantissa precision, in bits.
pub const PREC_MIN: u32 = 2;

/// Default ambient precision: the IEEE binary128 significand width.
pub const PREC_DEFAULT: u32 = 113;

/// Exponent saturation ceiling. Exponents live in `i64`; a rounded result
/// whose leading-bit exponent leaves `[-EXP_LIMIT, EXP_LIMIT]` overflows
/// (or underflows) instead of wrapping.
pub const EXP_LIMIT: i64 = 1 << 62;

/// How an inexact result is moved to a representable neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundingMode {
    /// To nearest, ties to the even last digit (IEEE default).
    NearestEven,
    /// To nearest, ties away from zero.
    NearestAway,
    /// Toward zero (truncate).
    ToZero,
    /// Away from zero.
    AwayFromZero,
    /// Toward positive infinity.
    TowardPositive,
    /// Toward negative infinity.
    TowardNegative,
    /// Jam a 1 into the last digit if anything was discarded. Results
    /// rounded to odd at `p + 2` bits can be re-rounded to `p` bits in any
    /// other mode without a double-rounding error, which is what the
    /// function library relies on.
    ToOdd,
}

impl RoundingMode {
    /// Parse a decimal-context alias (`"half-even"`, `"down"`, ...), the
    /// names the decimal side of the crate exposes.
    pub fn from_alias(name: &str) -> Option<RoundingMode> {
        Some(match name {
            "half-even" => RoundingMode::NearestEven,
            "half-up" => RoundingMode::NearestAway,
            "down" => RoundingMode::ToZero,
            "up" => RoundingMode::AwayFromZero,
            "ceiling" => RoundingMode::TowardPositive,
            "floor" => RoundingMode::TowardNegative,
            _ => return None,
        })
    }

    /// The decimal-context alias for this mode, where one exists.
    pub fn alias(self) -> Option<&'static str> {
        Some(match self {
            RoundingMode::NearestEven => "half-even",
            RoundingMode::NearestAway => "half-up",
            RoundingMode::ToZero => "down",
            RoundingMode::AwayFromZero => "up",
            RoundingMode::TowardPositive => "ceiling",
            RoundingMode::TowardNegative => "floor",
            RoundingMode::ToOdd => return None,
        })
    }

    /// Decide whether a truncated magnitude must be bumped one ulp away
    /// from zero. The discarded part is known to be nonzero; `half` is its
    /// comparison against half an ulp, `lsb_odd` the parity of the kept
    /// last digit, `negative` the sign of the value being rounded.
    ///
    /// `ToOdd` never increments; its jamming step is applied by the caller.
    pub(crate) fn round_away(self, negative: bool, lsb_odd: bool, half: Ordering) -> bool {
        match self {
            RoundingMode::NearestEven => half == Ordering::Greater || (half == Ordering::Equal && lsb_odd),
            RoundingMode::NearestAway => half != Ordering::Less,
            RoundingMode::ToZero => false,
            RoundingMode::AwayFromZero => true,
            RoundingMode::TowardPositive => !negative,
            RoundingMode::TowardNegative => negative,
            RoundingMode::ToOdd => false,
        }
    }
}

/// Sticky status flags, OR-accumulated by every operation that uses an
/// environment and never reset implicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub inexact: bool,
    pub overflow: bool,
    pub underflow: bool,
    pub invalid: bool,
}

impl Status {
    pub(crate) fn merge(&mut self, other: Status) {
        self.inexact |= other.inexact;
        self.overflow |= other.overflow;
        self.underflow |= other.underflow;
        self.invalid |= other.invalid;
    }
}

/// A binary rounding environment: target precision, rounding mode, and the
/// sticky flag word.
///
/// Caller-owned; passed by shared reference into operations, which update
/// the flags through interior mutability. Not `Sync` by construction.
#[derive(Debug)]
pub struct FloatEnv {
    prec: u32,
    mode: RoundingMode,
    flags: Cell<Status>,
}

impl Clone for FloatEnv {
    fn clone(&self) -> Self {
        FloatEnv {
            prec: self.prec,
            mode: self.mode,
            flags: Cell::new(self.flags.get()),
        }
    }
}

impl Default for FloatEnv {
    fn default() -> Self {
        FloatEnv {
            prec: PREC_DEFAULT,
            mode: RoundingMode::NearestEven,
            flags: Cell::new(Status::default()),
        }
    }
}

impl FloatEnv {
    /// Create an environment. Precision below [`PREC_MIN`] is rejected.
    pub fn new(prec: u32, mode: RoundingMode) -> Result<FloatEnv, Error> {
        if prec < PREC_MIN {
            return Err(Error::InvalidConfiguration("precision must be at least 2 bits"));
        }
        Ok(FloatEnv {
            prec,
            mode,
            flags: Cell::new(Status::default()),
        })
    }

    /// Environment with the given precision and the default nearest-even
    /// mode.
    pub fn with_prec(prec: u32) -> Result<FloatEnv, Error> {
        FloatEnv::new(prec, RoundingMode::NearestEven)
    }

    /// Scratch environment for internal widened-precision computation.
    /// Its flags are discarded; only the final rounding touches the
    /// caller's environment.
    pub(crate) fn scratch(prec: u32, mode: RoundingMode) -> FloatEnv {
        FloatEnv {
            prec: prec.max(PREC_MIN),
            mode,
            flags: Cell::new(Status::default()),
        }
    }

    pub fn prec(&self) -> u32 {
        self.prec
    }

    pub fn mode(&self) -> RoundingMode {
        self.mode
    }

    /// Snapshot of the sticky flags.
    pub fn status(&self) -> Status {
        self.flags.get()
    }

    pub fn inexact(&self) -> bool {
        self.flags.get().inexact
    }

    pub fn overflow(&self) -> bool {
        self.flags.get().overflow
    }

    pub fn underflow(&self) -> bool {
        self.flags.get().underflow
    }

    pub fn invalid(&self) -> bool {
        self.flags.get().invalid
    }

    /// Reset all sticky flags. The only way flags ever go back to false.
    pub fn clear_flags(&self) {
        self.flags.set(Status::default());
    }

    pub(crate) fn raise(&self, update: impl FnOnce(&mut Status)) {
        let mut s = self.flags.get();
        update(&mut s);
        self.flags.set(s);
    }

    pub(crate) fn raise_inexact(&self) {
        self.raise(|s| s.inexact = true);
    }

    pub(crate) fn raise_invalid(&self) {
        self.raise(|s| s.invalid = true);
    }
}

thread_local! {
    static AMBIENT: RefCell<FloatEnv> = RefCell::new(FloatEnv::default());
}

/// Run `f` with the explicit environment, or with the thread-local ambient
/// when none is given. Flag updates made by `f` land on whichever
/// environment was selected.
pub(crate) fn with_active<T>(env: Option<&FloatEnv>, f: impl FnOnce(&FloatEnv) -> T) -> T {
    match env {
        Some(e) => f(e),
        None => AMBIENT.with(|a| f(&a.borrow())),
    }
}

/// Inspect the current thread-local ambient environment (for example to
/// read flags accumulated by operations that ran without an explicit
/// environment).
pub fn ambient<T>(f: impl FnOnce(&FloatEnv) -> T) -> T {
    AMBIENT.with(|a| f(&a.borrow()))
}

/// Restores the previous ambient environment when dropped.
struct AmbientGuard {
    prev: Option<FloatEnv>,
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            AMBIENT.with(|a| *a.borrow_mut() = prev);
        }
    }
}

/// Install `env` as the thread-local ambient for the dynamic extent of
/// `f`. The previous ambient is restored when `f` returns or unwinds.
pub fn with_env<T>(env: FloatEnv, f: impl FnOnce() -> T) -> T {
    let _guard = AmbientGuard {
        prev: Some(AMBIENT.with(|a| std::mem::replace(&mut *a.borrow_mut(), env))),
    };
    f()
}

/// Install a fresh nearest-even ambient of the given precision for the
/// dynamic extent of `f`.
pub fn with_precision<T>(prec: u32, f: impl FnOnce() -> T) -> Result<T, Error> {
    let env = FloatEnv::with_prec(prec)?;
    Ok(with_env(env, f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_aliases_round_trip() {
        for mode in [
            RoundingMode::NearestEven,
            RoundingMode::NearestAway,
            RoundingMode::ToZero,
            RoundingMode::AwayFromZero,
            RoundingMode::TowardPositive,
            RoundingMode::TowardNegative,
        ] {
            let alias = mode.alias().unwrap();
            assert_eq!(RoundingMode::from_alias(alias), Some(mode));
        }
        assert_eq!(RoundingMode::from_alias("trunc"), None);
        assert_eq!(RoundingMode::ToOdd.alias(), None);
    }

    #[test]
    fn test_env_construction() {
        let env = FloatEnv::with_prec(128).unwrap();
        assert_eq!(env.prec(), 128);
        assert_eq!(env.mode(), RoundingMode::NearestEven);
        assert_eq!(env.status(), Status::default());
        assert!(FloatEnv::with_prec(1).is_err());
    }

    #[test]
    fn test_flags_are_sticky() {
        let env = FloatEnv::with_prec(8).unwrap();
        env.raise_inexact();
        env.raise_invalid();
        assert!(env.inexact());
        assert!(env.invalid());
        assert!(!env.overflow());
        env.clear_flags();
        assert_eq!(env.status(), Status::default());
    }

    #[test]
    fn test_with_env_restores_ambient() {
        let before = ambient(|e| e.prec());
        let inner = with_env(FloatEnv::with_prec(40).unwrap(), || ambient(|e| e.prec()));
        assert_eq!(inner, 40);
        assert_eq!(ambient(|e| e.prec()), before);
    }

    #[test]
    fn test_with_env_restores_on_panic() {
        let before = ambient(|e| e.prec());
        let result = std::panic::catch_unwind(|| {
            with_env(FloatEnv::with_prec(99).unwrap(), || panic!("boom"))
        });
        assert!(result.is_err());
        assert_eq!(ambient(|e| e.prec()), before);
    }

    #[test]
    fn test_nested_overrides() {
        with_precision(64, || {
            assert_eq!(ambient(|e| e.prec()), 64);
            with_precision(32, || {
                assert_eq!(ambient(|e| e.prec()), 32);
            })
            .unwrap();
            assert_eq!(ambient(|e| e.prec()), 64);
        })
        .unwrap();
    }
}
