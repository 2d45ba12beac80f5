//! Error kinds for the numeric core.
//!
//! Only *hard* failures appear here: conditions the caller must branch
//! on. BigFloat domain problems are deliberately absent; they are soft
//! failures reported through a sentinel value (NaN, signed infinity)
//! plus a sticky status flag on the environment, and never abort a
//! call. BigDecimal takes the opposite stance: any operation that
//! cannot deliver an exact result without a rounding context fails
//! loudly.

use thiserror::Error;

/// Hard failures raised by the numeric core.
///
/// Every variant is locally recoverable; nothing in this crate panics on
/// user input. `PartialEq` is derived so callers (and tests) can match on
/// the kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Integer or decimal division with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// Operation outside its domain where no sentinel result is defined
    /// (e.g. integer or decimal square root of a negative number).
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// A decimal operation whose exact result does not terminate and no
    /// rounding context was supplied to license an inexact result.
    #[error("result is not exactly representable and no rounding context was given")]
    InexactResult,

    /// Decimal exponentiation with a non-integer or negative exponent.
    #[error("exponent must be a non-negative integer")]
    InvalidExponent,

    /// A rounding context that is structurally invalid (both or neither
    /// digit limit, or an out-of-range digit count). Reported at context
    /// construction, never lazily.
    #[error("invalid rounding context: {0}")]
    InvalidConfiguration(&'static str),

    /// Text that does not parse as a numeric literal in the given radix.
    #[error("malformed numeric literal: {0:?}")]
    MalformedLiteral(String),
}
