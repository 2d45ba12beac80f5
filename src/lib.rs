//! Arbitrary-precision binary and decimal arithmetic with explicit
//! rounding control.
//!
//! The crate has three numeric families and the glue between them:
//!
//! * [`intops`]: the four integer division conventions (truncating,
//!   flooring, ceiling, euclidean), `floor_log2` and integer square
//!   roots over [`num_bigint::BigInt`].
//! * [`BigFloat`]: binary floating point with arbitrary mantissa
//!   precision. Results are correctly rounded under a [`FloatEnv`]
//!   (precision, rounding mode, sticky status flags), either passed
//!   explicitly or taken from a thread-local ambient installed with
//!   [`with_env`] / [`with_precision`]. The [`functions`] module adds
//!   the correctly rounded transcendental library and [`text`] the
//!   radix 2..36 parser and formatters.
//! * [`BigDecimal`]: exact decimal arithmetic where inexact operations
//!   either fail hard or round once under an explicit
//!   [`DecimalContext`].
//!
//! [`Value`] wraps the kinds into one type and compares them exactly,
//! with no intermediate rounding.
//!
//! Failures split by family: binary operations report soft failures
//! through NaN/infinity plus status flags, decimal and configuration
//! failures are hard [`Error`]s.

pub mod decimal;
pub mod env;
pub mod error;
pub mod float;
pub mod functions;
pub mod intops;
pub mod text;
pub mod value;

mod round;

pub use decimal::{BigDecimal, DecimalContext, DigitLimit};
pub use env::{ambient, with_env, with_precision, FloatEnv, RoundingMode, Status};
pub use error::Error;
pub use float::BigFloat;
pub use value::Value;
