//! RAY fixed-point arithmetic at 10^27 precision.

pub mod common;
pub mod decimal;
pub mod rate;

pub use common::{HALF_RAY, PERCENT_SCALER, RAY, SCALE, SECONDS_PER_YEAR};
pub use decimal::Decimal;
pub use rate::Rate;

use crate::error::LendingError;

/// Try to add, return an error on overflow
pub trait TryAdd: Sized {
    /// Add
    fn try_add(self, rhs: Self) -> Result<Self, LendingError>;
}

/// Try to subtract, return an error on underflow
pub trait TrySub: Sized {
    /// Subtract
    fn try_sub(self, rhs: Self) -> Result<Self, LendingError>;
}

/// Try to divide, return an error on overflow or divide by zero
pub trait TryDiv<Rhs = Self>: Sized {
    /// Divide
    fn try_div(self, rhs: Rhs) -> Result<Self, LendingError>;
}

/// Try to multiply, return an error on overflow
pub trait TryMul<Rhs = Self>: Sized {
    /// Multiply
    fn try_mul(self, rhs: Rhs) -> Result<Self, LendingError>;
}
