//! Error taxonomy for the validation engine.

use core::fmt;

use odra::prelude::*;

/// Errors returned by every fallible path in the engine.
///
/// `MathOverflow`, `DivisionByZero`, `SolvencyViolation` and `IndexRegression`
/// surfacing past the precondition checks indicate a logic defect, not a bad
/// request; callers should treat them as internal errors. The rest are
/// ordinary rejected-operation results.
#[odra::odra_error]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LendingError {
    // 0
    MathOverflow = 0,
    DivisionByZero = 1,
    ClockRegression = 2,
    InvalidAmount = 3,
    InvalidConfig = 4,

    // 5
    InvalidOracleConfig = 5,
    InsufficientLiquidity = 6,
    SolvencyViolation = 7,
    LtvExceeded = 8,
    InvalidSignature = 9,

    // 10
    StalePrice = 10,
    OracleUnavailable = 11,
    ReserveNotFound = 12,
    PositionNotFound = 13,
    PositionHealthy = 14,

    // 15
    AlreadyClosed = 15,
    IndexRegression = 16,
    ReserveAlreadyListed = 17,
    Unauthorized = 18,
}

impl LendingError {
    /// Human-readable description, mirrored in `Display`.
    pub fn message(&self) -> &str {
        match self {
            LendingError::MathOverflow => "Math operation overflow",
            LendingError::DivisionByZero => "Division by zero",
            LendingError::ClockRegression => "Supplied timestamp precedes the last update",
            LendingError::InvalidAmount => "Input amount is invalid",
            LendingError::InvalidConfig => "Input config value is invalid",
            LendingError::InvalidOracleConfig => "Oracle public key is not approved",
            LendingError::InsufficientLiquidity => "Insufficient liquidity available",
            LendingError::SolvencyViolation => "Total borrowed would exceed total liquidity",
            LendingError::LtvExceeded => "Borrow value exceeds collateral LTV limit",
            LendingError::InvalidSignature => "Oracle price feed signature is invalid",
            LendingError::StalePrice => "Oracle price feed is stale",
            LendingError::OracleUnavailable => "No oracle price feed supplied for asset",
            LendingError::ReserveNotFound => "Reserve not found for asset",
            LendingError::PositionNotFound => "Debt position not found",
            LendingError::PositionHealthy => "Cannot liquidate a healthy position",
            LendingError::AlreadyClosed => "Debt position has no outstanding debt",
            LendingError::IndexRegression => "Accrual index decreased",
            LendingError::ReserveAlreadyListed => "Reserve already listed for asset",
            LendingError::Unauthorized => "Caller is not the market owner",
        }
    }
}

impl fmt::Display for LendingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}
