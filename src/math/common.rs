//! Shared scalers for RAY fixed-point values.
//!
//! RAY does not fit a u64, so the identity constants are u128 and every
//! intermediate product is computed in U256 before the final scale-down
//! divide. Truncating earlier loses precision and is a correctness bug.

/// Scale of precision
pub const SCALE: usize = 27;
/// Identity (10^27)
pub const RAY: u128 = 1_000_000_000_000_000_000_000_000_000;
/// Half of identity, used for round-half-up
pub const HALF_RAY: u128 = 500_000_000_000_000_000_000_000_000;
/// Scale for percentages
pub const PERCENT_SCALER: u128 = 10_000_000_000_000_000_000_000_000;
/// Seconds per 365-day year, used to derive per-second rates
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scaler_relations() {
        assert_eq!(RAY, 10u128.pow(SCALE as u32));
        assert_eq!(HALF_RAY * 2, RAY);
        assert_eq!(PERCENT_SCALER * 100, RAY);
    }
}
