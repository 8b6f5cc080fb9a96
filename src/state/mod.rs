//! Versioned Reserve and DebtPosition snapshots.
//!
//! These are the engine's only mutable records. A committed transition
//! consumes one version and produces exactly one successor; nothing mutates
//! a stored snapshot in place.

pub mod last_update;
pub mod position;
pub mod reserve;

pub use last_update::LastUpdate;
pub use position::*;
pub use reserve::*;

/// Version assigned to a freshly listed reserve or opened position.
pub const INITIAL_VERSION: u64 = 0;

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{Decimal, RAY};

    #[test]
    fn listed_reserve_starts_at_identity_indices() {
        let reserve = Reserve::new([1u8; 32], ReserveConfig::baseline(), 100);
        assert_eq!(reserve.version, INITIAL_VERSION);
        assert_eq!(reserve.liquidity_index, Decimal::one());
        assert_eq!(reserve.variable_borrow_index, Decimal::one());
        assert_eq!(reserve.current_liquidity_rate.to_scaled_val(), 0);
        assert_eq!(reserve.current_variable_borrow_rate.to_scaled_val(), 0);
        assert_eq!(reserve.liquidity_index.to_scaled_val(), RAY);
    }
}
