//! Debt position snapshots: principal anchored to the borrow index at open,
//! current-debt scaling, health factor and liquidation settlement.

use odra::prelude::*;

use crate::error::LendingError;
use crate::math::{Decimal, Rate, TryDiv, TryMul};
use crate::oracle::AssetId;
use crate::state::{Reserve, INITIAL_VERSION};

/// A user's borrow against locked collateral.
///
/// Variable-rate compounding without per-second position updates: the debt is
/// the principal scaled by the ratio of the reserve's current borrow index to
/// the index captured at open. Repay and partial liquidation re-anchor the
/// remaining debt at the then-current index.
#[odra::odra_type]
pub struct DebtPosition {
    /// Position identifier, assigned by the processor.
    pub id: u64,
    /// Successor counter, incremented on every committed transition.
    pub version: u64,
    /// Position owner.
    pub owner: Address,
    /// Asset borrowed.
    pub borrowed_asset_id: AssetId,
    /// Asset locked as collateral.
    pub collateral_asset_id: AssetId,
    /// Outstanding principal (satoshis), valued at `borrow_index_at_open`.
    pub principal: u64,
    /// Collateral locked (satoshis).
    pub collateral_amount: u64,
    /// The reserve's variable borrow index when the principal was anchored.
    /// Always > 0.
    pub borrow_index_at_open: Decimal,
    /// Unix seconds at which the position was opened.
    pub opened_at: u64,
}

/// Outcome of settling a repayment against a position.
#[odra::odra_type]
pub struct CalculateRepayResult {
    /// Debt actually settled (satoshis), capped at the current debt.
    pub settle_amount: u64,
    /// Debt left after settlement (satoshis). Zero closes the position.
    pub remaining_debt: u64,
    /// Interest realized by this settlement (satoshis): the current debt
    /// minus the previously anchored principal.
    pub interest_accrued: u64,
}

/// Outcome of a liquidation against an unhealthy position.
#[odra::odra_type]
pub struct CalculateLiquidationResult {
    /// Debt covered by the liquidator (satoshis).
    pub settle_amount: u64,
    /// Collateral transferred to the liquidator, bonus included (satoshis).
    pub collateral_seized: u64,
    /// Debt left after the liquidation (satoshis).
    pub remaining_debt: u64,
    /// Interest realized by this settlement (satoshis).
    pub interest_accrued: u64,
}

impl DebtPosition {
    /// Open a position, capturing the reserve's current variable borrow
    /// index at issuance.
    pub fn open(
        id: u64,
        owner: Address,
        borrowed_asset_id: AssetId,
        collateral_asset_id: AssetId,
        principal: u64,
        collateral_amount: u64,
        reserve_at_open: &Reserve,
        now: u64,
    ) -> Result<Self, LendingError> {
        if principal == 0 || collateral_amount == 0 {
            return Err(LendingError::InvalidAmount);
        }
        let borrow_index_at_open = reserve_at_open.variable_borrow_index;
        if borrow_index_at_open == Decimal::zero() {
            return Err(LendingError::InvalidConfig);
        }
        Ok(Self {
            id,
            version: INITIAL_VERSION,
            owner,
            borrowed_asset_id,
            collateral_asset_id,
            principal,
            collateral_amount,
            borrow_index_at_open,
            opened_at: now,
        })
    }

    /// Principal plus accrued interest at the given borrow index (satoshis):
    /// `principal * current_index / index_at_open`, rounded half-up.
    pub fn current_debt(&self, current_borrow_index: Decimal) -> Result<u64, LendingError> {
        Decimal::from(self.principal)
            .try_mul(current_borrow_index)?
            .try_div(self.borrow_index_at_open)?
            .try_round_u64()
    }

    /// Interest accrued beyond the anchored principal (satoshis).
    pub fn accrued_interest(&self, current_borrow_index: Decimal) -> Result<u64, LendingError> {
        Ok(self
            .current_debt(current_borrow_index)?
            .saturating_sub(self.principal))
    }

    /// Health factor in RAY:
    /// `(collateral_value * liquidation_threshold) / debt_value`.
    ///
    /// Values are USD at RAY precision from verified prices. Below RAY the
    /// position is liquidatable.
    pub fn health_factor(
        collateral_value: Decimal,
        debt_value: Decimal,
        liquidation_threshold: Rate,
    ) -> Result<Decimal, LendingError> {
        collateral_value
            .try_mul(liquidation_threshold)?
            .try_div(debt_value)
    }

    /// `health_factor < RAY`, exactly.
    pub fn is_liquidatable(health_factor: Decimal) -> bool {
        health_factor < Decimal::one()
    }

    /// Settle a repayment of up to `amount` against the current debt.
    ///
    /// The remaining debt is re-anchored: `principal` becomes the remainder
    /// and `borrow_index_at_open` the current index, so interest from this
    /// moment compounds on what is actually left.
    pub fn settle_repay(
        &mut self,
        amount: u64,
        current_borrow_index: Decimal,
    ) -> Result<CalculateRepayResult, LendingError> {
        if amount == 0 {
            return Err(LendingError::InvalidAmount);
        }
        let current_debt = self.current_debt(current_borrow_index)?;
        if current_debt == 0 {
            return Err(LendingError::AlreadyClosed);
        }
        let interest_accrued = current_debt.saturating_sub(self.principal);

        let settle_amount = amount.min(current_debt);
        let remaining_debt = current_debt - settle_amount;

        self.principal = remaining_debt;
        self.borrow_index_at_open = current_borrow_index;

        Ok(CalculateRepayResult {
            settle_amount,
            remaining_debt,
            interest_accrued,
        })
    }

    /// Liquidation settlement for an already-verified-unhealthy position.
    ///
    /// The repaid debt is capped by `close_factor * current_debt`; seized
    /// collateral is the proportional share plus the liquidation bonus,
    /// never more than the collateral that is there. Covering the full debt
    /// seizes all remaining collateral and closes the position.
    pub fn settle_liquidation(
        &mut self,
        repay_amount: u64,
        current_borrow_index: Decimal,
        close_factor: Rate,
        liquidation_bonus: Rate,
    ) -> Result<CalculateLiquidationResult, LendingError> {
        let current_debt = self.current_debt(current_borrow_index)?;
        if current_debt == 0 {
            return Err(LendingError::AlreadyClosed);
        }
        let interest_accrued = current_debt.saturating_sub(self.principal);

        let max_repay = Decimal::from(current_debt)
            .try_mul(close_factor)?
            .try_round_u64()?;
        let settle_amount = if repay_amount == 0 {
            max_repay
        } else {
            repay_amount.min(max_repay)
        };
        if settle_amount == 0 {
            return Err(LendingError::InvalidAmount);
        }

        let remaining_debt = current_debt - settle_amount;

        // proportional collateral share (exact in u128), then the bonus on top
        let collateral_base = ((self.collateral_amount as u128)
            .checked_mul(settle_amount as u128)
            .ok_or(LendingError::MathOverflow)?
            / current_debt as u128) as u64;
        let bonus = Decimal::from(collateral_base)
            .try_mul(liquidation_bonus)?
            .try_round_u64()?;
        let mut collateral_seized = self
            .collateral_amount
            .min(collateral_base.saturating_add(bonus));

        if remaining_debt == 0 {
            // full liquidation closes the position and releases everything
            collateral_seized = self.collateral_amount;
            self.collateral_amount = 0;
            self.principal = 0;
        } else {
            self.collateral_amount -= collateral_seized;
            self.principal = remaining_debt;
            self.borrow_index_at_open = current_borrow_index;
        }

        Ok(CalculateLiquidationResult {
            settle_amount,
            collateral_seized,
            remaining_debt,
            interest_accrued,
        })
    }

    /// A position with no principal left is closed.
    pub fn is_closed(&self) -> bool {
        self.principal == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::RAY;
    use crate::state::ReserveConfig;

    fn owner() -> Address {
        Address::Account(odra::casper_types::account::AccountHash::new([9u8; 32]))
    }

    fn open_position(principal: u64, collateral: u64, index: Decimal) -> DebtPosition {
        let mut reserve = Reserve::new([2u8; 32], ReserveConfig::baseline(), 0);
        reserve.variable_borrow_index = index;
        DebtPosition::open(1, owner(), [2u8; 32], [3u8; 32], principal, collateral, &reserve, 0)
            .unwrap()
    }

    #[test]
    fn debt_scales_with_index_ratio() {
        // opened at index 1.0, index moves to 1.1 -> debt 110_000_000 exactly
        let position = open_position(100_000_000, 1_000_000, Decimal::one());
        let current_index = Decimal::from_scaled_val(RAY + RAY / 10);
        assert_eq!(position.current_debt(current_index).unwrap(), 110_000_000);
        assert_eq!(position.accrued_interest(current_index).unwrap(), 10_000_000);
    }

    #[test]
    fn debt_never_below_principal_once_index_moves() {
        let position = open_position(100, 1_000, Decimal::one());
        for bump in [0u128, 1, 1_000, RAY / 100] {
            let index = Decimal::from_scaled_val(RAY + bump);
            assert!(position.current_debt(index).unwrap() >= 100);
        }
    }

    #[test]
    fn health_factor_threshold_is_exact() {
        let threshold = Rate::from_percent(80);
        // collateral $125, debt $100 -> hf = 1.0 exactly: not liquidatable
        let hf = DebtPosition::health_factor(
            Decimal::from(125u64),
            Decimal::from(100u64),
            threshold,
        )
        .unwrap();
        assert_eq!(hf, Decimal::one());
        assert!(!DebtPosition::is_liquidatable(hf));

        // one dollar more debt tips it over
        let hf = DebtPosition::health_factor(
            Decimal::from(125u64),
            Decimal::from(101u64),
            threshold,
        )
        .unwrap();
        assert!(DebtPosition::is_liquidatable(hf));
    }

    #[test]
    fn health_factor_of_zero_debt_rejected() {
        let res = DebtPosition::health_factor(
            Decimal::from(125u64),
            Decimal::zero(),
            Rate::from_percent(80),
        );
        assert_eq!(res.unwrap_err(), LendingError::DivisionByZero);
    }

    #[test]
    fn repay_reanchors_remaining_debt() {
        let mut position = open_position(100_000_000, 1_000_000, Decimal::one());
        let index = Decimal::from_scaled_val(RAY + RAY / 10); // debt 110_000_000

        let result = position.settle_repay(60_000_000, index).unwrap();
        assert_eq!(result.settle_amount, 60_000_000);
        assert_eq!(result.remaining_debt, 50_000_000);
        assert_eq!(result.interest_accrued, 10_000_000);
        assert_eq!(position.principal, 50_000_000);
        assert_eq!(position.borrow_index_at_open, index);
        assert!(!position.is_closed());

        // overpay just settles what is owed and closes
        let result = position.settle_repay(u64::MAX, index).unwrap();
        assert_eq!(result.settle_amount, 50_000_000);
        assert_eq!(result.remaining_debt, 0);
        assert_eq!(result.interest_accrued, 0);
        assert!(position.is_closed());
    }

    #[test]
    fn repay_on_closed_position_rejected() {
        let mut position = open_position(100, 1_000, Decimal::one());
        position.principal = 0;
        let res = position.settle_repay(10, Decimal::one());
        assert_eq!(res.unwrap_err(), LendingError::AlreadyClosed);
    }

    #[test]
    fn partial_liquidation_respects_close_factor_and_bonus() {
        let mut position = open_position(100_000_000, 2_000_000, Decimal::one());
        let index = Decimal::one();

        // close factor 50%: at most 50_000_000 of debt per liquidation
        let result = position
            .settle_liquidation(u64::MAX, index, Rate::from_percent(50), Rate::from_percent(5))
            .unwrap();
        assert_eq!(result.settle_amount, 50_000_000);
        assert_eq!(result.remaining_debt, 50_000_000);
        // base = 2_000_000 * 50% = 1_000_000, bonus 5% = 50_000
        assert_eq!(result.collateral_seized, 1_050_000);
        assert_eq!(position.collateral_amount, 950_000);
        assert_eq!(position.principal, 50_000_000);
        assert!(!position.is_closed());
    }

    #[test]
    fn full_liquidation_seizes_all_collateral_and_closes() {
        let mut position = open_position(100_000_000, 2_000_000, Decimal::one());
        let result = position
            .settle_liquidation(0, Decimal::one(), Rate::one(), Rate::from_percent(5))
            .unwrap();
        assert_eq!(result.settle_amount, 100_000_000);
        assert_eq!(result.remaining_debt, 0);
        assert_eq!(result.collateral_seized, 2_000_000);
        assert!(position.is_closed());
    }

    #[test]
    fn seizure_never_exceeds_collateral() {
        // tiny collateral against large debt: bonus cannot overshoot
        let mut position = open_position(1_000_000, 10, Decimal::one());
        let result = position
            .settle_liquidation(900_000, Decimal::one(), Rate::one(), Rate::from_percent(5))
            .unwrap();
        assert!(result.collateral_seized <= 10);
    }
}
