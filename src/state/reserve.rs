//! Reserve snapshots: per-asset pool totals, cumulative interest indices and
//! the utilization-driven rate model.

use odra::prelude::*;

use crate::error::LendingError;
use crate::math::{Decimal, Rate, TryAdd, TryDiv, TryMul, TrySub};
use crate::oracle::AssetId;
use crate::state::{LastUpdate, INITIAL_VERSION};

/// Piecewise-linear borrow-rate model, AAVE-style.
///
/// Annual rates in RAY. The borrow rate is non-decreasing in utilization:
/// `base + slope1 * (u / u_opt)` up to the kink, then
/// `base + slope1 + slope2 * ((u - u_opt) / (1 - u_opt))` above it.
/// The kink parameters are a deployment choice, validated but never assumed.
#[odra::odra_type]
pub struct InterestRateModel {
    /// Borrow rate at zero utilization (annual, RAY).
    pub base_borrow_rate: Rate,
    /// Utilization at the kink, in (0, RAY].
    pub optimal_utilization: Rate,
    /// Rate increase from zero to optimal utilization (annual, RAY).
    pub slope1: Rate,
    /// Additional rate increase above optimal utilization (annual, RAY).
    pub slope2: Rate,
}

impl InterestRateModel {
    /// The original deployment's parameters: 2% base, 80% kink, 4% slope
    /// below, 60% above. For tests and the CLI; deployments pass their own.
    pub fn baseline() -> Self {
        Self {
            base_borrow_rate: Rate::from_percent(2),
            optimal_utilization: Rate::from_percent(80),
            slope1: Rate::from_percent(4),
            slope2: Rate::from_percent(60),
        }
    }

    /// Reject kinks outside (0, RAY] and fractions above RAY.
    pub fn validate(&self) -> Result<(), LendingError> {
        if self.optimal_utilization == Rate::zero() || self.optimal_utilization > Rate::one() {
            return Err(LendingError::InvalidConfig);
        }
        Ok(())
    }

    /// Annual borrow rate at the given utilization (both RAY).
    pub fn borrow_rate_annual(&self, utilization: Rate) -> Result<Rate, LendingError> {
        if utilization == Rate::zero() {
            return Ok(self.base_borrow_rate);
        }

        if utilization <= self.optimal_utilization {
            let ratio = utilization.try_div(self.optimal_utilization)?;
            return self.base_borrow_rate.try_add(self.slope1.try_mul(ratio)?);
        }

        // Above the kink. `optimal_utilization == RAY` cannot reach here.
        let excess = utilization.try_sub(self.optimal_utilization)?;
        let denom = Rate::one().try_sub(self.optimal_utilization)?;
        let step2 = self.slope2.try_mul(excess.try_div(denom)?)?;
        self.base_borrow_rate.try_add(self.slope1)?.try_add(step2)
    }
}

/// Per-reserve risk and fee parameters, fractions of RAY.
#[odra::odra_type]
pub struct ReserveConfig {
    /// Maximum borrow value per collateral value at origination.
    pub ltv: Rate,
    /// Collateral-value fraction below which positions become liquidatable.
    /// Always >= ltv.
    pub liquidation_threshold: Rate,
    /// Collateral premium granted to liquidators.
    pub liquidation_bonus: Rate,
    /// Fraction of a position's debt one liquidation may cover, in (0, RAY].
    pub close_factor: Rate,
    /// Fraction of borrower interest skimmed by the protocol.
    pub reserve_factor: Rate,
    /// Utilization-driven borrow-rate curve.
    pub rate_model: InterestRateModel,
}

impl ReserveConfig {
    /// Parameters of the original deployment: 75% LTV, 80% threshold,
    /// 5% bonus, 50% close factor, 10% reserve factor.
    pub fn baseline() -> Self {
        Self {
            ltv: Rate::from_percent(75),
            liquidation_threshold: Rate::from_percent(80),
            liquidation_bonus: Rate::from_percent(5),
            close_factor: Rate::from_percent(50),
            reserve_factor: Rate::from_percent(10),
            rate_model: InterestRateModel::baseline(),
        }
    }

    /// Enforce `ltv <= liquidation_threshold <= RAY` and the other fraction
    /// bounds. This ordering is fixed at listing and never re-derived per
    /// transition.
    pub fn validate(&self) -> Result<(), LendingError> {
        if self.ltv > self.liquidation_threshold {
            return Err(LendingError::InvalidConfig);
        }
        if self.liquidation_threshold > Rate::one() {
            return Err(LendingError::InvalidConfig);
        }
        if self.liquidation_bonus > Rate::one() {
            return Err(LendingError::InvalidConfig);
        }
        if self.close_factor == Rate::zero() || self.close_factor > Rate::one() {
            return Err(LendingError::InvalidConfig);
        }
        if self.reserve_factor > Rate::one() {
            return Err(LendingError::InvalidConfig);
        }
        self.rate_model.validate()
    }
}

/// One asset's reserve record.
///
/// An immutable snapshot in a single version chain: the processor clones the
/// stored record, runs the methods below on the clone, and commits the
/// successor (version + 1) only if everything succeeded.
#[odra::odra_type]
pub struct Reserve {
    /// Asset this reserve holds.
    pub asset_id: AssetId,
    /// Successor counter, incremented on every committed transition.
    pub version: u64,
    /// Total supplied assets (satoshis).
    pub total_liquidity: u64,
    /// Total borrowed assets (satoshis). Never exceeds `total_liquidity`.
    pub total_borrowed: u64,
    /// Cumulative supply interest index (RAY), non-decreasing.
    pub liquidity_index: Decimal,
    /// Cumulative borrow interest index (RAY), non-decreasing.
    pub variable_borrow_index: Decimal,
    /// Current supply rate per second (RAY).
    pub current_liquidity_rate: Rate,
    /// Current borrow rate per second (RAY).
    pub current_variable_borrow_rate: Rate,
    /// Accrual clock.
    pub last_update: LastUpdate,
    /// Risk parameters fixed at listing.
    pub config: ReserveConfig,
}

impl Reserve {
    /// List a reserve: indices start at RAY, rates at zero.
    pub fn new(asset_id: AssetId, config: ReserveConfig, now: u64) -> Self {
        Self {
            asset_id,
            version: INITIAL_VERSION,
            total_liquidity: 0,
            total_borrowed: 0,
            liquidity_index: Decimal::one(),
            variable_borrow_index: Decimal::one(),
            current_liquidity_rate: Rate::zero(),
            current_variable_borrow_rate: Rate::zero(),
            last_update: LastUpdate::new(now),
            config,
        }
    }

    /// Liquidity not currently lent out.
    pub fn available_liquidity(&self) -> u64 {
        self.total_liquidity.saturating_sub(self.total_borrowed)
    }

    /// Fraction of supplied liquidity currently borrowed (RAY).
    /// Zero when the pool is empty.
    pub fn utilization_rate(&self) -> Result<Rate, LendingError> {
        if self.total_liquidity == 0 {
            return Ok(Rate::zero());
        }
        let utilization = Decimal::from(self.total_borrowed)
            .try_div(Decimal::from(self.total_liquidity))?;
        Ok(Rate::from(utilization))
    }

    /// Accrue interest up to `now`.
    ///
    /// Must run before any balance-affecting operation so the indices the
    /// operation reads are current. `now` behind the stored timestamp fails
    /// `ClockRegression`; `now` equal to it only refreshes the clock.
    pub fn accrue(&mut self, now: u64) -> Result<(), LendingError> {
        let dt = self.last_update.seconds_elapsed(now)?;
        if dt > 0 {
            let liquidity_growth = self.current_liquidity_rate.linear_growth(dt)?;
            let borrow_growth = self.current_variable_borrow_rate.linear_growth(dt)?;
            self.liquidity_index = self.liquidity_index.try_mul(liquidity_growth)?;
            self.variable_borrow_index = self.variable_borrow_index.try_mul(borrow_growth)?;
        }
        self.last_update.update(now);
        Ok(())
    }

    /// Recompute per-second rates from the current utilization.
    ///
    /// `liquidity_rate = borrow_rate * utilization * (1 - reserve_factor)`:
    /// the protocol skims `reserve_factor` of borrower interest before
    /// passing the remainder to suppliers.
    pub fn update_rates(&mut self) -> Result<(), LendingError> {
        let utilization = self.utilization_rate()?;
        let borrow_annual = self.config.rate_model.borrow_rate_annual(utilization)?;
        let borrow_per_sec = borrow_annual.try_per_second()?;

        let one_minus_rf = Rate::one().try_sub(self.config.reserve_factor)?;
        let liquidity_per_sec = borrow_per_sec.try_mul(utilization)?.try_mul(one_minus_rf)?;

        self.current_variable_borrow_rate = borrow_per_sec;
        self.current_liquidity_rate = liquidity_per_sec;
        Ok(())
    }

    /// Add supplied liquidity.
    pub fn deposit(&mut self, amount: u64) -> Result<(), LendingError> {
        if amount == 0 {
            return Err(LendingError::InvalidAmount);
        }
        self.total_liquidity = self
            .total_liquidity
            .checked_add(amount)
            .ok_or(LendingError::MathOverflow)?;
        self.update_rates()
    }

    /// Remove supplied liquidity, bounded by what is not lent out.
    pub fn withdraw(&mut self, amount: u64) -> Result<(), LendingError> {
        if amount == 0 {
            return Err(LendingError::InvalidAmount);
        }
        if amount > self.available_liquidity() {
            return Err(LendingError::InsufficientLiquidity);
        }
        self.total_liquidity -= amount;
        self.assert_solvent()?;
        self.update_rates()
    }

    /// Lend out liquidity.
    ///
    /// The LTV bound in the transition validator already limits the amount;
    /// the solvency re-check here is deliberately redundant.
    pub fn borrow(&mut self, amount: u64) -> Result<(), LendingError> {
        if amount == 0 {
            return Err(LendingError::InvalidAmount);
        }
        if amount > self.available_liquidity() {
            return Err(LendingError::InsufficientLiquidity);
        }
        self.total_borrowed = self
            .total_borrowed
            .checked_add(amount)
            .ok_or(LendingError::MathOverflow)?;
        self.assert_solvent()?;
        self.update_rates()
    }

    /// Return borrowed liquidity.
    ///
    /// Both values come from the position settlement that produced them:
    /// `settle_amount` is the debt actually covered, `interest_accrued` the
    /// interest the settlement realized on that position. The interest is
    /// capitalized into `total_borrowed` first (re-anchoring folds unpaid
    /// interest into the remaining principal) and credited to the pool, then
    /// the settled debt is retired. `total_borrowed` stays the sum of the
    /// anchored principals of the other open positions.
    pub fn repay(&mut self, settle_amount: u64, interest_accrued: u64) -> Result<(), LendingError> {
        if settle_amount == 0 {
            return Err(LendingError::InvalidAmount);
        }
        self.total_borrowed = self
            .total_borrowed
            .checked_add(interest_accrued)
            .ok_or(LendingError::MathOverflow)?
            .checked_sub(settle_amount)
            .ok_or(LendingError::MathOverflow)?;
        self.total_liquidity = self
            .total_liquidity
            .checked_add(interest_accrued)
            .ok_or(LendingError::MathOverflow)?;
        self.assert_solvent()?;
        self.update_rates()
    }

    /// `total_borrowed <= total_liquidity`, re-verified after every mutation.
    pub fn assert_solvent(&self) -> Result<(), LendingError> {
        if self.total_borrowed > self.total_liquidity {
            return Err(LendingError::SolvencyViolation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{HALF_RAY, RAY};

    fn reserve_with(total_liquidity: u64, total_borrowed: u64) -> Reserve {
        let mut reserve = Reserve::new([1u8; 32], ReserveConfig::baseline(), 1_000);
        reserve.total_liquidity = total_liquidity;
        reserve.total_borrowed = total_borrowed;
        reserve.update_rates().unwrap();
        reserve
    }

    #[test]
    fn utilization_half_pool() {
        // 1_000_000_000 supplied, 500_000_000 borrowed -> exactly 0.5 RAY
        let reserve = reserve_with(1_000_000_000, 500_000_000);
        assert_eq!(reserve.utilization_rate().unwrap().to_scaled_val(), HALF_RAY);
    }

    #[test]
    fn utilization_of_empty_pool_is_zero() {
        let reserve = Reserve::new([1u8; 32], ReserveConfig::baseline(), 0);
        assert_eq!(reserve.utilization_rate().unwrap(), Rate::zero());
    }

    #[test]
    fn borrow_rate_monotone_in_utilization() {
        let model = InterestRateModel::baseline();
        let mut previous = Rate::zero();
        for pct in 0..=100u8 {
            let rate = model.borrow_rate_annual(Rate::from_percent(pct)).unwrap();
            assert!(rate >= previous, "rate decreased at {}% utilization", pct);
            previous = rate;
        }
    }

    #[test]
    fn borrow_rate_at_kink_and_full() {
        let model = InterestRateModel::baseline();
        // at the kink: base + slope1 = 6%
        let at_kink = model.borrow_rate_annual(Rate::from_percent(80)).unwrap();
        assert_eq!(at_kink, Rate::from_percent(6));
        // fully utilized: base + slope1 + slope2 = 66%
        let full = model.borrow_rate_annual(Rate::one()).unwrap();
        assert_eq!(full, Rate::from_percent(66));
    }

    #[test]
    fn accrual_grows_indices_monotonically() {
        let mut reserve = reserve_with(1_000_000_000, 800_000_000);
        assert!(reserve.current_variable_borrow_rate > Rate::zero());

        let before_liquidity = reserve.liquidity_index;
        let before_borrow = reserve.variable_borrow_index;

        reserve.accrue(1_000 + 86_400).unwrap();
        assert!(reserve.liquidity_index >= before_liquidity);
        assert!(reserve.variable_borrow_index > before_borrow);
        assert_eq!(reserve.last_update.timestamp, 1_000 + 86_400);

        // a second accrual never decreases either index
        let mid_liquidity = reserve.liquidity_index;
        reserve.accrue(1_000 + 2 * 86_400).unwrap();
        assert!(reserve.liquidity_index >= mid_liquidity);
    }

    #[test]
    fn accrual_with_regressed_clock_fails() {
        let mut reserve = reserve_with(1_000, 500);
        let err = reserve.accrue(999).unwrap_err();
        assert_eq!(err, LendingError::ClockRegression);
    }

    #[test]
    fn accrual_with_zero_rates_is_identity() {
        let mut reserve = Reserve::new([1u8; 32], ReserveConfig::baseline(), 0);
        reserve.accrue(1_000_000).unwrap();
        assert_eq!(reserve.liquidity_index, Decimal::one());
        assert_eq!(reserve.variable_borrow_index, Decimal::one());
    }

    #[test]
    fn withdraw_bounded_by_available_liquidity() {
        let mut reserve = reserve_with(1_000, 400);
        let err = reserve.withdraw(601).unwrap_err();
        assert_eq!(err, LendingError::InsufficientLiquidity);

        reserve.withdraw(600).unwrap();
        assert_eq!(reserve.total_liquidity, 400);
        reserve.assert_solvent().unwrap();
    }

    #[test]
    fn borrow_bounded_by_available_liquidity() {
        let mut reserve = reserve_with(1_000, 900);
        assert_eq!(
            reserve.borrow(101).unwrap_err(),
            LendingError::InsufficientLiquidity
        );
        reserve.borrow(100).unwrap();
        assert_eq!(reserve.total_borrowed, 1_000);
        reserve.assert_solvent().unwrap();
    }

    #[test]
    fn repay_credits_interest_to_liquidity() {
        let mut reserve = reserve_with(1_000, 500);
        // settle 520: 500 principal, 20 accrued interest
        reserve.repay(520, 20).unwrap();
        assert_eq!(reserve.total_borrowed, 0);
        assert_eq!(reserve.total_liquidity, 1_020);
    }

    #[test]
    fn repay_leaves_other_borrowers_backed() {
        // two positions of 500 each; the first settles 550 (50 of it interest)
        let mut reserve = reserve_with(2_000, 1_000);
        reserve.repay(550, 50).unwrap();
        // the second borrower's 500 of principal is still on the books
        assert_eq!(reserve.total_borrowed, 500);
        assert_eq!(reserve.total_liquidity, 2_050);
    }

    #[test]
    fn partial_repay_capitalizes_unpaid_interest() {
        // debt 550 on principal 500; only 10 is settled, so re-anchoring
        // raises the position's principal to 540 and the pool must agree
        let mut reserve = reserve_with(1_000, 500);
        reserve.repay(10, 50).unwrap();
        assert_eq!(reserve.total_borrowed, 540);
        assert_eq!(reserve.total_liquidity, 1_050);
        reserve.assert_solvent().unwrap();
    }

    #[test]
    fn solvency_holds_across_operation_sequence() {
        let mut reserve = reserve_with(0, 0);
        reserve.deposit(1_000_000).unwrap();
        reserve.borrow(700_000).unwrap();
        reserve.repay(100_000, 0).unwrap();
        reserve.withdraw(300_000).unwrap();
        reserve.deposit(50_000).unwrap();
        reserve.assert_solvent().unwrap();
        assert_eq!(reserve.total_liquidity, 750_000);
        assert_eq!(reserve.total_borrowed, 600_000);
    }

    #[test]
    fn rejected_config_orderings() {
        let mut config = ReserveConfig::baseline();
        config.ltv = Rate::from_percent(90); // above the 80% threshold
        assert_eq!(config.validate().unwrap_err(), LendingError::InvalidConfig);

        let mut config = ReserveConfig::baseline();
        config.close_factor = Rate::zero();
        assert_eq!(config.validate().unwrap_err(), LendingError::InvalidConfig);

        let mut config = ReserveConfig::baseline();
        config.rate_model.optimal_utilization = Rate::from_scaled_val(RAY + 1);
        assert_eq!(config.validate().unwrap_err(), LendingError::InvalidConfig);

        assert!(ReserveConfig::baseline().validate().is_ok());
    }
}
