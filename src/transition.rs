//! The transition validator: one requested operation against immutable
//! Reserve/Debt snapshots, accepted or rejected atomically.
//!
//! Every call runs the same pipeline: accrue the touched reserve, check the
//! operation-specific precondition against verified prices, apply the
//! mutation to cloned state, re-check the protocol invariants, and only then
//! hand back the successor snapshots. Inputs are only read; a rejection is
//! the `Err` branch and no partially-applied state is ever observable.

use odra::prelude::*;

use crate::error::LendingError;
use crate::math::{Decimal, TryMul};
use crate::oracle::{usd_value, AssetId, OraclePrice};
use crate::state::{
    CalculateLiquidationResult, CalculateRepayResult, DebtPosition, Reserve,
};

/// A requested state transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Add liquidity to the reserve.
    Supply {
        /// Amount supplied (satoshis).
        amount: u64,
    },
    /// Remove available liquidity from the reserve.
    Withdraw {
        /// Amount withdrawn (satoshis).
        amount: u64,
    },
    /// Open a debt position against locked collateral.
    Borrow {
        /// Position owner.
        owner: Address,
        /// Position id assigned by the caller.
        position_id: u64,
        /// Asset locked as collateral.
        collateral_asset_id: AssetId,
        /// Collateral locked (satoshis).
        collateral_amount: u64,
        /// Amount borrowed (satoshis).
        amount: u64,
    },
    /// Repay debt on an open position.
    Repay {
        /// Amount repaid (satoshis); capped at the current debt.
        amount: u64,
    },
    /// Liquidate an unhealthy position.
    Liquidate {
        /// Debt the liquidator covers (satoshis); zero means the close-factor
        /// maximum.
        repay_amount: u64,
    },
}

/// What a committed transition did, for events and callers.
#[derive(Clone, Debug, PartialEq)]
pub enum Receipt {
    /// Liquidity supplied.
    Supplied {
        /// Amount supplied (satoshis).
        amount: u64,
    },
    /// Liquidity withdrawn.
    Withdrawn {
        /// Amount withdrawn (satoshis).
        amount: u64,
    },
    /// A position was opened.
    Opened {
        /// New position id.
        position_id: u64,
    },
    /// Debt was repaid.
    Repaid(CalculateRepayResult),
    /// A position was liquidated.
    Liquidated(CalculateLiquidationResult),
}

/// The successor snapshots of an accepted transition.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Successor reserve, version bumped.
    pub reserve: Reserve,
    /// Successor position; `None` when the operation touched no position.
    /// A fully settled position comes back closed, not dropped.
    pub position: Option<DebtPosition>,
    /// Operation outcome.
    pub receipt: Receipt,
}

/// Look up the verified price for an asset; fail closed when none was
/// supplied.
pub fn find_price<'a>(
    prices: &'a [OraclePrice],
    asset_id: &AssetId,
) -> Result<&'a OraclePrice, LendingError> {
    prices
        .iter()
        .find(|p| &p.asset_id == asset_id)
        .ok_or(LendingError::OracleUnavailable)
}

/// Health factor of a position against an already-accrued reserve and
/// verified prices.
///
/// A settled position has no debt to divide by; it reports `AlreadyClosed`
/// rather than a zero-debt health factor.
pub fn health_factor(
    position: &DebtPosition,
    reserve: &Reserve,
    collateral_price: &OraclePrice,
    debt_price: &OraclePrice,
) -> Result<Decimal, LendingError> {
    let current_debt = position.current_debt(reserve.variable_borrow_index)?;
    if current_debt == 0 {
        return Err(LendingError::AlreadyClosed);
    }
    let collateral_value = usd_value(position.collateral_amount, collateral_price.price)?;
    let debt_value = usd_value(current_debt, debt_price.price)?;
    DebtPosition::health_factor(
        collateral_value,
        debt_value,
        reserve.config.liquidation_threshold,
    )
}

/// Accrue a reserve to `now` and return the successor snapshot.
pub fn accrue(reserve: &Reserve, now: u64) -> Result<Reserve, LendingError> {
    let mut next = reserve.clone();
    next.accrue(now)?;
    check_reserve_postconditions(reserve, &next)?;
    next.version = reserve
        .version
        .checked_add(1)
        .ok_or(LendingError::MathOverflow)?;
    Ok(next)
}

/// Validate and apply one operation.
///
/// `reserve` is the borrowed asset's reserve. `position` is required for
/// `Repay` and `Liquidate`. `prices` must already have passed oracle
/// verification; price-free operations ignore them.
pub fn verify_and_apply(
    operation: Operation,
    reserve: &Reserve,
    position: Option<&DebtPosition>,
    prices: &[OraclePrice],
    now: u64,
) -> Result<Transition, LendingError> {
    // Accrued: interest must be current before any balance math.
    let mut next_reserve = reserve.clone();
    next_reserve.accrue(now)?;

    let mut next_position: Option<DebtPosition> = None;
    let receipt = match operation {
        Operation::Supply { amount } => {
            next_reserve.deposit(amount)?;
            Receipt::Supplied { amount }
        }

        Operation::Withdraw { amount } => {
            next_reserve.withdraw(amount)?;
            Receipt::Withdrawn { amount }
        }

        Operation::Borrow {
            owner,
            position_id,
            collateral_asset_id,
            collateral_amount,
            amount,
        } => {
            let collateral_price = find_price(prices, &collateral_asset_id)?;
            let debt_price = find_price(prices, &next_reserve.asset_id)?;

            let collateral_value = usd_value(collateral_amount, collateral_price.price)?;
            let debt_value = usd_value(amount, debt_price.price)?;
            let max_borrow_value = collateral_value.try_mul(next_reserve.config.ltv)?;
            if debt_value > max_borrow_value {
                return Err(LendingError::LtvExceeded);
            }

            next_reserve.borrow(amount)?;
            next_position = Some(DebtPosition::open(
                position_id,
                owner,
                next_reserve.asset_id,
                collateral_asset_id,
                amount,
                collateral_amount,
                &next_reserve,
                now,
            )?);
            Receipt::Opened { position_id }
        }

        Operation::Repay { amount } => {
            let mut pos = position.ok_or(LendingError::PositionNotFound)?.clone();
            let result = pos.settle_repay(amount, next_reserve.variable_borrow_index)?;
            next_reserve.repay(result.settle_amount, result.interest_accrued)?;
            next_position = Some(pos);
            Receipt::Repaid(result)
        }

        Operation::Liquidate { repay_amount } => {
            let mut pos = position.ok_or(LendingError::PositionNotFound)?.clone();
            let collateral_price = find_price(prices, &pos.collateral_asset_id)?;
            let debt_price = find_price(prices, &pos.borrowed_asset_id)?;

            let hf = health_factor(&pos, &next_reserve, collateral_price, debt_price)?;
            if !DebtPosition::is_liquidatable(hf) {
                return Err(LendingError::PositionHealthy);
            }

            let result = pos.settle_liquidation(
                repay_amount,
                next_reserve.variable_borrow_index,
                next_reserve.config.close_factor,
                next_reserve.config.liquidation_bonus,
            )?;
            next_reserve.repay(result.settle_amount, result.interest_accrued)?;
            next_position = Some(pos);
            Receipt::Liquidated(result)
        }
    };

    // Checked: protocol invariants re-verified on the candidate state.
    check_reserve_postconditions(reserve, &next_reserve)?;
    if let Some(pos) = &next_position {
        if pos.borrow_index_at_open == Decimal::zero() {
            return Err(LendingError::InvalidConfig);
        }
    }

    // Committed: versions advance exactly once per accepted transition.
    next_reserve.version = reserve
        .version
        .checked_add(1)
        .ok_or(LendingError::MathOverflow)?;
    if let Some(pos) = &mut next_position {
        if let Some(previous) = position {
            pos.version = previous
                .version
                .checked_add(1)
                .ok_or(LendingError::MathOverflow)?;
        }
    }

    Ok(Transition {
        reserve: next_reserve,
        position: next_position,
        receipt,
    })
}

/// Invariants that must hold on every successor reserve: solvency, index
/// monotonicity and a non-decreasing accrual clock.
fn check_reserve_postconditions(old: &Reserve, new: &Reserve) -> Result<(), LendingError> {
    new.assert_solvent()?;
    if new.liquidity_index < old.liquidity_index
        || new.variable_borrow_index < old.variable_borrow_index
    {
        return Err(LendingError::IndexRegression);
    }
    if new.last_update.timestamp < old.last_update.timestamp {
        return Err(LendingError::ClockRegression);
    }
    Ok(())
}
