//! The contract surface: committed state, entry points and events.
//!
//! Stored reserves and positions are immutable snapshots in a single version
//! chain. Every entry point loads the stored snapshot, runs the pure
//! transition over a clone, and commits the successor only on success, so a
//! rejected call leaves storage bit-for-bit as it was.
//!
//! Accrual time is an explicit `now` argument. The submitting side owns the
//! clock it validates against; the contract only enforces that it never runs
//! backwards.

use alloc::rc::Rc;
use odra::casper_types::{bytesrepr::Bytes, PublicKey};
use odra::prelude::*;
use odra::ContractEnv;

use crate::error::LendingError;
use crate::math::{Decimal, Rate};
use crate::oracle::{self, AssetId, OraclePrice, PriceFeed, SignatureVerifier};
use crate::state::{DebtPosition, Reserve, ReserveConfig};
use crate::transition::{self, Operation, Receipt};

/// A reserve was listed for an asset.
#[odra::event]
pub struct ReserveListed {
    /// Asset listed.
    pub asset_id: AssetId,
}

/// Interest was accrued on a reserve outside any balance operation.
#[odra::event]
pub struct ReserveAccrued {
    /// Asset accrued.
    pub asset_id: AssetId,
    /// Version of the committed successor snapshot.
    pub version: u64,
}

/// Liquidity was added to a reserve.
#[odra::event]
pub struct LiquiditySupplied {
    /// Asset supplied.
    pub asset_id: AssetId,
    /// Amount supplied (satoshis).
    pub amount: u64,
    /// Supplier.
    pub supplier: Address,
}

/// Liquidity was removed from a reserve.
#[odra::event]
pub struct LiquidityWithdrawn {
    /// Asset withdrawn.
    pub asset_id: AssetId,
    /// Amount withdrawn (satoshis).
    pub amount: u64,
}

/// A debt position was opened.
#[odra::event]
pub struct PositionOpened {
    /// New position id.
    pub position_id: u64,
    /// Position owner.
    pub owner: Address,
    /// Asset borrowed.
    pub borrowed_asset_id: AssetId,
    /// Amount borrowed (satoshis).
    pub amount: u64,
}

/// Debt was repaid on a position.
#[odra::event]
pub struct DebtRepaid {
    /// Position repaid.
    pub position_id: u64,
    /// Debt settled (satoshis).
    pub settle_amount: u64,
    /// Debt left (satoshis); zero closed the position.
    pub remaining_debt: u64,
}

/// An unhealthy position was liquidated.
#[odra::event]
pub struct PositionLiquidated {
    /// Position liquidated.
    pub position_id: u64,
    /// Debt covered by the liquidator (satoshis).
    pub settle_amount: u64,
    /// Collateral transferred to the liquidator (satoshis).
    pub collateral_seized: u64,
    /// Debt left (satoshis).
    pub remaining_debt: u64,
}

/// An oracle signing key was approved.
#[odra::event]
pub struct OracleKeyAdded {
    /// Key approved.
    pub public_key: PublicKey,
}

/// An oracle signing key was revoked.
#[odra::event]
pub struct OracleKeyRemoved {
    /// Key revoked.
    pub public_key: PublicKey,
}

/// The lending validation contract.
#[odra::module(
    errors = LendingError,
    events = [
        ReserveListed,
        ReserveAccrued,
        LiquiditySupplied,
        LiquidityWithdrawn,
        PositionOpened,
        DebtRepaid,
        PositionLiquidated,
        OracleKeyAdded,
        OracleKeyRemoved
    ]
)]
pub struct FantasmaLending {
    /// Admin allowed to list reserves and manage oracle keys.
    pub owner: Var<Address>,
    /// Maximum accepted feed age in seconds.
    pub max_price_age_secs: Var<u64>,
    /// Next position id to assign.
    pub next_position_id: Var<u64>,
    /// Approved oracle signing keys.
    pub oracle_keys: Mapping<PublicKey, bool>,
    /// Latest committed reserve snapshot per asset.
    pub reserves: Mapping<AssetId, Reserve>,
    /// Latest committed position snapshot per id, closed positions included.
    pub positions: Mapping<u64, DebtPosition>,
}

#[odra::module]
impl FantasmaLending {
    /// Deploy with an admin and a feed staleness bound.
    pub fn init(&mut self, owner: Address, max_price_age_secs: u64) {
        self.owner.set(owner);
        self.max_price_age_secs.set(max_price_age_secs);
        self.next_position_id.set(0u64);
    }

    // =======================================================================
    // ADMINISTRATION
    // =======================================================================

    /// Hand the admin role to another account.
    pub fn set_owner(&mut self, new_owner: Address) -> Result<(), LendingError> {
        self.require_owner()?;
        self.owner.set(new_owner);
        Ok(())
    }

    /// Approve an oracle signing key.
    pub fn add_oracle_key(&mut self, public_key: PublicKey) -> Result<(), LendingError> {
        self.require_owner()?;
        self.oracle_keys.set(&public_key, true);
        self.env().emit_event(OracleKeyAdded { public_key });
        Ok(())
    }

    /// Revoke an oracle signing key. Feeds signed with it stop verifying
    /// immediately.
    pub fn remove_oracle_key(&mut self, public_key: PublicKey) -> Result<(), LendingError> {
        self.require_owner()?;
        self.oracle_keys.set(&public_key, false);
        self.env().emit_event(OracleKeyRemoved { public_key });
        Ok(())
    }

    /// List a reserve for an asset. Indices start at one, rates at zero.
    pub fn list_reserve(
        &mut self,
        asset_id: AssetId,
        config: ReserveConfig,
        now: u64,
    ) -> Result<(), LendingError> {
        self.require_owner()?;
        config.validate()?;
        if self.reserves.get(&asset_id).is_some() {
            return Err(LendingError::ReserveAlreadyListed);
        }

        self.reserves.set(&asset_id, Reserve::new(asset_id, config, now));
        self.env().emit_event(ReserveListed { asset_id });
        Ok(())
    }

    // =======================================================================
    // RESERVE OPERATIONS
    // =======================================================================

    /// Accrue interest on a reserve up to `now` and commit the successor.
    pub fn accrue(&mut self, asset_id: AssetId, now: u64) -> Result<(), LendingError> {
        let reserve = self.load_reserve(&asset_id)?;
        let next = transition::accrue(&reserve, now)?;
        let version = next.version;
        self.reserves.set(&asset_id, next);
        self.env().emit_event(ReserveAccrued { asset_id, version });
        Ok(())
    }

    /// Supply liquidity to a reserve.
    pub fn supply(&mut self, asset_id: AssetId, amount: u64, now: u64) -> Result<(), LendingError> {
        let reserve = self.load_reserve(&asset_id)?;
        let outcome =
            transition::verify_and_apply(Operation::Supply { amount }, &reserve, None, &[], now)?;

        self.reserves.set(&asset_id, outcome.reserve);
        self.env().emit_event(LiquiditySupplied {
            asset_id,
            amount,
            supplier: self.env().caller(),
        });
        Ok(())
    }

    /// Withdraw liquidity not currently lent out.
    pub fn withdraw(
        &mut self,
        asset_id: AssetId,
        amount: u64,
        now: u64,
    ) -> Result<(), LendingError> {
        let reserve = self.load_reserve(&asset_id)?;
        let outcome =
            transition::verify_and_apply(Operation::Withdraw { amount }, &reserve, None, &[], now)?;

        self.reserves.set(&asset_id, outcome.reserve);
        self.env().emit_event(LiquidityWithdrawn { asset_id, amount });
        Ok(())
    }

    // =======================================================================
    // POSITION OPERATIONS
    // =======================================================================

    /// Borrow against collateral, opening a new position.
    ///
    /// Feeds for both the borrowed and the collateral asset must be supplied
    /// and verify; the borrow value is bounded by the reserve's loan-to-value
    /// fraction of the collateral value. Returns the new position id.
    pub fn borrow(
        &mut self,
        asset_id: AssetId,
        collateral_asset_id: AssetId,
        collateral_amount: u64,
        amount: u64,
        feeds: Vec<PriceFeed>,
        now: u64,
    ) -> Result<u64, LendingError> {
        let reserve = self.load_reserve(&asset_id)?;
        let prices = self.verify_feeds(&feeds, now)?;
        let position_id = self.next_position_id.get_or_default();
        let owner = self.env().caller();

        let outcome = transition::verify_and_apply(
            Operation::Borrow {
                owner,
                position_id,
                collateral_asset_id,
                collateral_amount,
                amount,
            },
            &reserve,
            None,
            &prices,
            now,
        )?;

        self.next_position_id.set(position_id + 1);
        self.reserves.set(&asset_id, outcome.reserve);
        if let Some(position) = outcome.position {
            self.positions.set(&position_id, position);
        }
        self.env().emit_event(PositionOpened {
            position_id,
            owner,
            borrowed_asset_id: asset_id,
            amount,
        });
        Ok(position_id)
    }

    /// Repay debt on a position. Overpayment settles exactly the current
    /// debt; settling it all closes the position. Returns the settled amount.
    pub fn repay(&mut self, position_id: u64, amount: u64, now: u64) -> Result<u64, LendingError> {
        let position = self.load_position(position_id)?;
        let reserve = self.load_reserve(&position.borrowed_asset_id)?;

        let outcome = transition::verify_and_apply(
            Operation::Repay { amount },
            &reserve,
            Some(&position),
            &[],
            now,
        )?;

        let result = match outcome.receipt {
            Receipt::Repaid(result) => result,
            _ => return Err(LendingError::InvalidAmount),
        };
        self.reserves.set(&position.borrowed_asset_id, outcome.reserve);
        if let Some(next) = outcome.position {
            self.positions.set(&position_id, next);
        }
        self.env().emit_event(DebtRepaid {
            position_id,
            settle_amount: result.settle_amount,
            remaining_debt: result.remaining_debt,
        });
        Ok(result.settle_amount)
    }

    /// Liquidate an unhealthy position.
    ///
    /// `repay_amount` of zero covers the close-factor maximum. Returns the
    /// collateral seized.
    pub fn liquidate(
        &mut self,
        position_id: u64,
        repay_amount: u64,
        feeds: Vec<PriceFeed>,
        now: u64,
    ) -> Result<u64, LendingError> {
        let position = self.load_position(position_id)?;
        let reserve = self.load_reserve(&position.borrowed_asset_id)?;
        let prices = self.verify_feeds(&feeds, now)?;

        let outcome = transition::verify_and_apply(
            Operation::Liquidate { repay_amount },
            &reserve,
            Some(&position),
            &prices,
            now,
        )?;

        let result = match outcome.receipt {
            Receipt::Liquidated(result) => result,
            _ => return Err(LendingError::InvalidAmount),
        };
        self.reserves.set(&position.borrowed_asset_id, outcome.reserve);
        if let Some(next) = outcome.position {
            self.positions.set(&position_id, next);
        }
        self.env().emit_event(PositionLiquidated {
            position_id,
            settle_amount: result.settle_amount,
            collateral_seized: result.collateral_seized,
            remaining_debt: result.remaining_debt,
        });
        Ok(result.collateral_seized)
    }

    // =======================================================================
    // QUERIES
    // =======================================================================

    /// Latest committed reserve snapshot.
    pub fn get_reserve(&self, asset_id: AssetId) -> Result<Reserve, LendingError> {
        self.load_reserve(&asset_id)
    }

    /// Latest committed position snapshot, closed positions included.
    pub fn get_position(&self, position_id: u64) -> Result<DebtPosition, LendingError> {
        self.load_position(position_id)
    }

    /// Current utilization of a reserve.
    pub fn utilization_rate(&self, asset_id: AssetId) -> Result<Rate, LendingError> {
        self.load_reserve(&asset_id)?.utilization_rate()
    }

    /// A position's debt with interest accrued to `now`, without committing
    /// the accrual.
    pub fn current_debt(&self, position_id: u64, now: u64) -> Result<u64, LendingError> {
        let position = self.load_position(position_id)?;
        let mut reserve = self.load_reserve(&position.borrowed_asset_id)?;
        reserve.accrue(now)?;
        position.current_debt(reserve.variable_borrow_index)
    }

    /// A position's health factor against fresh verified prices.
    pub fn health_factor(
        &self,
        position_id: u64,
        feeds: Vec<PriceFeed>,
        now: u64,
    ) -> Result<Decimal, LendingError> {
        let position = self.load_position(position_id)?;
        let mut reserve = self.load_reserve(&position.borrowed_asset_id)?;
        reserve.accrue(now)?;

        let prices = self.verify_feeds(&feeds, now)?;
        let collateral_price = transition::find_price(&prices, &position.collateral_asset_id)?;
        let debt_price = transition::find_price(&prices, &position.borrowed_asset_id)?;
        transition::health_factor(&position, &reserve, collateral_price, debt_price)
    }

    /// Whether a key is currently approved for feed signing.
    pub fn is_oracle_key_approved(&self, public_key: PublicKey) -> bool {
        self.oracle_keys.get(&public_key).unwrap_or(false)
    }

    // =======================================================================
    // INTERNAL
    // =======================================================================

    fn require_owner(&self) -> Result<(), LendingError> {
        let owner = self.owner.get().ok_or(LendingError::Unauthorized)?;
        if self.env().caller() != owner {
            return Err(LendingError::Unauthorized);
        }
        Ok(())
    }

    fn load_reserve(&self, asset_id: &AssetId) -> Result<Reserve, LendingError> {
        self.reserves.get(asset_id).ok_or(LendingError::ReserveNotFound)
    }

    fn load_position(&self, position_id: u64) -> Result<DebtPosition, LendingError> {
        self.positions
            .get(&position_id)
            .ok_or(LendingError::PositionNotFound)
    }

    /// Verify a batch of feeds: approved key, signature, freshness. Any
    /// failure rejects the whole batch.
    fn verify_feeds(
        &self,
        feeds: &[PriceFeed],
        now: u64,
    ) -> Result<Vec<OraclePrice>, LendingError> {
        let max_age = self
            .max_price_age_secs
            .get()
            .unwrap_or(oracle::DEFAULT_MAX_PRICE_AGE_SECS);
        let verifier = EnvSignatureVerifier { env: self.env() };

        let mut prices = Vec::with_capacity(feeds.len());
        for feed in feeds {
            if !self.oracle_keys.get(&feed.public_key).unwrap_or(false) {
                return Err(LendingError::InvalidOracleConfig);
            }
            prices.push(oracle::verify(feed, now, max_age, &verifier)?);
        }
        Ok(prices)
    }
}

/// Adapts the host signature check to the oracle verification seam.
struct EnvSignatureVerifier {
    env: Rc<ContractEnv>,
}

impl SignatureVerifier for EnvSignatureVerifier {
    fn verify_signature(&self, message: &[u8], signature: &Bytes, public_key: &PublicKey) -> bool {
        self.env
            .verify_signature(&Bytes::from(message.to_vec()), signature, public_key)
    }
}
