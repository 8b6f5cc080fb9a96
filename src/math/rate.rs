//! Rate type for interest rate calculations using U256

use {
    crate::{
        error::LendingError,
        math::{common::*, Decimal, TryDiv},
    },
    alloc::{format, string::ToString},
    core::fmt,
    odra::casper_types::U256,
};

/// Interest rate (or fraction of RAY) as a scaled value.
///
/// Annual rates are converted to per-second rates with [`Rate::try_per_second`];
/// accrual uses the linear growth factor `RAY + rate * dt`.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Eq, Ord)]
pub struct Rate(pub U256);

impl odra::casper_types::bytesrepr::ToBytes for Rate {
    fn to_bytes(&self) -> Result<alloc::vec::Vec<u8>, odra::casper_types::bytesrepr::Error> {
        self.0.to_bytes()
    }

    fn serialized_length(&self) -> usize {
        self.0.serialized_length()
    }
}

impl odra::casper_types::bytesrepr::FromBytes for Rate {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), odra::casper_types::bytesrepr::Error> {
        let (value, remainder) = U256::from_bytes(bytes)?;
        Ok((Rate(value), remainder))
    }
}

impl odra::casper_types::CLTyped for Rate {
    fn cl_type() -> odra::casper_types::CLType {
        odra::casper_types::CLType::U256
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl odra::schema::NamedCLTyped for Rate {
    fn ty() -> odra::schema::casper_contract_schema::NamedCLType {
        odra::schema::casper_contract_schema::NamedCLType::U256
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl odra::schema::SchemaCustomTypes for Rate {}

impl Rate {
    /// One (100%)
    pub fn one() -> Self {
        Self(Self::ray())
    }

    /// Zero (0%)
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    fn ray() -> U256 {
        U256::from(RAY)
    }

    /// Create rate from percent value (0-100)
    pub fn from_percent(percent: u8) -> Self {
        Self(U256::from(percent as u128 * PERCENT_SCALER))
    }

    /// Return raw scaled value as u128
    pub fn to_scaled_val(&self) -> u128 {
        self.0.as_u128()
    }

    /// Create rate from scaled value
    pub fn from_scaled_val(scaled_val: u128) -> Self {
        Self(U256::from(scaled_val))
    }

    /// Convert an annual rate into a per-second rate.
    pub fn try_per_second(self) -> Result<Self, LendingError> {
        self.try_div(SECONDS_PER_YEAR)
    }

    /// Linear growth factor over `dt` seconds: `1 + rate * dt` in RAY.
    ///
    /// The product `rate * dt` is exact in U256; the caller multiplies an
    /// index by the returned factor to accrue interest.
    pub fn linear_growth(self, dt: u64) -> Result<Decimal, LendingError> {
        let rate_delta = self
            .0
            .checked_mul(U256::from(dt))
            .ok_or(LendingError::MathOverflow)?;
        let factor = Self::ray()
            .checked_add(rate_delta)
            .ok_or(LendingError::MathOverflow)?;
        Ok(Decimal(factor))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scaled_val = self.0.to_string();
        if scaled_val.len() <= SCALE {
            let padding = "0".repeat(SCALE - scaled_val.len());
            scaled_val = format!("0.{}{}", padding, scaled_val);
        } else {
            scaled_val.insert(scaled_val.len() - SCALE, '.');
        }
        f.write_str(&scaled_val)
    }
}

impl From<u64> for Rate {
    fn from(val: u64) -> Self {
        Self(Self::ray() * U256::from(val))
    }
}

impl From<Decimal> for Rate {
    fn from(decimal: Decimal) -> Self {
        Self(decimal.0)
    }
}

impl crate::math::TryAdd for Rate {
    fn try_add(self, rhs: Self) -> Result<Self, LendingError> {
        Ok(Self(
            self.0.checked_add(rhs.0).ok_or(LendingError::MathOverflow)?,
        ))
    }
}

impl crate::math::TrySub for Rate {
    fn try_sub(self, rhs: Self) -> Result<Self, LendingError> {
        Ok(Self(
            self.0.checked_sub(rhs.0).ok_or(LendingError::MathOverflow)?,
        ))
    }
}

impl crate::math::TryDiv<u64> for Rate {
    fn try_div(self, rhs: u64) -> Result<Self, LendingError> {
        if rhs == 0 {
            return Err(LendingError::DivisionByZero);
        }
        // round-half-up against the raw divisor
        let half = U256::from(rhs / 2);
        Ok(Self(
            self.0.checked_add(half).ok_or(LendingError::MathOverflow)? / U256::from(rhs),
        ))
    }
}

impl crate::math::TryDiv<Rate> for Rate {
    fn try_div(self, rhs: Self) -> Result<Self, LendingError> {
        if rhs.0.is_zero() {
            return Err(LendingError::DivisionByZero);
        }
        let half_rhs = rhs.0 / U256::from(2u64);
        Ok(Self(
            self.0
                .checked_mul(Self::ray())
                .ok_or(LendingError::MathOverflow)?
                .checked_add(half_rhs)
                .ok_or(LendingError::MathOverflow)?
                / rhs.0,
        ))
    }
}

impl crate::math::TryMul<u64> for Rate {
    fn try_mul(self, rhs: u64) -> Result<Self, LendingError> {
        Ok(Self(
            self.0.checked_mul(U256::from(rhs)).ok_or(LendingError::MathOverflow)?,
        ))
    }
}

impl crate::math::TryMul<Rate> for Rate {
    fn try_mul(self, rhs: Self) -> Result<Self, LendingError> {
        Ok(Self(
            self.0
                .checked_mul(rhs.0)
                .ok_or(LendingError::MathOverflow)?
                .checked_add(U256::from(HALF_RAY))
                .ok_or(LendingError::MathOverflow)?
                / Self::ray(),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::TryMul;

    #[test]
    fn test_rate_percent() {
        let rate = Rate::from_percent(5);
        assert_eq!(rate.to_scaled_val(), 50_000_000_000_000_000_000_000_000);
    }

    #[test]
    fn per_second_of_annual() {
        // 2% annual over a year of seconds recovers ~2% when re-multiplied
        let annual = Rate::from_percent(2);
        let per_sec = annual.try_per_second().unwrap();
        let back = per_sec.try_mul(SECONDS_PER_YEAR).unwrap();
        let diff = if annual.0 > back.0 {
            annual.0 - back.0
        } else {
            back.0 - annual.0
        };
        assert!(diff <= U256::from(SECONDS_PER_YEAR));
    }

    #[test]
    fn linear_growth_identity_at_zero_dt() {
        let rate = Rate::from_percent(10);
        assert_eq!(rate.linear_growth(0).unwrap(), Decimal::one());
    }

    #[test]
    fn linear_growth_one_day() {
        // growth factor = 1 + rate * dt, exact
        let per_sec = Rate::from_scaled_val(1_000_000_000_000);
        let factor = per_sec.linear_growth(86_400).unwrap();
        assert_eq!(
            factor.to_scaled_val(),
            RAY + 1_000_000_000_000u128 * 86_400
        );
    }
}
