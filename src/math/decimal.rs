//! RAY-scaled decimal values backed by U256.

#![allow(clippy::assign_op_pattern)]
#![allow(clippy::manual_range_contains)]
#![allow(missing_docs)]

use {
    crate::{error::LendingError, math::common::*},
    alloc::{string::ToString, vec},
    core::fmt,
    odra::casper_types::U256,
};

/// Non-negative fixed-point value, precise to 27 digits.
///
/// Multiplication rounds half-up: `(a * b + RAY/2) / RAY`. Division rounds
/// toward the nearest representable value: `(a * RAY + b/2) / b`. Both keep
/// the full product in U256 before scaling down.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Eq, Ord)]
pub struct Decimal(pub U256);

// Manual Odra implementations, since the inner value is a raw U256.
impl odra::casper_types::bytesrepr::ToBytes for Decimal {
    fn to_bytes(&self) -> Result<alloc::vec::Vec<u8>, odra::casper_types::bytesrepr::Error> {
        self.0.to_bytes()
    }

    fn serialized_length(&self) -> usize {
        self.0.serialized_length()
    }
}

impl odra::casper_types::bytesrepr::FromBytes for Decimal {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), odra::casper_types::bytesrepr::Error> {
        let (value, remainder) = U256::from_bytes(bytes)?;
        Ok((Decimal(value), remainder))
    }
}

impl odra::casper_types::CLTyped for Decimal {
    fn cl_type() -> odra::casper_types::CLType {
        odra::casper_types::CLType::U256
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl odra::schema::NamedCLTyped for Decimal {
    fn ty() -> odra::schema::casper_contract_schema::NamedCLType {
        odra::schema::casper_contract_schema::NamedCLType::U256
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl odra::schema::SchemaCustomTypes for Decimal {}

impl Decimal {
    /// One
    pub fn one() -> Self {
        Self(Self::ray())
    }

    /// Zero
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub(crate) fn ray() -> U256 {
        U256::from(RAY)
    }

    fn half_ray() -> U256 {
        U256::from(HALF_RAY)
    }

    /// Create scaled decimal from percent value
    pub fn from_percent(percent: u8) -> Self {
        Self(U256::from(percent as u128 * PERCENT_SCALER))
    }

    /// Return raw scaled value as u128 (assumes value fits into u128)
    #[allow(clippy::wrong_self_convention)]
    pub fn to_scaled_val(&self) -> u128 {
        self.0.as_u128()
    }

    /// Create decimal from scaled value
    pub fn from_scaled_val(scaled_val: u128) -> Self {
        Self(U256::from(scaled_val))
    }

    /// Round scaled decimal to u64
    pub fn try_round_u64(&self) -> Result<u64, LendingError> {
        let rounded_val = Self::half_ray()
            .checked_add(self.0)
            .ok_or(LendingError::MathOverflow)?
            .checked_div(Self::ray())
            .ok_or(LendingError::MathOverflow)?;

        if rounded_val > U256::from(u64::MAX) {
            return Err(LendingError::MathOverflow);
        }
        Ok(rounded_val.as_u64())
    }

    /// Ceiling scaled decimal to u64
    pub fn try_ceil_u64(&self) -> Result<u64, LendingError> {
        let ceil_val = Self::ray()
            .checked_sub(U256::from(1u64))
            .ok_or(LendingError::MathOverflow)?
            .checked_add(self.0)
            .ok_or(LendingError::MathOverflow)?
            .checked_div(Self::ray())
            .ok_or(LendingError::MathOverflow)?;

        if ceil_val > U256::from(u64::MAX) {
            return Err(LendingError::MathOverflow);
        }
        Ok(ceil_val.as_u64())
    }

    /// Floor scaled decimal to u64
    pub fn try_floor_u64(&self) -> Result<u64, LendingError> {
        let floor_val = self
            .0
            .checked_div(Self::ray())
            .ok_or(LendingError::MathOverflow)?;

        if floor_val > U256::from(u64::MAX) {
            return Err(LendingError::MathOverflow);
        }
        Ok(floor_val.as_u64())
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scaled_val = self.0.to_string();
        if scaled_val.len() <= SCALE {
            scaled_val.insert_str(0, &vec!["0"; SCALE - scaled_val.len()].join(""));
            scaled_val.insert_str(0, "0.");
        } else {
            scaled_val.insert(scaled_val.len() - SCALE, '.');
        }
        f.write_str(&scaled_val)
    }
}

impl From<u64> for Decimal {
    fn from(val: u64) -> Self {
        Self(Self::ray() * U256::from(val))
    }
}

impl From<u128> for Decimal {
    fn from(val: u128) -> Self {
        // 10^27 * u128::MAX < 2^256, the widening product cannot overflow
        Self(Self::ray() * U256::from(val))
    }
}

impl From<crate::math::Rate> for Decimal {
    fn from(rate: crate::math::Rate) -> Self {
        Self(rate.0)
    }
}

impl crate::math::TryAdd for Decimal {
    fn try_add(self, rhs: Self) -> Result<Self, LendingError> {
        Ok(Self(
            self.0.checked_add(rhs.0).ok_or(LendingError::MathOverflow)?,
        ))
    }
}

impl crate::math::TrySub for Decimal {
    fn try_sub(self, rhs: Self) -> Result<Self, LendingError> {
        Ok(Self(
            self.0.checked_sub(rhs.0).ok_or(LendingError::MathOverflow)?,
        ))
    }
}

impl crate::math::TryDiv<u64> for Decimal {
    fn try_div(self, rhs: u64) -> Result<Self, LendingError> {
        if rhs == 0 {
            return Err(LendingError::DivisionByZero);
        }
        Ok(Self(
            self.0.checked_div(U256::from(rhs)).ok_or(LendingError::MathOverflow)?,
        ))
    }
}

impl crate::math::TryDiv<Decimal> for Decimal {
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

impl crate::math::TryDiv<crate::math::Rate> for Decimal {
    fn try_div(self, rhs: crate::math::Rate) -> Result<Self, LendingError> {
        use crate::math::TryDiv;
        self.try_div(Decimal::from(rhs))
    }
}

impl crate::math::TryMul<u64> for Decimal {
    fn try_mul(self, rhs: u64) -> Result<Self, LendingError> {
        Ok(Self(
            self.0.checked_mul(U256::from(rhs)).ok_or(LendingError::MathOverflow)?,
        ))
    }
}

impl crate::math::TryMul<Decimal> for Decimal {
    fn try_mul(self, rhs: Self) -> Result<Self, LendingError> {
        Ok(Self(
            self.0
                .checked_mul(rhs.0)
                .ok_or(LendingError::MathOverflow)?
                .checked_add(Self::half_ray())
                .ok_or(LendingError::MathOverflow)?
                / Self::ray(),
        ))
    }
}

impl crate::math::TryMul<crate::math::Rate> for Decimal {
    fn try_mul(self, rhs: crate::math::Rate) -> Result<Self, LendingError> {
        use crate::math::TryMul;
        self.try_mul(Decimal::from(rhs))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{TryDiv, TryMul};

    #[test]
    fn test_scaler() {
        assert_eq!(U256::from(RAY), Decimal::ray());
    }

    #[test]
    fn mul_rounds_half_up() {
        // 2.0 * 3.0 == 6.0 exactly
        let six = Decimal::from(2u64).try_mul(Decimal::from(3u64)).unwrap();
        assert_eq!(six, Decimal::from(6u64));

        // smallest representable * one rounds to itself, not zero
        let eps = Decimal(U256::from(1u64));
        assert_eq!(eps.try_mul(Decimal::one()).unwrap(), eps);
    }

    #[test]
    fn div_by_zero_rejected() {
        let res = Decimal::one().try_div(Decimal::zero());
        assert_eq!(res, Err(LendingError::DivisionByZero));
    }

    #[test]
    fn rounding_law() {
        // ray_div(ray_mul(a, RAY), RAY) == a, exact for all a
        for raw in [0u128, 1, 7, RAY, RAY + 3, u64::MAX as u128] {
            let a = Decimal::from_scaled_val(raw);
            let roundtrip = a.try_mul(Decimal::one()).unwrap().try_div(Decimal::one()).unwrap();
            assert_eq!(roundtrip, a);
        }
    }

    #[test]
    fn display_places_point() {
        assert_eq!(Decimal::one().to_string(), "1.000000000000000000000000000");
        assert_eq!(
            Decimal::from_percent(50).to_string(),
            "0.500000000000000000000000000"
        );
    }
}
