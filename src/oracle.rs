//! Signed oracle price feeds and their verification.
//!
//! A raw [`PriceFeed`] is untrusted input. Only [`verify`] produces an
//! [`OraclePrice`], and every computation that consumes a price takes an
//! `OraclePrice` — there is no path from an unverified feed to a value
//! calculation.

use odra::casper_types::{bytesrepr::Bytes, PublicKey};
use odra::prelude::*;

use crate::error::LendingError;
use crate::math::{Decimal, TryMul};

/// Default maximum accepted feed age in seconds.
pub const DEFAULT_MAX_PRICE_AGE_SECS: u64 = 300;

/// Liquid asset identifier (32-byte tag).
pub type AssetId = [u8; 32];

/// An oracle price feed as received from a feed source, prior to any
/// verification.
#[odra::odra_type]
pub struct PriceFeed {
    /// Asset the price is quoted for.
    pub asset_id: AssetId,
    /// USD price, RAY precision.
    pub price: Decimal,
    /// Unix seconds at which the price was signed.
    pub timestamp: u64,
    /// Signature over [`PriceFeed::signed_payload`].
    pub signature: Bytes,
    /// Key the signature is checked against.
    pub public_key: PublicKey,
}

/// A price that passed signature and staleness checks.
#[odra::odra_type]
pub struct OraclePrice {
    /// Asset the price is quoted for.
    pub asset_id: AssetId,
    /// USD price, RAY precision.
    pub price: Decimal,
    /// Unix seconds at which the price was signed.
    pub timestamp: u64,
}

impl PriceFeed {
    /// The byte string the oracle signs: `asset_id || price || timestamp`,
    /// fixed-width little-endian.
    pub fn signed_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(32 + 16 + 8);
        payload.extend_from_slice(&self.asset_id);
        payload.extend_from_slice(&self.price.to_scaled_val().to_le_bytes());
        payload.extend_from_slice(&self.timestamp.to_le_bytes());
        payload
    }
}

/// Signature primitive matching the oracle's signing scheme.
///
/// The processor adapts the host signature check; tests substitute fakes.
pub trait SignatureVerifier {
    /// True when `signature` over `message` verifies under `public_key`.
    fn verify_signature(&self, message: &[u8], signature: &Bytes, public_key: &PublicKey) -> bool;
}

/// Validate a feed's authenticity and freshness.
///
/// Checks, in order: signature over the payload under the embedded key
/// (`InvalidSignature`), then `now - timestamp <= max_age_secs`
/// (`StalePrice`). A feed timestamped in the future is rejected as stale
/// rather than trusted.
pub fn verify<V: SignatureVerifier>(
    feed: &PriceFeed,
    now: u64,
    max_age_secs: u64,
    verifier: &V,
) -> Result<OraclePrice, LendingError> {
    let payload = feed.signed_payload();
    if !verifier.verify_signature(&payload, &feed.signature, &feed.public_key) {
        return Err(LendingError::InvalidSignature);
    }

    let age = now
        .checked_sub(feed.timestamp)
        .ok_or(LendingError::StalePrice)?;
    if age > max_age_secs {
        return Err(LendingError::StalePrice);
    }

    Ok(OraclePrice {
        asset_id: feed.asset_id,
        price: feed.price,
        timestamp: feed.timestamp,
    })
}

/// USD value of `amount` satoshis at `price`, RAY precision.
///
/// Both sides of every LTV and health-factor comparison go through this
/// helper, so the per-asset decimals factor cancels out.
pub fn usd_value(amount: u64, price: Decimal) -> Result<Decimal, LendingError> {
    Decimal::from(amount).try_mul(price)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::RAY;
    use alloc::vec;

    /// Accepts or rejects every signature unconditionally.
    struct FixedVerifier(bool);

    impl SignatureVerifier for FixedVerifier {
        fn verify_signature(&self, _m: &[u8], _s: &Bytes, _pk: &PublicKey) -> bool {
            self.0
        }
    }

    fn feed(timestamp: u64) -> PriceFeed {
        PriceFeed {
            asset_id: [7u8; 32],
            price: Decimal::from(60_000u64),
            timestamp,
            signature: Bytes::from(vec![0u8; 64]),
            public_key: test_key(),
        }
    }

    fn test_key() -> PublicKey {
        // opaque stand-in; the FixedVerifier never inspects it
        PublicKey::System
    }

    #[test]
    fn fresh_signed_feed_verifies() {
        let now = 1_700_000_000;
        let price = verify(&feed(now - 10), now, DEFAULT_MAX_PRICE_AGE_SECS, &FixedVerifier(true))
            .unwrap();
        assert_eq!(price.asset_id, [7u8; 32]);
        assert_eq!(price.price, Decimal::from(60_000u64));
    }

    #[test]
    fn bad_signature_rejected_before_staleness() {
        let now = 1_700_000_000;
        // feed is also stale; the signature failure must win
        let res = verify(&feed(now - 10_000), now, DEFAULT_MAX_PRICE_AGE_SECS, &FixedVerifier(false));
        assert_eq!(res.unwrap_err(), LendingError::InvalidSignature);
    }

    #[test]
    fn feed_older_than_max_age_is_stale() {
        let now = 1_700_000_000;
        let res = verify(&feed(now - 301), now, 300, &FixedVerifier(true));
        assert_eq!(res.unwrap_err(), LendingError::StalePrice);

        // exactly at the bound is still fresh
        assert!(verify(&feed(now - 300), now, 300, &FixedVerifier(true)).is_ok());
    }

    #[test]
    fn feed_from_the_future_is_stale() {
        let now = 1_700_000_000;
        let res = verify(&feed(now + 1), now, 300, &FixedVerifier(true));
        assert_eq!(res.unwrap_err(), LendingError::StalePrice);
    }

    #[test]
    fn usd_value_scales_by_price() {
        // 2 sats at $3 == $6 in RAY units
        let value = usd_value(2, Decimal::from(3u64)).unwrap();
        assert_eq!(value.to_scaled_val(), 6 * RAY);
    }
}
