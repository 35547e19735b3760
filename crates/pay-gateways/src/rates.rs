//! Exchange Rates
//!
//! USD reference rates for crypto-denominated intents. The fixed table
//! mirrors deploy-time configuration and is not an oracle; a production
//! deployment implements [`RateSource`] against a trusted price feed.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use pay_core::{PayError, Result};

use crate::crypto::CryptoAsset;

/// Display precision for crypto amounts
const CRYPTO_DECIMALS: u32 = 8;

/// Point-in-time USD rate lookup
#[async_trait]
pub trait RateSource: Send + Sync {
    /// USD per one unit of the asset
    async fn rate_usd(&self, asset: CryptoAsset) -> Result<Decimal>;
}

/// Static rate table
pub struct FixedRateTable {
    rates: HashMap<CryptoAsset, Decimal>,
}

impl FixedRateTable {
    pub fn new(rates: impl IntoIterator<Item = (CryptoAsset, Decimal)>) -> Self {
        Self {
            rates: rates.into_iter().collect(),
        }
    }

    /// Reference table used by the mock deployment
    pub fn builtin() -> Self {
        Self::new([
            (CryptoAsset::Eth, dec!(3000)),
            (CryptoAsset::UsdcEth, dec!(1)),
            (CryptoAsset::Btc, dec!(60000)),
            (CryptoAsset::SolUsdc, dec!(1)),
        ])
    }
}

impl Default for FixedRateTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[async_trait]
impl RateSource for FixedRateTable {
    async fn rate_usd(&self, asset: CryptoAsset) -> Result<Decimal> {
        self.rates
            .get(&asset)
            .copied()
            .ok_or_else(|| PayError::UnsupportedAsset(asset.as_str().to_string()))
    }
}

/// Convert a USD price into an asset amount at 8-decimal precision
pub fn crypto_amount(price_usd: Decimal, rate_usd: Decimal) -> Result<Decimal> {
    if rate_usd <= Decimal::ZERO {
        return Err(PayError::Config(format!("non-positive rate {}", rate_usd)));
    }
    Ok((price_usd / rate_usd).round_dp(CRYPTO_DECIMALS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_rates() {
        let rates = FixedRateTable::builtin();
        assert_eq!(rates.rate_usd(CryptoAsset::Btc).await.unwrap(), dec!(60000));
        assert_eq!(rates.rate_usd(CryptoAsset::UsdcEth).await.unwrap(), dec!(1));
    }

    #[tokio::test]
    async fn test_missing_rate_is_unsupported_asset() {
        let rates = FixedRateTable::new([]);
        let err = rates.rate_usd(CryptoAsset::Eth).await.unwrap_err();
        assert!(matches!(err, PayError::UnsupportedAsset(a) if a == "ETH"));
    }

    #[test]
    fn test_eight_decimal_precision() {
        // $10.00 at 60000 USD/BTC
        let amount = crypto_amount(dec!(10.00), dec!(60000)).unwrap();
        assert_eq!(amount.to_string(), "0.00016667");
    }

    #[test]
    fn test_stablecoin_amount_is_exact() {
        let amount = crypto_amount(dec!(5.00), dec!(1)).unwrap();
        assert_eq!(amount, dec!(5.00));
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(crypto_amount(dec!(10), Decimal::ZERO).is_err());
    }
}
