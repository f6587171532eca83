//! Asset types and their probi scaling.
//!
//! All amounts in this workspace are held in **probi**, the smallest
//! indivisible unit of an asset. A human-readable amount is converted with
//! [`AltCurrency::to_probi`]; e.g. `1 BAT == 10^18 probi`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An asset a wallet or grant can be denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AltCurrency {
    Bat,
    Btc,
    Eth,
    Ltc,
    Usd,
    Eur,
}

impl AltCurrency {
    /// Number of decimal places between one unit and one probi.
    #[must_use]
    pub fn scale(self) -> u32 {
        match self {
            Self::Bat | Self::Eth => 18,
            Self::Btc | Self::Ltc => 8,
            Self::Usd | Self::Eur => 2,
        }
    }

    /// `10^scale` as a decimal.
    #[must_use]
    pub fn scale_factor(self) -> Decimal {
        Decimal::from(10u64.pow(self.scale()))
    }

    /// Convert whole units (possibly fractional) to probi.
    ///
    /// Saturates at [`Decimal::MAX`] instead of overflowing.
    #[must_use]
    pub fn to_probi(self, units: Decimal) -> Decimal {
        self.checked_to_probi(units).unwrap_or(Decimal::MAX)
    }

    /// [`Self::to_probi`], or `None` if the result does not fit.
    #[must_use]
    pub fn checked_to_probi(self, units: Decimal) -> Option<Decimal> {
        units.checked_mul(self.scale_factor())
    }

    /// Convert probi back to whole units.
    #[must_use]
    pub fn from_probi(self, probi: Decimal) -> Decimal {
        probi / self.scale_factor()
    }

    /// Upper-case ticker code, as used on the wire.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Bat => "BAT",
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Ltc => "LTC",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl fmt::Display for AltCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AltCurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BAT" => Ok(Self::Bat),
            "BTC" => Ok(Self::Btc),
            "ETH" => Ok(Self::Eth),
            "LTC" => Ok(Self::Ltc),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            other => Err(format!("unknown altcurrency: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bat_has_eighteen_decimals() {
        let one = AltCurrency::Bat.to_probi(Decimal::ONE);
        assert_eq!(one, Decimal::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn oversized_amount_does_not_fit() {
        assert_eq!(AltCurrency::Bat.checked_to_probi(Decimal::MAX), None);
        assert_eq!(AltCurrency::Bat.to_probi(Decimal::MAX), Decimal::MAX);
        assert_eq!(
            AltCurrency::Usd.checked_to_probi(Decimal::from(3)),
            Some(Decimal::from(300))
        );
    }

    #[test]
    fn to_probi_and_back() {
        let units = Decimal::new(255, 1); // 25.5
        let probi = AltCurrency::Btc.to_probi(units);
        assert_eq!(probi, Decimal::from(2_550_000_000u64));
        assert_eq!(AltCurrency::Btc.from_probi(probi), units);
    }

    #[test]
    fn to_probi_saturates() {
        assert_eq!(AltCurrency::Bat.to_probi(Decimal::MAX), Decimal::MAX);
    }

    #[test]
    fn wire_code_is_upper_case() {
        assert_eq!(serde_json::to_string(&AltCurrency::Bat).unwrap(), "\"BAT\"");
        let eth: AltCurrency = serde_json::from_str("\"ETH\"").unwrap();
        assert_eq!(eth, AltCurrency::Eth);
        assert!(serde_json::from_str::<AltCurrency>("\"bat\"").is_err());
    }

    #[test]
    fn parse_matches_display() {
        for c in [
            AltCurrency::Bat,
            AltCurrency::Btc,
            AltCurrency::Eth,
            AltCurrency::Ltc,
            AltCurrency::Usd,
            AltCurrency::Eur,
        ] {
            assert_eq!(c.to_string().parse::<AltCurrency>().unwrap(), c);
        }
        assert!("DOGE".parse::<AltCurrency>().is_err());
    }
}
