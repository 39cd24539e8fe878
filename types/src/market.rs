use std::str::FromStr;

use garde::Validate;
use regex::Regex;
use serde::{de::Visitor, Deserialize, Serialize};

use crate::Error;

/// Exchange market code such as `KRW-ETH`: quote currency, then base currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Validate)]
pub struct Market(#[garde(length(min = 3, max = 32))] String);

impl Market {
    pub fn as_str(&self) -> &str {
        return &self.0;
    }
}

impl FromStr for Market {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_uppercase();
        let market = Market(value);

        market
            .validate(&())
            .map_err(|err| Error::MarketError(format!("{s}: {err}")))?;
        let regex = Regex::new(r"^([A-Z0-9]+)-([A-Z0-9]+)$")
            .map_err(|err| Error::MarketError(err.to_string()))?;
        if !regex.is_match(market.as_str()) {
            return Err(Error::MarketError(format!(
                "{s}: expected the format 'QUOTE-BASE', e.g. 'KRW-ETH'"
            )));
        }
        return Ok(market);
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "{}", self.0);
    }
}

impl Serialize for Market {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        return serializer.serialize_str(self.as_str());
    }
}

struct MarketVisitor;

impl<'de> Visitor<'de> for MarketVisitor {
    type Value = Market;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        return formatter.write_str("a market code in the format 'QUOTE-BASE', e.g. 'KRW-ETH'");
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        return Market::from_str(v).map_err(E::custom);
    }
}

impl<'de> Deserialize<'de> for Market {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        return deserializer.deserialize_string(MarketVisitor);
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::Market;

    #[test]
    fn parsing() {
        let market = Market::from_str("KRW-ETH").expect("KRW-ETH should be valid");
        assert_eq!(market.as_str(), "KRW-ETH");

        let market = Market::from_str(" krw-btc ").expect("lowercase input should be normalized");
        assert_eq!(market.as_str(), "KRW-BTC");

        Market::from_str("KRWETH").expect_err("missing separator should not be valid");
        Market::from_str("KRW-").expect_err("missing base should not be valid");
        Market::from_str("-ETH").expect_err("missing quote should not be valid");
        Market::from_str("KRW-ETH-X").expect_err("extra segment should not be valid");
        Market::from_str(&format!("KRW-{}", "E".repeat(40)))
            .expect_err("overlong market should not be valid");
    }

    #[test]
    fn serde() {
        let market: Market = serde_json::from_str("\"KRW-ETH\"").expect("should deserialize");
        assert_eq!(market.to_string(), "KRW-ETH");
        assert_eq!(
            serde_json::to_string(&market).expect("should serialize"),
            "\"KRW-ETH\""
        );
        serde_json::from_str::<Market>("\"nope\"").expect_err("invalid market should not deserialize");
    }
}
