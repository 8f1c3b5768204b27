use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            _ => Err(format!("unsupported trade side: {value}")),
        }
    }
}

/// Single executed trade as reported by the exchange.
///
/// `id` is exchange-assigned and monotonic within a pair; `timestamp` is UTC
/// epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub timestamp: i64,
    pub side: TradeSide,
    pub rate: Decimal,
    pub volume: Decimal,
}

impl Trade {
    pub fn total_price(&self) -> Decimal {
        self.rate * self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::{Trade, TradeSide};
    use rust_decimal_macros::dec;

    #[test]
    fn total_price_is_rate_times_volume() {
        let trade = Trade {
            id: 7,
            timestamp: 1_500_000_000,
            side: TradeSide::Buy,
            rate: dec!(0.00007600),
            volume: dec!(140),
        };
        assert_eq!(trade.total_price(), dec!(0.01064));
    }

    #[test]
    fn side_parse_is_case_insensitive() {
        assert_eq!(TradeSide::parse("SELL").unwrap(), TradeSide::Sell);
        assert!(TradeSide::parse("short").is_err());
    }
}
