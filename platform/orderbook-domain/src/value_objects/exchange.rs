use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Poloniex,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Poloniex => "poloniex",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "poloniex" => Ok(Exchange::Poloniex),
            other => Err(format!("unsupported exchange: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Exchange;

    #[test]
    fn round_trips_identifier() {
        assert_eq!("poloniex".parse::<Exchange>().unwrap(), Exchange::Poloniex);
        assert_eq!(Exchange::Poloniex.to_string(), "poloniex");
        assert!("kraken".parse::<Exchange>().is_err());
    }
}
