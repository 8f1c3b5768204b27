use std::fmt;

/// Ordered pair of asset symbols, e.g. `BTC/XRP`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Parses `<base><separator><quote>`. Symbols keep their case and the
    /// separator must appear exactly once.
    pub fn parse(value: &str, separator: &str) -> Result<Self, String> {
        if separator.is_empty() {
            return Err("empty currency pair separator".to_string());
        }
        if value.is_empty() {
            return Err("empty currency pair".to_string());
        }
        let Some((base, quote)) = value.split_once(separator) else {
            return Err(format!(
                "invalid currency pair {value:?}: missing separator {separator:?}"
            ));
        };
        if base.is_empty() || quote.is_empty() {
            return Err(format!("invalid currency pair {value:?}: empty symbol"));
        }
        if quote.contains(separator) {
            return Err(format!(
                "invalid currency pair {value:?}: separator {separator:?} appears more than once"
            ));
        }
        Ok(Self::new(base, quote))
    }

    pub fn concat(&self, separator: &str) -> String {
        format!("{}{}{}", self.base, separator, self.quote)
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
