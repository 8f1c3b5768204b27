pub mod currency_pair;
pub mod exchange;
pub mod trade;
