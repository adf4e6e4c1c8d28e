//! Ranking row returned by a market data provider.
use serde::{Deserialize, Serialize};

/// One ranked market entity (a coin), read fresh on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Display name, e.g. `Bitcoin`.
    pub name: String,
    /// Upper-case symbol, e.g. `BTC`.
    pub symbol: String,
    /// Price in the quote currency (USD).
    pub price: f64,
    /// Percent change over the last 24 hours.
    pub change_24h: f64,
}

impl Entity {
    /// Creates a new entity row.
    pub fn new(name: &str, symbol: &str, price: f64, change_24h: f64) -> Self {
        Entity {
            name: String::from(name),
            symbol: String::from(symbol),
            price,
            change_24h,
        }
    }
}
