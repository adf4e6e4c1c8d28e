//! Supported market data providers.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Ranking provider selectable from the command line or `RANKING_PROVIDER`.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    Hash,
    Eq,
    PartialEq,
)]
#[clap(rename_all = "lower")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    /// CoinMarketCap `listings/latest`, requires an API key.
    CoinMarketCap,
    /// CoinGecko `coins/markets`, keyless.
    CoinGecko,
}
