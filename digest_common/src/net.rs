//! Endpoints, ports and timing constants used by the agent.
use std::time::Duration;

/// Default port of the keep-alive HTTP listener.
pub const DEFAULT_PORT: u16 = 3000;
/// Default broadcast channel.
pub const DEFAULT_CHANNEL: &str = "@cryptoprices254";
/// Default instance marker path, relative to the working directory.
pub const DEFAULT_PID_FILE: &str = "bot.pid";

/// Messaging API base URL; the bot token is appended as `/bot<token>/<method>`.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
/// CoinMarketCap latest listings endpoint.
pub const COINMARKETCAP_URL: &str =
    "https://pro-api.coinmarketcap.com/v1/cryptocurrency/listings/latest";
/// CoinGecko markets endpoint.
pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/coins/markets";

/// Page size requested from the provider (before filtering).
pub const REQUEST_LIMIT: usize = 10;
/// Number of rows shown in a digest.
pub const DISPLAY_COUNT: usize = 5;
/// Stable-value asset that is never shown.
pub const EXCLUDED_SYMBOL: &str = "USDT";
/// Provider request timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Period of conversation subscriptions and of the broadcast job.
pub const JOB_PERIOD: Duration = Duration::from_secs(120);
/// Delay of the first digest after `/start`.
pub const FIRST_DELIVERY_DELAY: Duration = Duration::from_secs(3);

/// Long-poll timeout passed to `getUpdates`, in seconds.
pub const LONG_POLL_SECS: u64 = 10;
/// Pause between two `getUpdates` calls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Conflict recovery: pause after the first stop.
pub const RECOVERY_FIRST_DELAY: Duration = Duration::from_secs(1);
/// Conflict recovery: pause after the second stop, before resuming.
pub const RECOVERY_SECOND_DELAY: Duration = Duration::from_secs(2);

/// Helper to format a bind address like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}
