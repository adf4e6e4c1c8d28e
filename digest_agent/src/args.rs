//! Command-line and environment configuration of the agent.
//!
//! Every option can be given as a flag or through its environment variable. See
//! `main` for how the values are used.
use clap::Parser;
use digest_common::Destination;
use digest_common::net::{DEFAULT_CHANNEL, DEFAULT_PID_FILE, DEFAULT_PORT};
use digest_common::provider::ProviderKind;
use std::path::PathBuf;

/// Parsed configuration.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Bot API token.
    #[clap(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Port of the keep-alive HTTP listener.
    #[clap(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Broadcast destination: an `@channel` name or a numeric chat id.
    #[clap(long, env = "TELEGRAM_CHANNEL", default_value = DEFAULT_CHANNEL)]
    pub channel: Destination,

    /// Channel advertised in digest footers and the welcome message.
    #[clap(long, env = "PROMOTED_CHANNEL")]
    pub promoted_channel: Option<String>,

    /// CoinMarketCap API key.
    #[clap(long, env = "CMC_API_KEY", hide_env_values = true)]
    pub cmc_api_key: Option<String>,

    /// Market data provider.
    #[clap(long, env = "RANKING_PROVIDER", value_enum, default_value_t = ProviderKind::CoinMarketCap)]
    pub provider: ProviderKind,

    /// Single-instance marker file.
    #[clap(long, env = "DIGEST_PID_FILE", default_value = DEFAULT_PID_FILE)]
    pub pid_file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "digest_agent",
            "--token",
            "123:abc",
            "--port",
            "8080",
            "--channel",
            "@alerts",
            "--promoted-channel",
            "@airdrops",
            "--provider",
            "coingecko",
            "--pid-file",
            "/tmp/digest.pid",
        ])
        .unwrap();

        assert_eq!(args.token, "123:abc");
        assert_eq!(args.port, 8080);
        assert_eq!(args.channel, Destination::Channel("@alerts".into()));
        assert_eq!(args.promoted_channel.as_deref(), Some("@airdrops"));
        assert_eq!(args.provider, ProviderKind::CoinGecko);
        assert_eq!(args.pid_file, PathBuf::from("/tmp/digest.pid"));
    }

    #[test]
    fn rejects_malformed_channel() {
        let result = Args::try_parse_from(["digest_agent", "--token", "t", "--channel", "no at sign"]);
        assert!(result.is_err());
    }
}
