use std::time::Duration;

use clap::{Parser, ValueEnum};
use courtside_sync::{Backoff, DEFAULT_STREAM_PATH, Endpoint, EndpointError, SupervisorConfig};

pub const DEFAULT_LOG_FILTER: &str = "info,courtside=debug";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "courtside",
    about = "Follow live match scores from the match server",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "COURTSIDE_ORIGIN",
        default_value = "http://localhost:8000",
        help = "Origin the match server is hosted at; picks ws or wss and the REST base"
    )]
    pub origin: String,

    #[arg(
        long,
        env = "COURTSIDE_STREAM_PATH",
        default_value = DEFAULT_STREAM_PATH,
        help = "Path of the match stream on the origin"
    )]
    pub stream_path: String,

    #[arg(
        long,
        env = "COURTSIDE_RECONNECT_DELAY_MS",
        default_value_t = 3000,
        help = "Delay before each reconnection attempt (base delay for exponential backoff)"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long,
        env = "COURTSIDE_MAX_RECONNECT_ATTEMPTS",
        default_value_t = 5,
        help = "Consecutive failed reconnections before giving up"
    )]
    pub max_reconnect_attempts: u32,

    #[arg(
        long,
        env = "COURTSIDE_CONNECT_TIMEOUT_MS",
        default_value_t = 10_000,
        help = "Give up on a connection attempt that has not opened after this long"
    )]
    pub connect_timeout_ms: u64,

    #[arg(
        long,
        value_enum,
        env = "COURTSIDE_BACKOFF",
        default_value_t = BackoffKind::Fixed
    )]
    pub backoff: BackoffKind,

    #[arg(
        long,
        env = "COURTSIDE_BACKOFF_MAX_MS",
        default_value_t = 30_000,
        help = "Upper bound for exponential backoff delays"
    )]
    pub backoff_max_ms: u64,

    #[arg(
        long,
        env = "COURTSIDE_CHAT_ID",
        help = "Only load live matches registered from this chat"
    )]
    pub chat_id: Option<i64>,

    #[arg(long, help = "Exit once reconnection attempts are exhausted")]
    pub exit_on_failure: bool,

    #[arg(long, help = "Print prometheus metrics to stdout on exit")]
    pub print_metrics: bool,

    #[arg(long, env = "RUST_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

impl Cli {
    pub fn backoff(&self) -> Backoff {
        let delay = Duration::from_millis(self.reconnect_delay_ms);
        match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(delay),
            BackoffKind::Exponential => Backoff::Exponential {
                base: delay,
                max: Duration::from_millis(self.backoff_max_ms).max(delay),
                jitter: true,
            },
        }
    }

    pub fn supervisor_config(&self) -> Result<SupervisorConfig, EndpointError> {
        let endpoint = Endpoint::from_origin(&self.origin)?.with_path(self.stream_path.clone());
        Ok(SupervisorConfig::new(endpoint)
            .with_backoff(self.backoff())
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms)))
    }

    /// REST base on the same origin as the stream, `https` exactly when the
    /// stream is `wss`.
    pub fn api_base(&self) -> Result<String, EndpointError> {
        let endpoint = Endpoint::from_origin(&self.origin)?;
        Ok(format!("{}/api", endpoint.http_origin()))
    }
}
