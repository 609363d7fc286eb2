use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use keygen::{AVAILABLE_SET, SetNames, TAKEN_SET};

/// Where the key pool is stored.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Redis or Valkey, reached through `REDIS_URL`.
    Redis,
    /// In-process sets. Nothing survives a restart.
    Memory,
}

/// Runtime configuration for the `keygen-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first if present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "keygen-tonic-server",
    version,
    about = "A gRPC service handing out short, unique, URL-safe keys"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:8080" or "/tmp/keygen.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Storage backend for the key pool.
    ///
    /// Environment variable: `KEY_BACKEND`
    #[arg(long, env = "KEY_BACKEND", value_enum, default_value_t = BackendKind::Redis)]
    pub backend: BackendKind,

    /// Redis/Valkey connection URL. Only used with `--backend redis`.
    ///
    /// Environment variable: `REDIS_URL`
    #[arg(long, env = "REDIS_URL", default_value_t = String::from("redis://localhost:6379"))]
    pub redis_url: String,

    /// Upper bound, in milliseconds, for a single backend call including
    /// connection setup.
    ///
    /// Environment variable: `BACKEND_TIMEOUT_MS`
    #[arg(long, env = "BACKEND_TIMEOUT_MS", default_value_t = 2_000)]
    pub backend_timeout_ms: u64,

    /// Pause, in milliseconds, between two keys added by the replenisher.
    ///
    /// Environment variable: `GENERATE_INTERVAL_MS`
    #[arg(long, env = "GENERATE_INTERVAL_MS", default_value_t = 1_000)]
    pub generate_interval_ms: u64,

    /// Number of replenisher events buffered for logging and metrics before
    /// the oldest are dropped.
    ///
    /// Environment variable: `EVENT_QUEUE_SIZE`
    #[arg(long, env = "EVENT_QUEUE_SIZE", default_value_t = 1_024)]
    pub event_queue_size: usize,

    /// Name of the set holding keys ready to be handed out.
    ///
    /// Environment variable: `AVAILABLE_SET`
    #[arg(long, env = "AVAILABLE_SET", default_value_t = String::from(AVAILABLE_SET))]
    pub available_set: String,

    /// Name of the set holding allocated keys.
    ///
    /// Environment variable: `TAKEN_SET`
    #[arg(long, env = "TAKEN_SET", default_value_t = String::from(TAKEN_SET))]
    pub taken_set: String,

    /// Seconds to wait for the replenisher to stop during shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub backend: BackendKind,
    pub redis_url: String,
    pub backend_timeout: Duration,
    pub generate_interval: Duration,
    pub event_queue_size: usize,
    pub sets: SetNames,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.backend_timeout_ms == 0 {
            bail!("BACKEND_TIMEOUT_MS must be greater than 0");
        }

        if args.generate_interval_ms == 0 {
            bail!("GENERATE_INTERVAL_MS must be greater than 0");
        }

        if args.event_queue_size == 0 {
            bail!("EVENT_QUEUE_SIZE must be greater than 0");
        }

        if args.shutdown_timeout == 0 {
            bail!("SHUTDOWN_TIMEOUT must be greater than 0");
        }

        if args.available_set.is_empty() || args.taken_set.is_empty() {
            bail!("AVAILABLE_SET and TAKEN_SET must not be empty");
        }

        if args.available_set == args.taken_set {
            bail!(
                "AVAILABLE_SET and TAKEN_SET must differ (both are {:?})",
                args.available_set
            );
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            backend: args.backend,
            redis_url: args.redis_url,
            backend_timeout: Duration::from_millis(args.backend_timeout_ms),
            generate_interval: Duration::from_millis(args.generate_interval_ms),
            event_queue_size: args.event_queue_size,
            sets: SetNames {
                available: args.available_set,
                taken: args.taken_set,
            },
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
