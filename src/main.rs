use clap::Parser;
use tracing::{debug, error};

use magi_relay::config::RelayConfig;
use magi_relay::server::RelayServer;

/// Relay MAGI decision requests to agent worker processes over SSE
#[derive(Parser)]
#[command(name = "magi-relay")]
#[command(about = "Streams agent worker output back to clients as Server-Sent Events", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Address to bind (overrides MAGI_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides MAGI_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Worker executable (overrides MAGI_WORKER_COMMAND)
    #[arg(long)]
    worker_command: Option<String>,

    /// Worker argument, repeatable (overrides MAGI_WORKER_ARGS)
    #[arg(long = "worker-arg")]
    worker_args: Vec<String>,

    /// Wall-clock budget per worker invocation in milliseconds
    /// (overrides MAGI_PROCESS_TIMEOUT_MS; must be > 0)
    #[arg(long)]
    process_timeout_ms: Option<u64>,
}

impl Cli {
    fn apply(&self, mut config: RelayConfig) -> RelayConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(command) = &self.worker_command {
            config.worker_command = command.clone();
        }
        if !self.worker_args.is_empty() {
            config.worker_args = self.worker_args.clone();
        }
        match self.process_timeout_ms {
            Some(timeout) if timeout > 0 => config.process_timeout_ms = timeout,
            Some(timeout) => {
                tracing::warn!("ignoring non-positive --process-timeout-ms {timeout}");
            }
            None => {}
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    let config = cli.apply(RelayConfig::from_env());
    debug!("resolved configuration: {config:?}");

    if let Err(e) = RelayServer::new(config).serve().await {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
