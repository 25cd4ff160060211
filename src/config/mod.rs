//! Relay configuration
//!
//! Configuration is resolved once at startup (environment first, CLI flags
//! on top) and injected into the server; nothing reads the environment at
//! request time. Invalid values fall back to defaults with a logged warning
//! rather than aborting startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::relay::SessionConfig;
use crate::subprocess::WorkerCommandBuilder;

pub const DEFAULT_WORKER_COMMAND: &str = "python3";
pub const DEFAULT_WORKER_ARGS: &[&str] = &["magi_executor.py"];
/// Wall-clock budget for one worker invocation. Agent runs fan out to
/// several model calls, so the default is generous.
pub const DEFAULT_PROCESS_TIMEOUT_MS: u64 = 180_000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

const ENV_WORKER_COMMAND: &str = "MAGI_WORKER_COMMAND";
const ENV_WORKER_ARGS: &str = "MAGI_WORKER_ARGS";
const ENV_PROCESS_TIMEOUT_MS: &str = "MAGI_PROCESS_TIMEOUT_MS";
const ENV_HOST: &str = "MAGI_HOST";
const ENV_PORT: &str = "MAGI_PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Worker executable, e.g. `python3`.
    pub worker_command: String,
    /// Arguments passed to the worker executable.
    pub worker_args: Vec<String>,
    /// Wall-clock budget for one worker invocation, in milliseconds.
    /// Always > 0 after loading.
    pub process_timeout_ms: u64,
    pub host: String,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            worker_command: DEFAULT_WORKER_COMMAND.to_string(),
            worker_args: DEFAULT_WORKER_ARGS.iter().map(|s| s.to_string()).collect(),
            process_timeout_ms: DEFAULT_PROCESS_TIMEOUT_MS,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl RelayConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults (with a warning) for anything missing or invalid.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let worker_command = std::env::var(ENV_WORKER_COMMAND)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.worker_command);

        let worker_args = match std::env::var(ENV_WORKER_ARGS) {
            Ok(raw) => parse_worker_args(&raw).unwrap_or(defaults.worker_args),
            Err(_) => defaults.worker_args,
        };

        let process_timeout_ms = parse_positive_ms(
            std::env::var(ENV_PROCESS_TIMEOUT_MS).ok().as_deref(),
            ENV_PROCESS_TIMEOUT_MS,
            defaults.process_timeout_ms,
        );

        let host = std::env::var(ENV_HOST)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = match std::env::var(ENV_PORT) {
            Ok(raw) => match raw.parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    tracing::warn!(
                        "invalid value for {ENV_PORT}: {raw}, using default {}",
                        defaults.port
                    );
                    defaults.port
                }
            },
            Err(_) => defaults.port,
        };

        Self {
            worker_command,
            worker_args,
            process_timeout_ms,
            host,
            port,
        }
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Worker invocation parameters for one relay session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            command: WorkerCommandBuilder::new(&self.worker_command)
                .args(&self.worker_args)
                .build(),
            timeout: self.process_timeout(),
        }
    }
}

/// Parse an argv string with shell quoting rules, e.g.
/// `agents/magi_executor.py --stream "chunk mode"`.
fn parse_worker_args(raw: &str) -> Option<Vec<String>> {
    match shell_words::split(raw) {
        Ok(args) => Some(args),
        Err(err) => {
            tracing::warn!("invalid value for {ENV_WORKER_ARGS}: {err}, using default");
            None
        }
    }
}

fn parse_positive_ms(raw: Option<&str>, key: &str, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => value,
        Ok(_) | Err(_) => {
            tracing::warn!("invalid timeout value for {key}: {raw}, using default {default}");
            default
        }
    }
}
