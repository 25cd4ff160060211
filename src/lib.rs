//! # MAGI Relay
//!
//! HTTP service that bridges MAGI decision requests to agent worker
//! processes. Each `POST /invocations` spawns one worker, feeds it the
//! request payload on stdin, and streams the worker's newline-delimited
//! JSON output back to the caller as Server-Sent Events, with a wall-clock
//! budget and graceful-then-forced termination on timeout or disconnect.
//!
//! ## Modules
//!
//! - `config` - startup-time configuration (environment + CLI overrides)
//! - `relay` - line framing, SSE event vocabulary, per-request session
//! - `server` - axum router and HTTP handlers
//! - `subprocess` - worker process spawn/stdio/termination lifecycle

pub mod config;
pub mod relay;
pub mod server;
pub mod subprocess;
