//! SSE event vocabulary for the relay
//!
//! Worker stdout lines pass through verbatim as `data:` frames; everything
//! the relay itself has to say is a structured error event carrying a
//! machine-readable code, a human-readable message, and optional numeric
//! context. Clients dispatch on the `type` discriminator inside the JSON
//! payload.

use std::time::Duration;

use axum::response::sse::Event;
use serde::Serialize;

use crate::subprocess::ProcessError;

/// Machine-readable error taxonomy surfaced to SSE clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Worker process could not be created at all. Terminal.
    WorkerSpawnError,
    /// Worker wrote to stderr; non-fatal, execution continues.
    WorkerRuntimeError,
    /// Worker terminated with a non-zero exit code. Terminal.
    WorkerExitError,
    /// Worker exceeded the wall-clock budget. Terminal.
    WorkerTimeout,
}

/// Structured `error` event payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    #[serde(rename = "type")]
    event_type: &'static str,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl ErrorEvent {
    fn new(code: ErrorCode, message: String) -> Self {
        Self {
            event_type: "error",
            code,
            message,
            exit_code: None,
            timeout_ms: None,
            elapsed_ms: None,
        }
    }

    pub fn spawn_failure(err: &ProcessError) -> Self {
        Self::new(
            ErrorCode::WorkerSpawnError,
            format!("failed to start worker process: {err}"),
        )
    }

    pub fn runtime_diagnostic(text: String) -> Self {
        Self::new(ErrorCode::WorkerRuntimeError, text)
    }

    pub fn abnormal_exit(exit_code: Option<i32>) -> Self {
        let message = match exit_code {
            Some(code) => format!("worker process exited with code {code}"),
            None => "worker process was terminated by a signal".to_string(),
        };
        let mut event = Self::new(ErrorCode::WorkerExitError, message);
        event.exit_code = exit_code;
        event
    }

    pub fn wait_failure(err: &std::io::Error) -> Self {
        Self::new(
            ErrorCode::WorkerExitError,
            format!("failed to observe worker exit: {err}"),
        )
    }

    pub fn timeout(budget: Duration, elapsed: Duration) -> Self {
        let mut event = Self::new(
            ErrorCode::WorkerTimeout,
            format!(
                "worker process exceeded the {} ms execution budget",
                budget.as_millis()
            ),
        );
        event.timeout_ms = Some(budget.as_millis() as u64);
        event.elapsed_ms = Some(elapsed.as_millis() as u64);
        event
    }
}

/// One outbound frame on the SSE stream.
#[derive(Debug, Clone)]
pub enum RelayFrame {
    /// A worker stdout line, forwarded verbatim.
    Data(String),
    /// A relay-originated structured error.
    Error(ErrorEvent),
}

impl RelayFrame {
    pub fn into_event(self) -> Event {
        match self {
            RelayFrame::Data(line) => Event::default().data(line),
            RelayFrame::Error(err) => {
                Event::default().data(serde_json::to_string(&err).unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::WorkerSpawnError).unwrap();
        assert_eq!(json, "\"WORKER_SPAWN_ERROR\"");
    }

    #[test]
    fn timeout_event_carries_budget_and_elapsed() {
        let event = ErrorEvent::timeout(Duration::from_millis(180_000), Duration::from_millis(180_042));
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "WORKER_TIMEOUT");
        assert_eq!(value["timeoutMs"], 180_000);
        assert_eq!(value["elapsedMs"], 180_042);
        assert!(value.get("exitCode").is_none());
    }

    #[test]
    fn abnormal_exit_carries_code() {
        let value = serde_json::to_value(ErrorEvent::abnormal_exit(Some(7))).unwrap();
        assert_eq!(value["code"], "WORKER_EXIT_ERROR");
        assert_eq!(value["exitCode"], 7);
    }

    #[test]
    fn signal_exit_has_no_code_field() {
        let value = serde_json::to_value(ErrorEvent::abnormal_exit(None)).unwrap();
        assert!(value.get("exitCode").is_none());
        assert!(value["message"].as_str().unwrap().contains("signal"));
    }

    #[test]
    fn diagnostic_message_passes_through() {
        let value = serde_json::to_value(ErrorEvent::runtime_diagnostic(
            "Traceback (most recent call last):".into(),
        ))
        .unwrap();
        assert_eq!(value["code"], "WORKER_RUNTIME_ERROR");
        assert_eq!(value["message"], "Traceback (most recent call last):");
    }
}
