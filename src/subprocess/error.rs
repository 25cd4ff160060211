use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("failed to spawn {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write request to worker stdin: {0}")]
    StdinWrite(#[source] std::io::Error),

    #[error("failed to capture worker {0}")]
    StreamCapture(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
