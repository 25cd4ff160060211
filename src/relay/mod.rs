//! Request-to-worker streaming relay
//!
//! - `framing` - newline framing of worker stdout with flush-on-exit
//! - `events` - the SSE event vocabulary and error taxonomy
//! - `session` - the per-request state machine

pub mod events;
pub mod framing;
pub mod session;

pub use events::{ErrorCode, ErrorEvent, RelayFrame};
pub use framing::LineFramer;
pub use session::{EventSink, RelaySession, SessionConfig, SessionState, KILL_GRACE_PERIOD};
