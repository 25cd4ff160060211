pub mod command;
pub mod error;
pub mod process;

pub use command::{WorkerCommand, WorkerCommandBuilder};
pub use error::ProcessError;
pub use process::{spawn, WorkerProcess};
