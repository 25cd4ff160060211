use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Fully resolved invocation of one worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl WorkerCommand {
    /// Program and arguments joined for log and error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

pub struct WorkerCommandBuilder {
    command: WorkerCommand,
}

impl WorkerCommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            command: WorkerCommand {
                program: program.to_string(),
                args: Vec::new(),
                env: HashMap::new(),
                working_dir: None,
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn build(self) -> WorkerCommand {
        self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_args_and_env() {
        let command = WorkerCommandBuilder::new("python3")
            .arg("magi_executor.py")
            .args(["--stream", "on"])
            .env("MAGI_TRACE", "1")
            .build();

        assert_eq!(command.program, "python3");
        assert_eq!(command.args, vec!["magi_executor.py", "--stream", "on"]);
        assert_eq!(command.env.get("MAGI_TRACE").map(String::as_str), Some("1"));
        assert_eq!(command.display(), "python3 magi_executor.py --stream on");
    }

    #[test]
    fn display_without_args_is_bare_program() {
        let command = WorkerCommandBuilder::new("cat").build();
        assert_eq!(command.display(), "cat");
    }
}
