//! External process execution
//!
//! Every external tool (installer, tar, gzip) runs through `run_command`.
//! A non-zero exit is reported as a user error or an internal error
//! depending on who is at fault for that particular step.

use crate::error::{DeplayerError, DeplayerResult, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of command output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn error_output_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// A named external command
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Step name used in logs and errors (e.g. `npm_install`)
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Variables added on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Who is blamed when the command exits non-zero
    pub error_kind: ErrorKind,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            error_kind: ErrorKind::Internal,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Blame the user when this command fails
    pub fn user_error(mut self) -> Self {
        self.error_kind = ErrorKind::User;
        self
    }

    /// The command line as a display string
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run a command to completion, capturing its output
pub async fn run_command(spec: &CommandSpec) -> DeplayerResult<std::process::Output> {
    let command_line = spec.command_line();
    debug!("Executing {}: {}", spec.name, command_line);

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(ref dir) = spec.cwd {
        command.current_dir(dir);
    }
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let started = Instant::now();
    let output = command
        .output()
        .await
        .map_err(|e| DeplayerError::command_failed(command_line.clone(), e))?;
    info!(
        "{} finished in {} ms",
        spec.name,
        started.elapsed().as_millis()
    );

    if output.status.success() {
        return Ok(output);
    }

    let tail = error_output_tail(
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
    );
    let tail = match output.status.code() {
        Some(code) => format!("exit code {}\n{}", code, tail),
        None => format!("terminated by signal\n{}", tail),
    };

    Err(match spec.error_kind {
        ErrorKind::User => DeplayerError::Install {
            step: spec.name.clone(),
            command: command_line,
            output: tail,
        },
        ErrorKind::Internal => DeplayerError::command_exec(command_line, tail),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_lines() {
        let stdout: String = (0..60).map(|i| format!("line {}\n", i)).collect();
        let tail = error_output_tail(&stdout, "boom");
        let lines: Vec<&str> = tail.lines().collect();

        assert_eq!(lines.len(), ERROR_TAIL_LINES);
        assert_eq!(lines.last(), Some(&"boom"));
        assert!(!tail.contains("line 10\n"));
    }

    #[test]
    fn command_line_display() {
        let spec = CommandSpec::new("npm_install", "npm").args(["install", "--production"]);
        assert_eq!(spec.command_line(), "npm install --production");
        assert_eq!(spec.error_kind, ErrorKind::Internal);
    }

    #[tokio::test]
    async fn success_returns_output() {
        let spec = CommandSpec::new("echo", "sh").args(["-c", "echo hello"]);
        let output = run_command(&spec).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("print_env", "sh")
            .args(["-c", "echo $NODE_ENV; pwd"])
            .cwd(dir.path())
            .env("NODE_ENV", "development");

        let output = run_command(&spec).await.unwrap();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();

        assert_eq!(lines.next(), Some("development"));
        let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(pwd, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn user_step_failure_is_user_error() {
        let spec = CommandSpec::new("npm_install", "sh")
            .args(["-c", "echo 'E404 left-pad' >&2; exit 1"])
            .user_error();

        let err = run_command(&spec).await.unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("E404 left-pad"));
    }

    #[tokio::test]
    async fn internal_step_failure_is_internal() {
        let spec = CommandSpec::new("tar", "sh").args(["-c", "exit 2"]);
        let err = run_command(&spec).await.unwrap_err();

        assert!(!err.is_user_error());
        assert!(err.to_string().contains("exit code 2"));
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let spec = CommandSpec::new("ghost", "deplayer-no-such-program").user_error();
        let err = run_command(&spec).await.unwrap_err();
        assert!(matches!(err, DeplayerError::CommandFailed { .. }));
    }
}
