//! External program invocation with a timeout and captured stderr.

use std::process::Stdio;
use std::time::Duration;

use podplay_core::CommandSpec;
use tokio::process::Command;

use crate::error::ReloadError;

/// One external program run: argument list, deadline, exit-status success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExternalCommand {
    pub fn new<I, S>(program: &str, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Build from configuration, substituting `{name}` placeholders.
    pub fn from_spec(spec: &CommandSpec, vars: &[(&str, &str)]) -> Self {
        Self {
            program: spec.program.clone(),
            args: spec.rendered_args(vars),
            timeout: spec.timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Program and arguments joined for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion.
    ///
    /// Fails on spawn error, non-zero exit, or when the deadline passes; the
    /// child is killed when the deadline passes.
    pub async fn run(&self) -> Result<CommandOutput, ReloadError> {
        let command = self.display();
        tracing::debug!(command = %command, timeout = ?self.timeout, "running");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ReloadError::Spawn {
                command: command.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ReloadError::Spawn {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                return Err(ReloadError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ReloadError::Subprocess {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }
}

/// Shorthand for `ExternalCommand::from_spec(spec, vars).run()`.
pub async fn run_spec(
    spec: &CommandSpec,
    vars: &[(&str, &str)],
) -> Result<CommandOutput, ReloadError> {
    ExternalCommand::from_spec(spec, vars).run().await
}
